use actix_web::error::{ErrorBadRequest, ErrorNotFound};
use actix_web::web::Json;
use actix_web::{Error, HttpResponse};
use serde_derive::Serialize;

/// Envelope every successful route answers with.
#[derive(Serialize)]
pub(crate) struct JsonResponse<T> {
    pub(crate) status: String,
    pub(crate) code: u32,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) item: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) list: Option<Vec<T>>,
}

pub(crate) struct JsonResponseBuilder<T>
where
    T: serde::Serialize,
{
    id: Option<String>,
    item: Option<T>,
    list: Option<Vec<T>>,
}

impl<T> JsonResponseBuilder<T>
where
    T: serde::Serialize,
{
    pub(crate) fn set_item(mut self, item: T) -> Self {
        self.item = Some(item);
        self
    }

    pub(crate) fn set_list(mut self, list: Vec<T>) -> Self {
        self.list = Some(list);
        self
    }

    pub(crate) fn set_id(mut self, id: impl ToString) -> Self {
        self.id = Some(id.to_string());
        self
    }

    fn to_json_response(self, code: u32, message: &str) -> JsonResponse<T> {
        let status = if code < 400 { "OK" } else { "Error" };
        JsonResponse {
            status: status.to_string(),
            code,
            message: message.to_string(),
            id: self.id,
            item: self.item,
            list: self.list,
        }
    }

    fn to_string(self, code: u32, message: &str) -> String {
        serde_json::to_string(&self.to_json_response(code, message))
            .unwrap_or_else(|_| format!(r#"{{"status":"Error","code":{},"message":"{}"}}"#, code, message))
    }

    pub(crate) fn ok(self, message: &str) -> Json<JsonResponse<T>> {
        Json(self.to_json_response(200, message))
    }

    pub(crate) fn created(self, message: &str) -> HttpResponse {
        HttpResponse::Created().json(self.to_json_response(201, message))
    }

    pub(crate) fn bad_request(self, message: &str) -> Error {
        ErrorBadRequest(self.to_string(400, message))
    }

    pub(crate) fn form_error(self, message: String) -> Error {
        self.bad_request(&message)
    }

    pub(crate) fn not_found(self, message: &str) -> Error {
        ErrorNotFound(self.to_string(404, message))
    }
}

impl<T> JsonResponse<T>
where
    T: serde::Serialize,
{
    pub(crate) fn build() -> JsonResponseBuilder<T> {
        JsonResponseBuilder {
            id: None,
            item: None,
            list: None,
        }
    }
}
