use super::broadcaster::Deliver;
use super::events::ConnectionId;
use super::hub::{ChatHub, Connect, Disconnect, Join};
use super::protocol::{ClientCommand, ServerReply};
use crate::configuration::Settings;
use crate::models;
use crate::services::ChatService;
use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One websocket connection. Registers itself with the hub on start and
/// leaves on stop; everything pushed by the hub arrives as `Deliver`.
pub struct ChatSession {
    id: ConnectionId,
    user: Arc<models::User>,
    hub: Addr<ChatHub>,
    chat: ChatService,
    heartbeat_interval: Duration,
    client_timeout: Duration,
    hb: Instant,
}

impl ChatSession {
    pub fn new(
        user: Arc<models::User>,
        hub: Addr<ChatHub>,
        chat: ChatService,
        heartbeat_interval: Duration,
        client_timeout: Duration,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            user,
            hub,
            chat,
            heartbeat_interval,
            client_timeout,
            hb: Instant::now(),
        }
    }

    /// Pings the client and drops the connection after `client_timeout` of silence.
    fn hb(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.hb) > act.client_timeout {
                tracing::warn!(
                    connection_id = %act.id,
                    "Chat websocket client heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }

            ctx.ping(b"");
        });
    }
}

impl Actor for ChatSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            "Chat websocket connection started: connection_id={}, user={}",
            self.id,
            self.user.id
        );
        self.hb(ctx);

        self.hub.do_send(Connect {
            connection_id: self.id,
            user_id: self.user.id,
            sink: Box::new(ctx.address().recipient::<Deliver>()),
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "Chat websocket connection closed: connection_id={}, user={}",
            self.id,
            self.user.id
        );
        self.hub.do_send(Disconnect {
            connection_id: self.id,
        });
    }
}

async fn handle_command(
    chat: ChatService,
    hub: Addr<ChatHub>,
    connection_id: ConnectionId,
    user_id: uuid::Uuid,
    command: ClientCommand,
) -> ServerReply {
    match command {
        ClientCommand::Join { conversation_id } => {
            if let Err(err) = chat
                .registry()
                .ensure_participant(conversation_id, user_id)
                .await
            {
                return ServerReply::error(err.to_string());
            }

            match hub
                .send(Join {
                    connection_id,
                    conversation_id,
                })
                .await
            {
                Ok(true) => ServerReply::ack(&command, Some(conversation_id)),
                Ok(false) => ServerReply::error("connection is no longer registered"),
                Err(err) => {
                    tracing::error!("Chat hub unreachable on join: {}", err);
                    ServerReply::error("realtime hub unavailable")
                }
            }
        }
        ClientCommand::MarkRead { conversation_id } => {
            match chat.mark_conversation_read(conversation_id, user_id).await {
                Ok(_) => ServerReply::ack(&command, Some(conversation_id)),
                Err(err) => ServerReply::error(err.to_string()),
            }
        }
        ClientCommand::OnlineUsers => ServerReply::OnlineUsers {
            user_ids: chat.list_online_users().await,
        },
        ClientCommand::IsOnline { user_id: other } => ServerReply::IsOnline {
            user_id: other,
            online: chat.is_user_online(other).await,
        },
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ChatSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                let command: ClientCommand = match serde_json::from_str(&text) {
                    Ok(command) => command,
                    Err(e) => {
                        tracing::debug!("Unreadable client frame: {}", e);
                        ctx.address()
                            .do_send(SendReply(ServerReply::error(format!("invalid frame: {}", e))));
                        return;
                    }
                };
                tracing::debug!(connection_id = %self.id, command = command.name(), "Client command");

                let fut = handle_command(
                    self.chat.clone(),
                    self.hub.clone(),
                    self.id,
                    self.user.id,
                    command,
                );
                let addr = ctx.address();
                actix::spawn(async move {
                    addr.do_send(SendReply(fut.await));
                });
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary frames are not supported on the chat websocket");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("Chat websocket close received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Chat websocket protocol error: {}", e);
                ctx.stop();
            }
        }
    }
}

/// Reply to a client command, written back on the session's own context.
#[derive(actix::Message)]
#[rtype(result = "()")]
struct SendReply(ServerReply);

impl Handler<SendReply> for ChatSession {
    type Result = ();

    fn handle(&mut self, msg: SendReply, ctx: &mut Self::Context) {
        match serde_json::to_string(&msg.0) {
            Ok(text) => ctx.text(text),
            Err(e) => tracing::error!("Failed to encode reply: {}", e),
        }
    }
}

impl Handler<Deliver> for ChatSession {
    type Result = ();

    fn handle(&mut self, msg: Deliver, ctx: &mut Self::Context) {
        match serde_json::to_string(&msg.0) {
            Ok(text) => ctx.text(text),
            Err(e) => tracing::error!("Failed to encode event {}: {}", msg.0.name(), e),
        }
    }
}

/// Upgrade endpoint for the realtime transport.
#[tracing::instrument(
    name = "Chat websocket connection",
    skip(req, stream, user, hub, chat, settings)
)]
pub async fn chat_websocket(
    req: HttpRequest,
    stream: web::Payload,
    user: web::ReqData<Arc<models::User>>,
    hub: web::Data<Addr<ChatHub>>,
    chat: web::Data<ChatService>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse, Error> {
    tracing::info!("New chat websocket connection request from user: {}", user.id);

    let session = ChatSession::new(
        user.into_inner(),
        hub.get_ref().clone(),
        chat.get_ref().clone(),
        settings.realtime.heartbeat_interval(),
        settings.realtime.client_timeout(),
    );

    ws::start(session, &req, stream)
}
