pub(crate) mod conversation;
pub mod health_checks;
pub(crate) mod message;
pub(crate) mod presence;

pub use health_checks::*;
