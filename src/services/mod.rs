mod chat;
mod conversation_registry;
mod error;
mod message_store;
mod read_receipts;

pub use chat::{ChatService, SendTarget};
pub use conversation_registry::ConversationRegistry;
pub use error::ChatError;
pub use message_store::{MessageStore, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use read_receipts::{ReadReceipt, ReadReceiptManager};
