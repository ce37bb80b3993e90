mod add;
mod get;
mod read;

pub use add::*;
pub use get::*;
pub use read::*;
