mod document_command;
mod document_sync;
mod sync_status;

pub use document_command::*;
pub use document_sync::*;
pub use sync_status::*;
