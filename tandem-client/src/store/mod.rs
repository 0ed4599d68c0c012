mod document_store;
mod http_store;
mod memory_store;

pub use document_store::*;
pub use http_store::*;
pub use memory_store::*;
