mod channel;
mod config;
mod document;
mod error;
mod media;
mod mesh;
mod session;
mod store;
mod transport;

pub use channel::*;
pub use config::*;
pub use document::*;
pub use error::*;
pub use media::*;
pub use mesh::*;
pub use session::*;
pub use store::*;
pub use transport::*;
