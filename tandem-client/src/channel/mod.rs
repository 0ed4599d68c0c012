mod channel_state;
mod relay_connector;
mod session_channel;
mod ws_connector;

pub use channel_state::*;
pub use relay_connector::*;
pub use session_channel::*;
pub use ws_connector::*;
