pub mod mock_observer;
pub mod mock_transport;

pub use mock_media::*;
pub use mock_observer::*;
pub use mock_relay::*;
pub use mock_signal_sink::*;
pub use mock_transport::*;
