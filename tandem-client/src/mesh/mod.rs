mod mesh_command;
mod mesh_observer;
mod peer_link;
mod peer_mesh;
mod signal_sink;

pub use mesh_command::*;
pub use mesh_observer::*;
pub use peer_link::*;
pub use peer_mesh::*;
pub use signal_sink::*;
