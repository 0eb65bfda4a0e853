//! rigctl Control Server
//!
//! Speaks the line-oriented hamlib NET rigctl protocol to logging and
//! contest software and forwards each command to the [`DeviceChannel`].
//!
//! [`DeviceChannel`]: crate::protocol::DeviceChannel

mod codec;
pub mod command;
mod server;

pub use command::{parse, ParseError, Reply, RigctlCommand};
pub use server::{dispatch, handle_session, RigctlServer, ServerError, MAX_LINE_LENGTH};

/// Default rigctl listen address (hamlib's rigctld port)
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:4532";
