//! rigctl TCP server
//!
//! One task per client. Device work runs on the blocking pool so a slow
//! radio never stalls the accept loop or other sessions' parsing.

use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinError;
use tokio_util::codec::{Framed, LinesCodecError};
use tracing::{debug, info, warn};

use super::codec::CommandCodec;
use super::command::{
    parse, Reply, RigctlCommand, IDENTITY, STUB_FREQUENCY, STUB_TRANSMIT, VERSION,
};
use crate::protocol::{DeviceChannel, ProtocolError};

/// Longest accepted command line
pub const MAX_LINE_LENGTH: usize = 1024;

/// Failures that end a session
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("line error: {0}")]
    Line(#[from] LinesCodecError),

    #[error("device worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// rigctl server bound to a TCP address
pub struct RigctlServer {
    listener: TcpListener,
    channel: Arc<DeviceChannel>,
}

impl RigctlServer {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr, channel: Arc<DeviceChannel>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, channel })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients forever
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Accept clients until `shutdown` resolves. Sessions already running
    /// are left to finish on their own.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        if let Ok(addr) = self.local_addr() {
            info!("rigctl server listening on {addr}");
        }

        loop {
            tokio::select! {
                res = self.listener.accept() => match res {
                    Ok((stream, peer)) => self.spawn_session(stream, peer),
                    Err(e) => warn!("accept failed: {e}"),
                },
                _ = &mut shutdown => {
                    info!("rigctl server shutting down");
                    break;
                }
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let channel = Arc::clone(&self.channel);
        tokio::spawn(async move {
            info!(%peer, "client connected");
            match handle_session(stream, channel).await {
                Ok(()) => info!(%peer, "client disconnected"),
                Err(e) => warn!(%peer, "session closed: {e}"),
            }
        });
    }
}

/// Serve one client until it disconnects, sends `q`, or faults
pub async fn handle_session(
    stream: TcpStream,
    channel: Arc<DeviceChannel>,
) -> Result<(), ServerError> {
    stream.set_nodelay(true)?;
    let mut lines = Framed::new(stream, CommandCodec::new(MAX_LINE_LENGTH));

    while let Some(line) = lines.next().await {
        let line = line?;
        let command = match parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                debug!("{e}");
                lines.send(Reply::invalid().to_string()).await?;
                continue;
            }
        };

        if command == RigctlCommand::Quit {
            break;
        }

        let reply = dispatch(command, &channel).await?;
        lines.send(reply.to_string()).await?;
    }

    Ok(())
}

/// Run one command against the radio and build its reply
pub async fn dispatch(
    command: RigctlCommand,
    channel: &Arc<DeviceChannel>,
) -> Result<Reply, ServerError> {
    let result = match command {
        RigctlCommand::SetFrequency(hz) => {
            on_device(channel, move |c| c.set_frequency(hz).map(|_| Reply::ok())).await?
        }
        RigctlCommand::SetMode(mode) => {
            on_device(channel, move |c| c.set_mode(mode).map(|_| Reply::ok())).await?
        }
        RigctlCommand::SetTransmit(on) => {
            on_device(channel, move |c| c.set_transmit(on).map(|_| Reply::ok())).await?
        }
        RigctlCommand::GetMode => {
            on_device(channel, |c| {
                c.query_status().map(|s| Reply::Value(s.rigctl_mode()))
            })
            .await?
        }
        RigctlCommand::GetFrequency => Ok(Reply::Value(STUB_FREQUENCY.to_string())),
        RigctlCommand::GetTransmit => Ok(Reply::Value(STUB_TRANSMIT.to_string())),
        RigctlCommand::Identify => Ok(Reply::Value(IDENTITY.to_string())),
        RigctlCommand::Version => Ok(Reply::Value(VERSION.to_string())),
        RigctlCommand::Quit => Ok(Reply::ok()),
    };

    Ok(result.unwrap_or_else(|e| {
        warn!("device command failed: {e}");
        Reply::io_error()
    }))
}

/// Run a blocking device operation off the async workers
async fn on_device<T, F>(
    channel: &Arc<DeviceChannel>,
    op: F,
) -> Result<Result<T, ProtocolError>, JoinError>
where
    T: Send + 'static,
    F: FnOnce(&DeviceChannel) -> Result<T, ProtocolError> + Send + 'static,
{
    let channel = Arc::clone(channel);
    tokio::task::spawn_blocking(move || op(&channel)).await
}
