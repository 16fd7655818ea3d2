//! SSH transport layer wrapping russh.
//!
//! This module owns connection setup, authentication, and PTY channel
//! creation. The session driver never touches russh directly; it talks to
//! the [`ShellChannel`] trait so protocol logic can be tested against a
//! scripted fake channel.

mod ssh;

pub use ssh::{SshConnector, SshShell};

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::device::Device;
use crate::error::{SessionError, TransportError};

/// An already-open, authenticated, full-duplex byte channel to a device
/// shell.
///
/// Reads are bounded: `read_chunk` waits at most `wait` for data and returns
/// `Ok(None)` when nothing arrived, so callers can drive their own idle
/// detection without unbounded blocking.
#[async_trait]
pub trait ShellChannel: Send {
    /// Read the next chunk of available bytes, waiting at most `wait`.
    ///
    /// Returns `Ok(None)` if no data arrived within the window. A closed
    /// channel surfaces as [`SessionError::Closed`].
    async fn read_chunk(&mut self, wait: Duration) -> Result<Option<Bytes>, SessionError>;

    /// Write bytes to the remote shell.
    async fn send(&mut self, data: &[u8]) -> Result<(), SessionError>;

    /// Close the channel and release the underlying connection.
    ///
    /// Closing an already-closed channel is a no-op.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Opens a fresh shell channel to a device.
///
/// One connection is made per command, matching the single-writer model of
/// the snapshot tree: a device is never talked to over two channels at once.
#[async_trait]
pub trait ShellOpener: Send + Sync {
    /// Connect, authenticate, and open an interactive shell.
    async fn open_shell(&self, device: &Device) -> Result<Box<dyn ShellChannel>, TransportError>;
}

/// Connection settings shared by all devices in a run.
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    /// Timeout for TCP connect + SSH handshake + authentication.
    pub connect_timeout: Duration,

    /// Terminal width for the PTY. Wide enough that devices do not wrap
    /// configuration lines.
    pub terminal_width: u32,

    /// Terminal height for the PTY.
    pub terminal_height: u32,
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
        }
    }
}
