//! SSH transport implementation using russh.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, trace};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::{ConnectSettings, ShellChannel, ShellOpener};
use crate::device::Device;
use crate::error::{SessionError, TransportError};

/// Opens one SSH connection + PTY shell per command.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    settings: ConnectSettings,
}

impl SshConnector {
    /// Create a connector with the given settings.
    pub fn new(settings: ConnectSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ShellOpener for SshConnector {
    async fn open_shell(&self, device: &Device) -> Result<Box<dyn ShellChannel>, TransportError> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(self.settings.connect_timeout),
            ..Default::default()
        });

        debug!(
            "connecting to {}:{} as {}",
            device.hostname, device.port, device.username
        );

        let mut session = tokio::time::timeout(
            self.settings.connect_timeout,
            client::connect(
                config,
                (device.hostname.as_str(), device.port),
                AcceptAllHandler,
            ),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.settings.connect_timeout))?
        .map_err(TransportError::Ssh)?;

        let authenticated = session
            .authenticate_password(&device.username, device.password.expose_secret())
            .await
            .map_err(TransportError::Ssh)?
            .success();

        if !authenticated {
            return Err(TransportError::AuthenticationFailed {
                user: device.username.clone(),
            });
        }

        let channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                self.settings.terminal_width,
                self.settings.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        debug!("shell opened on {}", device.hostname);

        Ok(Box::new(SshShell {
            channel,
            session: Some(session),
        }))
    }
}

/// A live PTY shell on one SSH connection.
///
/// Dropping without [`close`](ShellChannel::close) leaks the connection to
/// the russh background task until the inactivity timeout fires; the session
/// driver always closes on its way out.
pub struct SshShell {
    channel: Channel<Msg>,
    session: Option<Handle<AcceptAllHandler>>,
}

#[async_trait]
impl ShellChannel for SshShell {
    async fn read_chunk(&mut self, wait: Duration) -> Result<Option<Bytes>, SessionError> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let msg = match tokio::time::timeout_at(deadline, self.channel.wait()).await {
                Ok(msg) => msg,
                Err(_) => return Ok(None),
            };

            match msg {
                Some(ChannelMsg::Data { data }) => {
                    trace!("received {} bytes", data.len());
                    return Ok(Some(Bytes::copy_from_slice(&data)));
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    trace!("received {} extended bytes", data.len());
                    return Ok(Some(Bytes::copy_from_slice(&data)));
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(SessionError::Closed);
                }
                // Window adjusts, exit status, etc. are irrelevant here.
                Some(other) => {
                    trace!("ignoring channel message: {:?}", other);
                }
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.channel
            .data(data)
            .await
            .map_err(|e| SessionError::Channel(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(session) = self.session.take() {
            // eof() failing just means the peer already tore the channel down
            self.channel.eof().await.ok();
            session
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await
                .map_err(|e| SessionError::Transport(TransportError::Ssh(e)))?;
        }
        Ok(())
    }
}

/// russh handler that accepts any host key, the equivalent of OpenSSH's
/// `StrictHostKeyChecking=no`.
#[derive(Debug)]
pub struct AcceptAllHandler;

impl client::Handler for AcceptAllHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}
