//! Drives one command's execution over an open interactive shell channel.
//!
//! Remote device shells offer no structured framing, so completion has to be
//! inferred from a mix of signals: prompt characters at the tail of a chunk,
//! vendor pagination markers, and stagnation of the accumulated buffer. Any
//! one signal alone is unreliable (prompt characters appear inside config
//! text, pagination markers vary by vendor, and some devices just stop
//! producing output), so the receive loop combines all three.

use std::time::Duration;

use log::{debug, trace};
use memchr::memchr2;

use super::transcript;
use crate::device::Vendor;
use crate::error::SessionError;
use crate::transport::ShellChannel;

/// How the driver decides whether a chunk is an echo of the command it just
/// sent (and therefore must not count as completion).
///
/// The default heuristic is deliberately preserved from long-standing field
/// behavior: a chunk is treated as an echo when any whitespace-delimited
/// token of the command appears in it. A configuration line that happens to
/// contain such a token will suppress completion detection for that chunk;
/// the idle path still terminates the read. Set [`EchoDetection::Disabled`]
/// for devices that never echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoDetection {
    /// Any command token present in the chunk means "echo, keep reading".
    #[default]
    CommandTokens,
    /// Never treat a chunk as an echo.
    Disabled,
}

/// Timing and threshold knobs for the receive loop.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Overall budget for one command, including pagination rounds.
    pub command_timeout: Duration,

    /// How long a single read waits for data before reporting an idle cycle.
    pub read_window: Duration,

    /// Upper bound for the read window as idle backoff doubles it.
    pub max_read_window: Duration,

    /// Pause after sending the command (and after paging-disable commands)
    /// so the read loop does not race the device's echo.
    pub settle_delay: Duration,

    /// Pause after answering a pagination prompt, giving the device time to
    /// emit the next page.
    pub page_delay: Duration,

    /// Pause between the two paging-disable candidates sent to devices of
    /// unknown vendor.
    pub probe_delay: Duration,

    /// Consecutive reads with an unchanged accumulated length before the
    /// device is nudged with a bare line terminator.
    pub stall_threshold: u32,

    /// Consecutive empty read windows before the driver checks the buffer
    /// for a prompt and either completes or nudges.
    pub max_idle_cycles: u32,

    /// Echo-detection heuristic.
    pub echo_detection: EchoDetection,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(120),
            read_window: Duration::from_secs(1),
            max_read_window: Duration::from_secs(4),
            settle_delay: Duration::from_secs(2),
            page_delay: Duration::from_millis(1500),
            probe_delay: Duration::from_secs(1),
            stall_threshold: 5,
            max_idle_cycles: 5,
            echo_detection: EchoDetection::CommandTokens,
        }
    }
}

#[cfg(test)]
impl SessionSettings {
    /// Settings with all delays zeroed so protocol tests run instantly.
    fn immediate() -> Self {
        Self {
            command_timeout: Duration::from_secs(5),
            read_window: Duration::from_millis(5),
            max_read_window: Duration::from_millis(5),
            settle_delay: Duration::ZERO,
            page_delay: Duration::ZERO,
            probe_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Executes commands on interactive device shells and returns their
/// normalized output.
#[derive(Debug, Clone, Default)]
pub struct SessionDriver {
    settings: SessionSettings,
}

impl SessionDriver {
    /// Create a driver with the given settings.
    pub fn new(settings: SessionSettings) -> Self {
        Self { settings }
    }

    /// The driver's settings.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Run `command` on an owned shell, closing the channel on the way out
    /// regardless of outcome.
    pub async fn fetch_closing(
        &self,
        mut shell: Box<dyn ShellChannel>,
        command: &str,
        vendor: Vendor,
    ) -> Result<String, SessionError> {
        let result = self.fetch(shell.as_mut(), command, vendor).await;
        if let Err(e) = shell.close().await {
            debug!("error closing shell channel: {}", e);
        }
        result
    }

    /// Disable pagination, run `command`, and return the scrubbed output.
    ///
    /// Fails with [`SessionError::Timeout`] when no completion signal is seen
    /// within the command timeout, and propagates any channel failure.
    pub async fn fetch(
        &self,
        shell: &mut dyn ShellChannel,
        command: &str,
        vendor: Vendor,
    ) -> Result<String, SessionError> {
        // Connected -> PagingDisabled: clear the login banner, then send the
        // vendor's disable string(s). No acknowledgement is waited for.
        self.drain(shell).await?;

        let disable_commands = vendor.paging_disable_commands();
        for (i, cmd) in disable_commands.iter().enumerate() {
            debug!("sending paging-disable command: {}", cmd);
            shell.send(format!("{}\n", cmd).as_bytes()).await?;
            if i + 1 < disable_commands.len() {
                tokio::time::sleep(self.settings.probe_delay).await;
            }
        }
        tokio::time::sleep(self.settings.settle_delay).await;
        self.drain(shell).await?;

        // PagingDisabled -> CommandSent
        debug!("sending command: {}", command);
        shell.send(format!("{}\n", command).as_bytes()).await?;
        tokio::time::sleep(self.settings.settle_delay).await;

        let raw = self.receive(shell, command).await?;

        // Completed: scrub residual markers and cursor codes.
        Ok(transcript::scrub(&raw))
    }

    /// The receive loop: accumulate chunks until completion is inferred.
    async fn receive(
        &self,
        shell: &mut dyn ShellChannel,
        command: &str,
    ) -> Result<String, SessionError> {
        let deadline = tokio::time::Instant::now() + self.settings.command_timeout;

        let mut buffer = String::new();
        let mut last_len = 0usize;
        let mut stall_count = 0u32;
        let mut idle_cycles = 0u32;
        let mut window = self.settings.read_window;

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(SessionError::Timeout(self.settings.command_timeout));
            }

            match shell.read_chunk(window).await? {
                Some(data) => {
                    idle_cycles = 0;
                    window = self.settings.read_window;

                    // ANSI escapes are stripped on receive; the broken
                    // ESC-less cursor codes are handled later by scrub().
                    let cleaned = strip_ansi_escapes::strip(&data);
                    let chunk = String::from_utf8_lossy(&cleaned).into_owned();
                    trace!("received chunk: {} bytes", chunk.len());
                    buffer.push_str(&chunk);

                    if transcript::contains_paging_marker(&chunk) {
                        debug!("pagination prompt detected, sending continuation");
                        shell.send(b" ").await?;
                        tokio::time::sleep(self.settings.page_delay).await;
                        continue;
                    }

                    if self.chunk_completes(&chunk, command) {
                        trace!("prompt detected, command complete");
                        break;
                    }

                    if buffer.len() == last_len {
                        stall_count += 1;
                        if stall_count >= self.settings.stall_threshold {
                            debug!("output stalled, nudging device");
                            shell.send(b"\n").await?;
                            stall_count = 0;
                        }
                    } else {
                        stall_count = 0;
                        last_len = buffer.len();
                    }
                }
                None => {
                    idle_cycles += 1;
                    if idle_cycles >= self.settings.max_idle_cycles {
                        if contains_prompt_char(&buffer) {
                            debug!("idle with prompt in buffer, command complete");
                            break;
                        }
                        debug!("idle without prompt, nudging device");
                        shell.send(b"\n").await?;
                        idle_cycles = 0;
                        window = self.settings.read_window;
                    } else {
                        // Idle backoff: widen the read window up to the cap.
                        window = (window * 2).min(self.settings.max_read_window);
                    }
                }
            }
        }

        Ok(buffer)
    }

    /// Does this chunk signal completion of the command?
    ///
    /// A prompt character preceded by non-trivial content completes the
    /// command, unless the chunk looks like an echo of the command itself.
    fn chunk_completes(&self, chunk: &str, command: &str) -> bool {
        if !contains_prompt_char(chunk) {
            return false;
        }
        if chunk.trim().chars().count() <= 1 {
            return false;
        }
        match self.settings.echo_detection {
            EchoDetection::CommandTokens => !chunk_echoes_command(command, chunk),
            EchoDetection::Disabled => true,
        }
    }

    /// Clear whatever the device has already buffered (login banner, output
    /// of the paging-disable command). Bounded so a chatty device cannot
    /// stall the flush forever.
    async fn drain(&self, shell: &mut dyn ShellChannel) -> Result<(), SessionError> {
        for _ in 0..4 {
            match shell.read_chunk(self.settings.read_window / 4).await? {
                Some(data) => trace!("flushed {} buffered bytes", data.len()),
                None => break,
            }
        }
        Ok(())
    }
}

/// Whether text contains a shell-prompt character.
fn contains_prompt_char(text: &str) -> bool {
    memchr2(b'#', b'>', text.as_bytes()).is_some()
}

/// The named echo heuristic: any whitespace-delimited command token found in
/// the chunk marks it as an echo.
pub(crate) fn chunk_echoes_command(command: &str, chunk: &str) -> bool {
    command.split_whitespace().any(|token| chunk.contains(token))
}
