// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command invocation.
//!
//! Everything wslsync knows about distributions comes from external
//! executables: `wsl.exe` for live state and lifecycle directives, `reg.exe`
//! for the registration store, and PowerShell for package presence. This
//! module is the single place where those processes get created.
//!
//! # Bounded Waits
//!
//! Any captured invocation is raced against a configurable deadline. A hung
//! `wsl.exe` (which is not unheard of while the subsystem boots) would
//! otherwise block its caller forever. Children are killed when their future
//! is dropped, so a timed out process does not linger.
//!
//! # Output Encoding
//!
//! `wsl.exe` writes UTF-16LE to redirected pipes, while `reg.exe` and
//! PowerShell write the console code page. [`decode_output`] sniffs which
//! one it got.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    future::Future,
    process::Stdio,
    sync::Arc,
    time::Duration,
};
use tokio::{process::Command, time::timeout};
use tracing::{debug, instrument};

/// Default deadline for captured commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Layer of indirection for external process creation.
pub trait CommandChannel: Send + Sync {
    /// Run program to completion and capture its output.
    ///
    /// A non-zero exit status is __not__ an error at this layer. Callers
    /// decide what a failed status means for them.
    fn run_captured(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = Result<ProcessOutput, ChannelError>> + Send;

    /// Start program without waiting for it.
    ///
    /// The only failure reported is the failure to start the process at all.
    fn spawn_detached(&self, program: &str, args: &[String]) -> std::io::Result<()>;
}

impl<C> CommandChannel for Arc<C>
where
    C: CommandChannel,
{
    fn run_captured(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = Result<ProcessOutput, ChannelError>> + Send {
        (**self).run_captured(program, args)
    }

    fn spawn_detached(&self, program: &str, args: &[String]) -> std::io::Result<()> {
        (**self).spawn_detached(program, args)
    }
}

/// Captured result of a finished process.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,

    /// Decoded standard output.
    pub stdout: String,

    /// Decoded standard error.
    pub stderr: String,
}

impl ProcessOutput {
    /// Construct new process output.
    pub fn new(code: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Process exited with status zero.
    pub fn exited_successfully(&self) -> bool {
        self.code == Some(0)
    }

    /// Process wrote anything at all to standard output.
    pub fn has_output(&self) -> bool {
        !self.stdout.is_empty()
    }
}

impl Display for ProcessOutput {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self.code {
            Some(code) => write!(fmt, "exit code: {code}")?,
            None => fmt.write_str("exit code: <terminated by signal>")?,
        }

        // INVARIANT: Chomp trailing newlines so diagnostics stay on one line per stream.
        let stdout = self.stdout.trim_end();
        if !stdout.is_empty() {
            write!(fmt, ", stdout: {stdout}")?;
        }

        let stderr = self.stderr.trim_end();
        if !stderr.is_empty() {
            write!(fmt, ", stderr: {stderr}")?;
        }

        Ok(())
    }
}

/// Command channel backed by real operating system processes.
#[derive(Debug, Clone)]
pub struct SystemChannel {
    limit: Duration,
}

impl SystemChannel {
    /// Construct new system channel with a deadline for captured commands.
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

impl Default for SystemChannel {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandChannel for SystemChannel {
    /// Run program with piped output under the configured deadline.
    ///
    /// # Errors
    ///
    /// - Return [`ChannelError::Start`] if the process cannot be created.
    /// - Return [`ChannelError::Wait`] if waiting on the process fails.
    /// - Return [`ChannelError::TimedOut`] if the deadline passes first.
    #[instrument(skip(self), level = "debug")]
    async fn run_captured(
        &self,
        program: &str,
        args: &[String],
    ) -> Result<ProcessOutput, ChannelError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        hide_console_window(&mut command);

        let child = command.spawn().map_err(|source| ChannelError::Start {
            source,
            program: program.to_owned(),
        })?;

        let output = timeout(self.limit, child.wait_with_output())
            .await
            .map_err(|_| ChannelError::TimedOut {
                program: program.to_owned(),
                limit: self.limit,
            })?
            .map_err(|source| ChannelError::Wait {
                source,
                program: program.to_owned(),
            })?;

        let output = ProcessOutput {
            code: output.status.code(),
            stdout: decode_output(&output.stdout),
            stderr: decode_output(&output.stderr),
        };
        debug!("{program} finished with {output}");

        Ok(output)
    }

    #[instrument(skip(self), level = "debug")]
    fn spawn_detached(&self, program: &str, args: &[String]) -> std::io::Result<()> {
        let child = std::process::Command::new(program).args(args).spawn()?;
        debug!("spawned {program} as process {}", child.id());

        Ok(())
    }
}

#[cfg(windows)]
fn hide_console_window(command: &mut Command) {
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_command: &mut Command) {}

/// Decode raw process output into text.
///
/// Treats the buffer as UTF-16LE if it starts with a UTF-16LE byte order
/// mark, or if it is made of whole code units whose high bytes are zero more
/// often than their low bytes. UTF-8 text practically never holds null
/// bytes, while UTF-16LE holds one in every ASCII character, line breaks
/// included. Everything else is decoded as lossy UTF-8. Null characters
/// never survive decoding.
pub fn decode_output(bytes: &[u8]) -> String {
    let text = if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        decode_utf16le(rest)
    } else if looks_like_utf16le(bytes) {
        decode_utf16le(bytes)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };

    text.replace('\0', "")
}

fn looks_like_utf16le(bytes: &[u8]) -> bool {
    if bytes.len() < 2 || bytes.len() % 2 != 0 {
        return false;
    }

    let (low_zeros, high_zeros) = bytes
        .chunks_exact(2)
        .fold((0usize, 0usize), |(low, high), unit| {
            (low + usize::from(unit[0] == 0), high + usize::from(unit[1] == 0))
        });

    high_zeros > low_zeros
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
        .collect::<Vec<_>>();

    String::from_utf16_lossy(&units)
}

/// Command channel error types.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Process could not be created.
    #[error("failed to start {program:?}")]
    Start {
        #[source]
        source: std::io::Error,
        program: String,
    },

    /// Process was created, but waiting on it failed.
    #[error("failed to wait on {program:?}")]
    Wait {
        #[source]
        source: std::io::Error,
        program: String,
    },

    /// Process did not finish before the deadline.
    #[error("{program:?} did not finish within {limit:?}")]
    TimedOut { program: String, limit: Duration },
}
