use std::io::Write;

use regex::Regex;
use tempfile::TempPath;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::capture::CaptureHost;
use crate::output::OutputSplitter;
use crate::transport::Transport;
use crate::{Command, Dialect, Error, PromptSync};

/// Interactive session with a debugger process.
///
/// The session owns the transport to the debugger, and closes it when
/// dropped.
pub struct Session<T: Transport + ?Sized = dyn Transport> {
    transport: Box<T>,
    dialect: Dialect,
    sync: PromptSync,
    splitter: OutputSplitter,

    /// Path (on the host) of the debugged binary, if it exists.
    binary: Option<String>,

    cancel: CancellationToken,
    closed: bool,
}

impl<T: Transport + ?Sized> Session<T> {
    /// Starts a debugger session over the given transport.
    ///
    /// `args` are passed to the debugger (the first one usually being the
    /// binary to debug). Once the debugger shows its first prompt, the
    /// dialect's setup commands are issued.
    #[tracing::instrument(name = "SessionStart", skip_all, fields(args = ?args))]
    pub fn start(
        mut transport: Box<T>,
        args: &[String],
        cancel: CancellationToken,
    ) -> crate::Result<Self> {
        let uname = transport.execute_host_command("uname")?;
        let dialect = Dialect::from_uname(&uname);

        tracing::debug!(uname = %uname, ?dialect, "dialect selected");

        // from here on, dropping the session on error removes the output file
        let mut session = Self {
            transport,
            dialect,
            sync: PromptSync::new(dialect),
            splitter: OutputSplitter::new(format!("/tmp/rgdb_{}", Uuid::new_v4())),
            binary: None,
            cancel,
            closed: false,
        };

        session
            .transport
            .truncate_host_file(session.splitter.program_output())?;

        session.binary = match args.first() {
            Some(binary) if session.transport.host_file_exists(binary)? => Some(binary.clone()),
            _ => None,
        };

        session.transport.start_debugger(dialect.program(), args)?;
        session.sync.wait(&mut *session.transport, &session.cancel)?;

        for setup in dialect.setup_commands() {
            session.send(&Command::new(setup.split_whitespace()))?;
        }

        Ok(session)
    }

    /// Dialect spoken by the debugger.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Path (on the host) of the debugged binary, if it exists.
    pub fn binary(&self) -> Option<&str> {
        self.binary.as_deref()
    }

    /// Path (on the host) of the file receiving the debuggee's output.
    pub fn program_output(&self) -> &str {
        self.splitter.program_output()
    }

    /// Returns the transport to the debugger.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the transport to the debugger (mutable).
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sends a command to the debugger, and returns its raw answer.
    ///
    /// The command is translated into the session's dialect, and `run` is
    /// redirected so that the debuggee's output does not mix with the
    /// debugger's.
    #[tracing::instrument(name = "Send", skip_all, fields(command = %command))]
    pub fn send(&mut self, command: &Command) -> crate::Result<String> {
        if self.closed {
            return Err(Error::TransportClosed);
        }

        let command = self.dialect.translate(&self.splitter.redirect(command));
        tracing::debug!(translated = %command, "sending");

        self.transport.send(format!("{command}\n").as_bytes())?;

        self.sync.wait(&mut *self.transport, &self.cancel)
    }

    /// Sends a command to the debugger, and writes what the operator should
    /// see of the result to `out`.
    ///
    /// The debuggee's output (if any) is written first, framed, followed by
    /// the last paragraph of the debugger's answer.
    pub fn line(&mut self, command: &Command, out: &mut impl Write) -> crate::Result<()> {
        let answer = self.send(command)?;
        let text = self.splitter.display_text(command, &answer);

        self.splitter
            .flush_program_output(&mut *self.transport, out)?;

        if !text.is_empty() {
            writeln!(out, "{text}")?;
        }

        Ok(())
    }

    /// Enables execution recording (for reverse debugging), if the dialect
    /// supports it.
    pub fn enable_recording(&mut self) -> crate::Result<()> {
        match self.dialect.record_command() {
            Some(command) => self.send(&command).map(|_| ()),
            None => {
                tracing::debug!(dialect = ?self.dialect, "recording not supported");
                Ok(())
            }
        }
    }

    /// Queries the current line number of the debuggee.
    ///
    /// Returns `None` if the answer does not contain exactly one line number.
    pub fn retrieve_line_number(&mut self) -> crate::Result<Option<u32>> {
        let (command, regex) = self.dialect.line_query();
        let answer = self.send(&command)?;

        Ok(single_capture(regex, &answer).and_then(|line| line.parse().ok()))
    }

    /// Queries the current source file of the debuggee, as reported by the
    /// debugger (a path on the host).
    ///
    /// Returns `None` if the answer does not contain exactly one path.
    pub fn retrieve_location(&mut self) -> crate::Result<Option<String>> {
        let (command, regex) = self.dialect.location_query();
        let answer = self.send(&command)?;

        Ok(single_capture(regex, &answer).map(str::to_owned))
    }

    /// Queries the function of the debuggee's current frame.
    pub fn retrieve_function(&mut self) -> crate::Result<Option<String>> {
        let (command, regex) = self.dialect.function_query();
        let answer = self.send(&command)?;

        Ok(regex
            .captures(&answer)
            .and_then(|captures| captures.get(1))
            .map(|name| name.as_str().to_owned()))
    }

    /// Copies a host file into a local temporary file (see
    /// [Transport::fetch_host_file]).
    pub fn fetch_host_file(&mut self, path: &str) -> crate::Result<Option<TempPath>> {
        self.transport.fetch_host_file(path)
    }

    /// Returns the host's packet capture capability, if any.
    pub fn capture_host(&mut self) -> Option<&mut dyn CaptureHost> {
        self.transport.capture_host()
    }

    /// Terminates the debugger, and removes the debuggee's output file.
    ///
    /// Failures are logged and otherwise ignored. Calling this function more
    /// than once has no effect.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self
            .transport
            .remove_host_file(self.splitter.program_output())
        {
            tracing::warn!(error = %e, "failed to remove program output file");
        }

        if let Err(e) = self.transport.close() {
            tracing::warn!(error = %e, "failed to close debugger transport");
        }

        tracing::debug!("session closed");
    }

    /// Whether [Session::close] was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<T: Transport + ?Sized> Drop for Session<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Returns the first group of the only match of `regex` in `text`.
fn single_capture<'a>(regex: &Regex, text: &'a str) -> Option<&'a str> {
    let mut captures = regex
        .captures_iter(text)
        .filter_map(|captures| captures.get(1));

    match (captures.next(), captures.next()) {
        (Some(capture), None) => Some(capture.as_str().trim()),
        _ => None,
    }
}
