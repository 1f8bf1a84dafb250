use std::io::Write;

use rgdb_session::transport::Transport;
use rgdb_session::{
    Command, Error, FileLocator, LocationNotifier, PacketCapture, Session, UiLink,
};

use crate::console::{Console, InputEvent};

/// Prompt of the command loop.
pub const PROMPT: &str = "(rgdb) ";

/// What to do after a command.
enum Flow {
    Continue,
    Exit,
}

/// The interactive command loop.
///
/// Commands typed by the operator are forwarded to the debugger. After each
/// command moving the debuggee, its current location is pushed to the
/// external viewer.
pub struct Repl<T: Transport + ?Sized, L: UiLink, W: Write> {
    session: Session<T>,
    console: Console<W>,
    locator: FileLocator,
    notifier: LocationNotifier<L>,
    capture: PacketCapture,

    /// Whether to record execution after `run`.
    reverse: bool,

    /// Last command, repeated on empty lines.
    previous: Option<Command>,
}

impl<T: Transport + ?Sized, L: UiLink, W: Write> Repl<T, L, W> {
    /// Creates a new command loop.
    pub fn new(
        session: Session<T>,
        console: Console<W>,
        locator: FileLocator,
        notifier: LocationNotifier<L>,
    ) -> Self {
        Self {
            session,
            console,
            locator,
            notifier,
            capture: PacketCapture::default(),
            reverse: false,
            previous: None,
        }
    }

    /// Records execution after `run` (for reverse debugging).
    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Runs the loop until the operator leaves, and tears the session down.
    ///
    /// Returns an error if the debugger hung up.
    pub fn run(mut self) -> rgdb_session::Result<()> {
        let res = self.run_loop();

        if let Err(e) = self.notifier.shutdown() {
            tracing::warn!(error = %e, "failed to shut the viewer down");
        }
        self.session.close();

        res
    }

    fn run_loop(&mut self) -> rgdb_session::Result<()> {
        loop {
            let line = match self.console.read_line(PROMPT)? {
                InputEvent::Line(line) => line,
                InputEvent::Eof | InputEvent::Interrupt => {
                    writeln!(self.console.out())?;
                    return Ok(());
                }
            };

            let Some(command) = Command::parse(&line).or_else(|| self.previous.clone()) else {
                continue;
            };

            match self.execute(&command) {
                Ok(Flow::Continue) => (),
                Ok(Flow::Exit) => return Ok(()),
                Err(Error::Cancelled | Error::InputClosed) => {
                    writeln!(self.console.out())?;
                    return Ok(());
                }
                Err(e @ Error::TransportClosed) => return Err(e),
                Err(e) => {
                    tracing::debug!(error = ?e, %command, "command failed");
                    writeln!(self.console.out(), "{e}")?;
                }
            }

            self.previous = Some(command);
        }
    }

    #[tracing::instrument(name = "Execute", skip(self), fields(command = %command))]
    fn execute(&mut self, command: &Command) -> rgdb_session::Result<Flow> {
        match command.verb() {
            "exit" | "quit" => return Ok(Flow::Exit),
            _ if command.is_run() => {
                self.session.line(command, self.console.out())?;

                if self.reverse {
                    self.session.enable_recording()?;
                }
            }
            _ if command.is_flow_control() => {
                if command.arg(0) == Some("tcpdump") && self.session.capture_host().is_some() {
                    self.captured_line(command)?;
                } else {
                    self.session.line(command, self.console.out())?;
                }
            }
            _ => {
                let answer = self.session.send(command)?;
                writeln!(self.console.out(), "{answer}")?;

                return Ok(Flow::Continue);
            }
        }

        self.follow_location()?;

        Ok(Flow::Continue)
    }

    /// Runs the verb of `<verb> tcpdump [port]` while capturing packets on
    /// the debuggee's host.
    fn captured_line(&mut self, command: &Command) -> rgdb_session::Result<()> {
        let verb = Command::new([command.verb()]);
        let port = command.arg(1);

        let host = self.session.capture_host().ok_or(Error::NotStarted)?;
        let running = self.capture.start(host, &mut self.console, port)?;

        let res = self.session.line(&verb, self.console.out());

        if let Some(host) = self.session.capture_host() {
            if let Some(path) = self.capture.finish(host, running) {
                tracing::info!(path = %path.display(), "packets captured");
            }
        }

        res
    }

    /// Pushes the debuggee's current location to the viewer.
    fn follow_location(&mut self) -> rgdb_session::Result<()> {
        let line = self.session.retrieve_line_number()?;
        let location = self.session.retrieve_location()?;
        let method = self.session.retrieve_function()?;

        let (Some(line), Some(location)) = (line, location) else {
            tracing::debug!("no current location");
            return Ok(());
        };

        let path = self.locator.resolve(
            self.session.transport_mut(),
            &location,
            method.as_deref(),
            &mut self.console,
        )?;

        match path {
            Some(path) => {
                self.notifier.notify(&path, line)?;
            }
            None => tracing::debug!(location, "source file not found"),
        }

        Ok(())
    }
}
