use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};

use nix::sys::termios::{self, LocalFlags, SetArg};
use rgdb_session::{Error, Operator};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Event from the operator's terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// A line was typed.
    Line(String),

    /// The input stream reached its end.
    Eof,

    /// The operator interrupted the session (Ctrl-C).
    Interrupt,
}

/// Spawns the tasks producing input events from the standard input and the
/// interrupt signal.
///
/// An interrupt also triggers `cancel`, so that pending debugger waits
/// return early.
pub fn spawn_input_tasks(
    runtime: &tokio::runtime::Handle,
    cancel: CancellationToken,
) -> mpsc::UnboundedReceiver<InputEvent> {
    let (sender, receiver) = mpsc::unbounded_channel();

    let lines_sender = sender.clone();
    runtime.spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

        loop {
            let event = match lines.next_line().await {
                Ok(Some(line)) => InputEvent::Line(line),
                Ok(None) => InputEvent::Eof,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read standard input");
                    InputEvent::Eof
                }
            };

            let eof = event == InputEvent::Eof;
            if lines_sender.send(event).is_err() || eof {
                break;
            }
        }
    });

    runtime.spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for interrupts");
            return;
        }

        tracing::debug!("interrupted");

        cancel.cancel();
        let _ = sender.send(InputEvent::Interrupt);
    });

    receiver
}

/// Asks for a password on the controlling terminal, without echoing it.
pub fn prompt_password(prompt: &str) -> std::io::Result<String> {
    let mut tty = OpenOptions::new().read(true).write(true).open("/dev/tty")?;

    write!(tty, "{prompt}")?;
    tty.flush()?;

    let original = termios::tcgetattr(&tty)?;

    let mut silent = original.clone();
    silent.local_flags.remove(LocalFlags::ECHO);
    silent.local_flags.insert(LocalFlags::ECHONL);
    termios::tcsetattr(&tty, SetArg::TCSANOW, &silent)?;

    let mut password = String::new();
    let res = BufReader::new(&tty).read_line(&mut password);

    termios::tcsetattr(&tty, SetArg::TCSANOW, &original)?;
    res?;

    Ok(password.trim_end_matches(['\r', '\n']).to_owned())
}

/// The operator's terminal: input events in, text out.
pub struct Console<W> {
    events: mpsc::UnboundedReceiver<InputEvent>,
    out: W,
}

impl<W: Write> Console<W> {
    /// Creates a new console reading `events` and writing to `out`.
    pub fn new(events: mpsc::UnboundedReceiver<InputEvent>, out: W) -> Self {
        Self { events, out }
    }

    /// Shows `prompt`, and waits for the next input event.
    ///
    /// # Warning
    ///
    /// This blocks the current thread, and must not be called from within an
    /// asynchronous context.
    pub fn read_line(&mut self, prompt: &str) -> std::io::Result<InputEvent> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;

        Ok(self.events.blocking_recv().unwrap_or(InputEvent::Eof))
    }

    /// Returns the console's output.
    pub fn out(&mut self) -> &mut W {
        &mut self.out
    }
}

impl<W: Write> Operator for Console<W> {
    fn ask(&mut self, question: &str) -> rgdb_session::Result<Option<String>> {
        match self.read_line(question)? {
            InputEvent::Line(line) => Ok(Some(line)),
            InputEvent::Eof => Ok(None),
            InputEvent::Interrupt => Err(Error::Cancelled),
        }
    }

    fn say(&mut self, text: &str) -> rgdb_session::Result<()> {
        writeln!(self.out, "{text}")?;
        Ok(())
    }
}
