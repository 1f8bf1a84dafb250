//! This crate drives an interactive session with a text-based debugger
//! (`gdb` or `lldb`), running either locally or on a remote host.
//!
//! The debugger is driven by screen-scraping its interactive output:
//! - A [Transport](self::transport::Transport) carries the debugger's raw
//!   byte stream (over a local pseudoterminal, or an SSH shell channel).
//! - [PromptSync] splits this stream into command answers, by waiting for
//!   the debugger's prompt (and confirming its yes/no questions).
//! - [Dialect] translates canonical (gdb) commands for the debugger in use.
//! - The debuggee's output is redirected to a side file, and echoed apart
//!   from the debugger's answers.
//!
//! Besides the [Session] itself, this crate provides the building blocks for
//! following the debuggee's current location in an external viewer:
//! [FileLocator] maps debugger-reported source paths to local files, and
//! [LocationNotifier] pushes them over a [UiLink].
//!
//! ```no_run
//! use rgdb_session::transport::LocalTransport;
//! use rgdb_session::{Command, Session};
//! use tokio_util::sync::CancellationToken;
//!
//! fn main() -> rgdb_session::Result<()> {
//!     let mut session = Session::start(
//!         Box::new(LocalTransport::new()),
//!         &["./a.out".to_owned()],
//!         CancellationToken::new(),
//!     )?;
//!
//!     session.send(&Command::new(["break", "main"]))?;
//!     session.line(&Command::new(["run"]), &mut std::io::stdout())?;
//!
//!     let line = session.retrieve_line_number()?;
//!     let file = session.retrieve_location()?;
//!
//!     Ok(())
//! }
//! ```

/// Module implementing packet captures around debugger commands.
pub mod capture;

mod command;
mod dialect;
mod error;

/// Module resolving debugger-reported source files.
pub mod locator;

mod notify;

/// Module abstracting the operator's input/output.
pub mod operator;

mod output;
mod prompt;
mod session;

/// Module implementing the channels to the debugger process.
pub mod transport;

pub use self::capture::PacketCapture;
pub use self::command::Command;
pub use self::dialect::Dialect;
pub use self::error::{Error, Result};
pub use self::locator::{FileLocator, TagIndex};
pub use self::notify::{LocationNotifier, UiLink, ZmqUiLink};
pub use self::operator::Operator;
pub use self::output::OutputSplitter;
pub use self::prompt::PromptSync;
pub use self::session::Session;
