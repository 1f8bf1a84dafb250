//! Crate implementing the rgdb command line interface.

mod cli;
mod config;
mod console;
mod repl;
mod viewer;

pub use self::cli::{CliError, CliOpts, CliTarget};
pub use self::config::Settings;
pub use self::console::{Console, InputEvent, prompt_password, spawn_input_tasks};
pub use self::repl::{PROMPT, Repl};
pub use self::viewer::{VIEWER_PORTS, connect_viewer, launch_viewer, viewer_command};
