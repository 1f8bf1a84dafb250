use std::path::PathBuf;

/// Default SSH port.
const DEFAULT_SSH_PORT: u16 = 22;

/// Default program of the source viewer.
const DEFAULT_VIEWER: &str = "rgdb-ui";

/// Interactive debugger driver, for local and remote processes.
///
/// On first run, you will be prompted for a code path and a tag file. The
/// code path is where rgdb searches for source files the debugger reports
/// (e.g., `~/code` could be the base directory where you store all your
/// source files). The tag file is a ctags file, which improves the accuracy
/// of file searches but is not required.
#[derive(clap::Parser, Debug)]
#[clap(name = "rgdb", verbatim_doc_comment)]
pub struct CliOpts {
    /// User name for the SSH authentication (defaults to the current user).
    #[clap(short, long)]
    pub user: Option<String>,

    /// Password for the SSH authentication (defaults to the SSH agent).
    #[clap(short = 'w', long)]
    pub password: Option<String>,

    /// SSH port of the remote host.
    #[clap(short, long, default_value_t = DEFAULT_SSH_PORT)]
    pub port: u16,

    /// Debug on this machine, instead of a remote host.
    #[clap(short, long)]
    pub localhost: bool,

    /// Local port of an already running source viewer.
    ///
    /// If not specified, a new viewer is launched on a random port.
    #[clap(long, value_name = "PORT")]
    pub ui_port: Option<u16>,

    /// Program of the source viewer to launch (receives its port as
    /// argument).
    #[clap(long, value_name = "PROGRAM", default_value = DEFAULT_VIEWER)]
    pub ui: String,

    /// Root of the local source tree (overrides the settings file).
    #[clap(long, value_name = "PATH")]
    pub code_path: Option<PathBuf>,

    /// Path to a ctags file (overrides the settings file).
    #[clap(long, value_name = "PATH")]
    pub tags_file: Option<PathBuf>,

    /// Record execution after `run`, for reverse debugging.
    #[clap(long)]
    pub reverse: bool,

    /// For remote debugging, the first argument must be a host name. All
    /// following arguments are passed to the debugger.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Where the debugger runs.
#[derive(Debug, PartialEq, Eq)]
pub enum CliTarget {
    /// On this machine.
    Local {
        /// Debugger arguments.
        args: Vec<String>,
    },

    /// On a remote host, over SSH.
    Remote {
        /// Host name.
        host: String,

        /// Debugger arguments.
        args: Vec<String>,
    },
}

/// Error of CLI parsing.
#[derive(thiserror::Error, Debug)]
pub enum CliError {
    /// Remote debugging was requested without a host.
    #[error("missing host name (or --localhost)")]
    MissingHost,

    /// The current user name could not be determined.
    #[error("cannot determine the current user name (use --user)")]
    UnknownUser,
}

impl CliOpts {
    /// Parses the CLI from the command-line.
    ///
    /// # Warning
    ///
    /// Exits on error.
    pub fn parse_from_cmdline() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Returns where the debugger runs, and with which arguments.
    pub fn target(&self) -> Result<CliTarget, CliError> {
        if self.localhost {
            return Ok(CliTarget::Local {
                args: self.args.clone(),
            });
        }

        match self.args.split_first() {
            Some((host, args)) => Ok(CliTarget::Remote {
                host: host.clone(),
                args: args.to_vec(),
            }),
            None => Err(CliError::MissingHost),
        }
    }

    /// Returns the user name for the SSH authentication.
    pub fn user_name(&self) -> Result<String, CliError> {
        if let Some(user) = &self.user {
            return Ok(user.clone());
        }

        ["USER", "LOGNAME"]
            .into_iter()
            .find_map(|var| std::env::var(var).ok().filter(|user| !user.is_empty()))
            .ok_or(CliError::UnknownUser)
    }
}
