/// Error type of this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error from the [ssh2] crate.
    #[error(transparent)]
    Ssh(#[from] ssh2::Error),

    /// OS error from the [nix] crate.
    #[error("os error: {0}")]
    Os(#[from] nix::Error),

    /// The remote host could not be reached.
    #[error("{host}: {source}")]
    Connection {
        /// Host name (and port) of the remote host.
        host: String,

        /// Underlying connection error.
        source: std::io::Error,
    },

    /// The remote host rejected the credentials.
    #[error("authentication failed for {user}@{host}")]
    Authentication {
        /// User name used for the authentication.
        user: String,

        /// Host name of the remote host.
        host: String,
    },

    /// The debugger process (or channel) hung up.
    #[error("debugger connection closed")]
    TransportClosed,

    /// An operation required the debugger to be started first.
    #[error("debugger not started")]
    NotStarted,

    /// The pending operation was interrupted by the operator.
    #[error("interrupted")]
    Cancelled,

    /// The operator's input stream reached its end.
    #[error("end of operator input")]
    InputClosed,

    /// The external UI did not reply in time.
    #[error("UI link: no reply within {0:?}")]
    UiTimeout(std::time::Duration),

    /// Error from the external UI request/reply socket.
    #[error("UI link: {0}")]
    Ui(#[from] zeromq::ZmqError),
}

/// Result type of this crate.
pub type Result<T> = core::result::Result<T, Error>;
