//! Raw byte channels to a debugger process.
//!
//! A [Transport] carries the debugger's interactive byte stream, and gives
//! access to the host the debuggee runs on (which may not be the machine
//! running `rgdb`).

mod local;
mod remote;

use tempfile::TempPath;

pub use self::local::LocalTransport;
pub use self::remote::{RemoteHost, RemoteOptions, RemoteTransport};
use crate::capture::CaptureHost;

/// Capability set of a channel to a debugger process.
pub trait Transport {
    /// Launches the debugger on the host.
    fn start_debugger(&mut self, program: &str, args: &[String]) -> crate::Result<()>;

    /// Transmits raw bytes to the debugger's input.
    fn send(&mut self, bytes: &[u8]) -> crate::Result<()>;

    /// Whether output from the debugger can be read right now.
    fn receive_ready(&mut self) -> crate::Result<bool>;

    /// Reads one bounded chunk of raw output from the debugger.
    ///
    /// A chunk may end in the middle of a multi-byte character.
    fn receive(&mut self) -> crate::Result<Vec<u8>>;

    /// Runs a shell command on the host, outside of the debugger's input
    /// stream, and returns its (trimmed) standard output.
    fn execute_host_command(&mut self, command: &str) -> crate::Result<String>;

    /// Whether the given path exists on the host.
    fn host_file_exists(&mut self, path: &str) -> crate::Result<bool>;

    /// Empties (or creates) the given file on the host.
    fn truncate_host_file(&mut self, path: &str) -> crate::Result<()>;

    /// Reads the given file on the host.
    ///
    /// A missing file reads as empty.
    fn read_host_file(&mut self, path: &str) -> crate::Result<String>;

    /// Removes the given file from the host.
    fn remove_host_file(&mut self, path: &str) -> crate::Result<()>;

    /// Copies a file from the host into a local temporary file.
    ///
    /// Returns `None` if host paths are local paths already.
    fn fetch_host_file(&mut self, _path: &str) -> crate::Result<Option<TempPath>> {
        Ok(None)
    }

    /// Returns the host's packet capture capability, if any.
    fn capture_host(&mut self) -> Option<&mut dyn CaptureHost> {
        None
    }

    /// Terminates the debugger and releases the channel.
    ///
    /// Calling this function more than once has no effect.
    fn close(&mut self) -> crate::Result<()>;
}

/// Quotes a string for a POSIX shell.
pub(crate) fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::rc::Rc;

    use tempfile::TempPath;

    use super::{Transport, shell_quote};
    use crate::Error;

    /// Transport replaying scripted debugger output.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        chunks: VecDeque<Vec<u8>>,
        sent: Vec<String>,
        pub(crate) uname: String,
        pub(crate) files: HashMap<String, String>,
        pub(crate) fetchable: HashMap<String, String>,
        pub(crate) started: Option<(String, Vec<String>)>,
        pub(crate) closed: bool,

        /// Makes `start_debugger` fail as if the debugger was not installed.
        pub(crate) missing_debugger: bool,

        /// Host files removed so far (outlives the transport).
        pub(crate) removed: Rc<RefCell<Vec<String>>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new<const N: usize>(chunks: [&str; N]) -> Self {
            Self::from_bytes(chunks.map(str::as_bytes))
        }

        pub(crate) fn from_bytes<const N: usize>(chunks: [&[u8]; N]) -> Self {
            Self {
                chunks: chunks.into_iter().map(<[u8]>::to_vec).collect(),
                uname: "Linux".to_owned(),
                ..Default::default()
            }
        }

        pub(crate) fn push(&mut self, chunk: &str) {
            self.chunks.push_back(chunk.as_bytes().to_vec());
        }

        pub(crate) fn sent(&self) -> &[String] {
            &self.sent
        }

        pub(crate) fn remaining(&self) -> usize {
            self.chunks.len()
        }
    }

    impl Transport for ScriptedTransport {
        fn start_debugger(&mut self, program: &str, args: &[String]) -> crate::Result<()> {
            if self.missing_debugger {
                return Err(std::io::Error::from(std::io::ErrorKind::NotFound).into());
            }

            self.started = Some((program.to_owned(), args.to_vec()));
            Ok(())
        }

        fn send(&mut self, bytes: &[u8]) -> crate::Result<()> {
            self.sent.push(String::from_utf8_lossy(bytes).into_owned());
            Ok(())
        }

        fn receive_ready(&mut self) -> crate::Result<bool> {
            Ok(true)
        }

        fn receive(&mut self) -> crate::Result<Vec<u8>> {
            self.chunks.pop_front().ok_or(Error::TransportClosed)
        }

        fn execute_host_command(&mut self, command: &str) -> crate::Result<String> {
            match command {
                "uname" => Ok(self.uname.clone()),
                _ => Ok(String::new()),
            }
        }

        fn host_file_exists(&mut self, path: &str) -> crate::Result<bool> {
            Ok(self.files.contains_key(path))
        }

        fn truncate_host_file(&mut self, path: &str) -> crate::Result<()> {
            self.files.insert(path.to_owned(), String::new());
            Ok(())
        }

        fn read_host_file(&mut self, path: &str) -> crate::Result<String> {
            Ok(self.files.get(path).cloned().unwrap_or_default())
        }

        fn remove_host_file(&mut self, path: &str) -> crate::Result<()> {
            self.files.remove(path);
            self.removed.borrow_mut().push(path.to_owned());
            Ok(())
        }

        fn fetch_host_file(&mut self, path: &str) -> crate::Result<Option<TempPath>> {
            if self.fetchable.is_empty() {
                return Ok(None);
            }

            let content = self
                .fetchable
                .remove(path)
                .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))?;

            let file = tempfile::NamedTempFile::new()?;
            std::fs::write(file.path(), content)?;

            Ok(Some(file.into_temp_path()))
        }

        fn close(&mut self) -> crate::Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    #[test]
    fn quote_for_shell() {
        assert_eq!(shell_quote("/tmp/a b"), "'/tmp/a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
