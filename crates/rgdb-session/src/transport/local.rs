use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::pty::{Winsize, openpty};
use nix::sys::termios::Termios;
use nix::unistd::setsid;

use super::Transport;
use crate::Error;

/// How long a read waits for more output before giving up (milliseconds).
const READ_TIMEOUT_MS: u16 = 200;

const READ_BUFFER_LEN: usize = 1024;

const PTY_SIZE: Winsize = Winsize {
    ws_row: 500,
    ws_col: 500,
    ws_xpixel: 0,
    ws_ypixel: 0,
};

/// Transport to a debugger spawned on the local machine, behind a
/// pseudoterminal.
#[derive(Default)]
pub struct LocalTransport {
    /// Debugger process.
    child: Option<Child>,

    /// Master side of the debugger's pseudoterminal.
    master: Option<File>,
}

impl LocalTransport {
    /// Creates a new transport (without any debugger started).
    pub fn new() -> Self {
        Self::default()
    }

    fn master(&mut self) -> crate::Result<&mut File> {
        self.master.as_mut().ok_or(Error::NotStarted)
    }
}

impl Transport for LocalTransport {
    #[tracing::instrument(name = "LocalStart", skip(self))]
    fn start_debugger(&mut self, program: &str, args: &[String]) -> crate::Result<()> {
        let pty = openpty(Some(&PTY_SIZE), None::<&Termios>)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .env("TERM", "dumb")
            .stdin(Stdio::from(pty.slave.try_clone()?))
            .stdout(Stdio::from(pty.slave.try_clone()?))
            .stderr(Stdio::from(pty.slave));

        // The debugger gets its own session, so that signals sent to `rgdb`'s
        // terminal are not delivered to it.
        unsafe { command.pre_exec(|| setsid().map(drop).map_err(io::Error::from)) };

        let child = command.spawn()?;

        tracing::info!(pid = child.id(), "debugger spawned");

        self.child = Some(child);
        self.master = Some(File::from(pty.master));

        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> crate::Result<()> {
        let master = self.master()?;
        master.write_all(bytes)?;
        master.flush()?;
        Ok(())
    }

    fn receive_ready(&mut self) -> crate::Result<bool> {
        // reads are bounded by a timeout already
        Ok(true)
    }

    fn receive(&mut self) -> crate::Result<Vec<u8>> {
        let master = self.master()?;

        let mut data = Vec::new();
        let mut buf = [0u8; READ_BUFFER_LEN];
        let mut hung_up = false;

        loop {
            let ready = {
                let mut fds = [PollFd::new(master.as_fd(), PollFlags::POLLIN)];

                match poll(&mut fds, PollTimeout::from(READ_TIMEOUT_MS)) {
                    Ok(n) => n > 0,
                    Err(Errno::EINTR) => continue,
                    Err(e) => return Err(e.into()),
                }
            };

            // read timeout: no more output right now
            if !ready {
                break;
            }

            match master.read(&mut buf) {
                Ok(0) => hung_up = true,
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(e) if e.raw_os_error() == Some(Errno::EIO as i32) => hung_up = true,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            if hung_up {
                break;
            }
        }

        if hung_up && data.is_empty() {
            return Err(Error::TransportClosed);
        }

        Ok(data)
    }

    fn execute_host_command(&mut self, command: &str) -> crate::Result<String> {
        let output = Command::new("sh").arg("-c").arg(command).output()?;

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    fn host_file_exists(&mut self, path: &str) -> crate::Result<bool> {
        Ok(Path::new(path).exists())
    }

    fn truncate_host_file(&mut self, path: &str) -> crate::Result<()> {
        File::create(path)?;
        Ok(())
    }

    fn read_host_file(&mut self, path: &str) -> crate::Result<String> {
        match std::fs::read(path) {
            Ok(content) => Ok(String::from_utf8_lossy(&content).into_owned()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_host_file(&mut self, path: &str) -> crate::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn close(&mut self) -> crate::Result<()> {
        self.master = None;

        if let Some(mut child) = self.child.take() {
            match child.kill() {
                Ok(()) => tracing::debug!(pid = child.id(), "debugger killed"),
                // already exited
                Err(e) if e.kind() == io::ErrorKind::InvalidInput => (),
                Err(e) => return Err(e.into()),
            }

            child.wait()?;
        }

        Ok(())
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close local debugger");
        }
    }
}
