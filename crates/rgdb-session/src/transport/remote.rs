use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::Path;

use ssh2::Channel;
use tempfile::TempPath;

use super::{Transport, shell_quote};
use crate::Error;
use crate::capture::CaptureHost;

const READ_BUFFER_LEN: usize = 2048;

/// Dimensions (width, height, width in pixels, height in pixels) of the
/// debugger's remote pseudoterminal.
const PTY_SIZE: (u32, u32, u32, u32) = (500, 500, 0, 0);

/// Connection parameters of a remote host.
#[derive(Clone, Debug)]
pub struct RemoteOptions {
    /// Host name or address.
    pub host: String,

    /// SSH port.
    pub port: u16,

    /// User to log in as.
    pub user: String,

    /// Password of the user.
    ///
    /// If `None`, the SSH agent is used for authentication.
    pub password: Option<String>,
}

/// Authenticated SSH connection to the debuggee's host.
pub struct RemoteHost {
    session: ssh2::Session,

    /// Channels of commands running in the background, by PID.
    background: HashMap<u32, Channel>,
}

impl RemoteHost {
    /// Connects and authenticates to a remote host.
    ///
    /// If the first authentication attempt is rejected, `ask_password` is
    /// called (once) to retry with a password typed by the operator.
    #[tracing::instrument(name = "SshConnect", skip_all, fields(host = %options.host, user = %options.user))]
    pub fn connect(
        options: &RemoteOptions,
        ask_password: impl FnOnce(&str) -> io::Result<String>,
    ) -> crate::Result<Self> {
        let host = format!("{}:{}", options.host, options.port);

        let tcp = TcpStream::connect((options.host.as_str(), options.port))
            .map_err(|source| Error::Connection {
                host: host.clone(),
                source,
            })?;

        let mut session = ssh2::Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| Error::Connection {
            host: host.clone(),
            source: e.into(),
        })?;

        let first_attempt = match options.password.as_deref() {
            Some(password) => session.userauth_password(&options.user, password),
            None => session.userauth_agent(&options.user),
        };

        if let Err(e) = first_attempt {
            tracing::debug!(error = %e, "authentication rejected");

            let password = ask_password(&format!("{}'s password: ", options.user))?;
            session
                .userauth_password(&options.user, &password)
                .map_err(|_| Error::Authentication {
                    user: options.user.clone(),
                    host: host.clone(),
                })?;
        }

        if !session.authenticated() {
            return Err(Error::Authentication {
                user: options.user.clone(),
                host,
            });
        }

        tracing::info!("connected");

        Ok(Self {
            session,
            background: HashMap::new(),
        })
    }

    /// Runs a command on its own exec channel, and returns its (trimmed)
    /// standard output.
    pub fn execute(&mut self, command: &str) -> crate::Result<String> {
        let mut channel = self.session.channel_session()?;
        channel.exec(command)?;

        let mut output = Vec::new();
        channel.read_to_end(&mut output)?;
        channel.wait_close()?;

        Ok(String::from_utf8_lossy(&output).trim().to_owned())
    }

    /// Copies a remote file to a local path over SFTP.
    pub fn download(&mut self, remote: &str, local: &Path) -> crate::Result<()> {
        let sftp = self.session.sftp()?;
        let mut remote = sftp.open(Path::new(remote))?;
        let mut local = File::create(local)?;

        io::copy(&mut remote, &mut local)?;

        Ok(())
    }

    fn disconnect(&mut self) -> crate::Result<()> {
        for (_, mut channel) in self.background.drain() {
            let _ = channel.close();
        }

        self.session.disconnect(None, "rgdb session closed", None)?;

        Ok(())
    }
}

impl CaptureHost for RemoteHost {
    fn execute(&mut self, command: &str) -> crate::Result<String> {
        RemoteHost::execute(self, command)
    }

    fn spawn_background(&mut self, command: &str) -> crate::Result<u32> {
        let mut channel = self.session.channel_session()?;
        channel.exec(&format!("echo $$; exec {command}"))?;

        // the first line is the PID of the shell `exec`ing the command
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while channel.read(&mut byte)? == 1 && byte[0] != b'\n' {
            line.push(byte[0]);
        }

        let pid = String::from_utf8_lossy(&line)
            .trim()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        self.background.insert(pid, channel);

        Ok(pid)
    }

    fn stop_background(&mut self, pid: u32) -> crate::Result<()> {
        let res = RemoteHost::execute(self, &format!("kill {pid}"));

        if let Some(mut channel) = self.background.remove(&pid) {
            if let Err(e) = channel.close() {
                tracing::debug!(error = %e, pid, "failed to close background channel");
            }
        }

        res.map(drop)
    }

    fn download(&mut self, remote: &str, local: &Path) -> crate::Result<()> {
        RemoteHost::download(self, remote, local)
    }
}

/// Transport to a debugger running on a remote host, inside an interactive
/// SSH shell.
pub struct RemoteTransport {
    host: RemoteHost,

    /// Interactive shell running the debugger.
    shell: Option<Channel>,

    /// Output read while probing for readiness, not yet received.
    pending: Vec<u8>,

    /// Command line of the debugger.
    debugger_command: Option<String>,

    closed: bool,
}

impl RemoteTransport {
    /// Creates a new transport (without any debugger started) over an
    /// established connection.
    pub fn new(host: RemoteHost) -> Self {
        Self {
            host,
            shell: None,
            pending: Vec::new(),
            debugger_command: None,
            closed: false,
        }
    }

    fn kill_leftover_debugger(&mut self, command_line: &str) -> crate::Result<()> {
        let children = self.host.execute(&format!(
            "ps -eo pid,command | grep {} | grep -v grep",
            shell_quote(command_line)
        ))?;

        if let [child] = children.lines().collect::<Vec<_>>().as_slice() {
            if let Some(pid) = child.split_whitespace().next() {
                self.host.execute(&format!("kill -9 {pid}"))?;
                tracing::debug!(pid, "leftover debugger killed");
            }
        }

        Ok(())
    }
}

impl Transport for RemoteTransport {
    #[tracing::instrument(name = "RemoteStart", skip(self))]
    fn start_debugger(&mut self, program: &str, args: &[String]) -> crate::Result<()> {
        let mut channel = self.host.session.channel_session()?;
        channel.request_pty("dumb", None, Some(PTY_SIZE))?;
        channel.shell()?;

        let command_line = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        channel.write_all(format!("{command_line}\n").as_bytes())?;
        channel.flush()?;

        self.shell = Some(channel);
        self.debugger_command = Some(command_line);

        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> crate::Result<()> {
        let shell = self.shell.as_mut().ok_or(Error::NotStarted)?;
        shell.write_all(bytes)?;
        shell.flush()?;
        Ok(())
    }

    fn receive_ready(&mut self) -> crate::Result<bool> {
        if !self.pending.is_empty() {
            return Ok(true);
        }

        let shell = self.shell.as_mut().ok_or(Error::NotStarted)?;

        let mut buf = [0u8; READ_BUFFER_LEN];

        self.host.session.set_blocking(false);
        let res = shell.read(&mut buf);
        self.host.session.set_blocking(true);

        match res {
            // a closed channel is "ready" so that the reader notices it
            Ok(0) => Ok(shell.eof()),
            Ok(n) => {
                self.pending.extend_from_slice(&buf[..n]);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn receive(&mut self) -> crate::Result<Vec<u8>> {
        if !self.pending.is_empty() {
            return Ok(std::mem::take(&mut self.pending));
        }

        let shell = self.shell.as_mut().ok_or(Error::NotStarted)?;

        let mut buf = [0u8; READ_BUFFER_LEN];
        let n = shell.read(&mut buf)?;

        if n == 0 {
            return Err(Error::TransportClosed);
        }

        Ok(buf[..n].to_vec())
    }

    fn execute_host_command(&mut self, command: &str) -> crate::Result<String> {
        self.host.execute(command)
    }

    fn host_file_exists(&mut self, path: &str) -> crate::Result<bool> {
        let status = self
            .host
            .execute(&format!("test -e {}; echo $?", shell_quote(path)))?;

        Ok(status == "0")
    }

    fn truncate_host_file(&mut self, path: &str) -> crate::Result<()> {
        self.host.execute(&format!(": > {}", shell_quote(path)))?;
        Ok(())
    }

    fn read_host_file(&mut self, path: &str) -> crate::Result<String> {
        self.host
            .execute(&format!("cat {} 2>/dev/null", shell_quote(path)))
    }

    fn remove_host_file(&mut self, path: &str) -> crate::Result<()> {
        self.host.execute(&format!("rm -f {}", shell_quote(path)))?;
        Ok(())
    }

    fn fetch_host_file(&mut self, path: &str) -> crate::Result<Option<TempPath>> {
        let basename = Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let local = tempfile::Builder::new()
            .prefix("rgdb_")
            .suffix(&format!("_{basename}"))
            .tempfile()?
            .into_temp_path();

        self.host.download(path, &local)?;

        tracing::debug!(remote = path, local = %local.display(), "source file fetched");

        Ok(Some(local))
    }

    fn capture_host(&mut self) -> Option<&mut dyn CaptureHost> {
        Some(&mut self.host)
    }

    fn close(&mut self) -> crate::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(mut shell) = self.shell.take() {
            let _ = shell.close();
        }

        if let Some(command_line) = self.debugger_command.take() {
            if let Err(e) = self.kill_leftover_debugger(&command_line) {
                tracing::warn!(error = %e, "failed to kill leftover debugger");
            }
        }

        self.host.disconnect()
    }
}

impl Drop for RemoteTransport {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close remote debugger");
        }
    }
}
