use std::process::{Child, Command};
use std::time::Duration;

use rgdb_session::ZmqUiLink;

/// Ports from which a viewer port is randomly picked.
pub const VIEWER_PORTS: std::ops::RangeInclusive<u16> = 5000..=6000;

/// Attempts to connect to a freshly launched viewer.
const CONNECT_ATTEMPTS: usize = 25;

/// Delay between two connection attempts.
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Builds the command launching the source viewer `program` in a new
/// terminal window (if a terminal emulator is installed).
pub fn viewer_command(program: &str, port: u16, title: &str) -> Command {
    let port = port.to_string();

    if let Ok(terminal) = which::which("gnome-terminal") {
        let mut command = Command::new(terminal);
        command.args(["--title", title, "--", program, port.as_str()]);
        command
    } else if let Ok(terminal) = which::which("xterm") {
        let mut command = Command::new(terminal);
        command.args([
            "-T", title, "-bg", "white", "-fg", "black", "-fn", "9x15", "-e", program, port.as_str(),
        ]);
        command
    } else {
        let mut command = Command::new(program);
        command.arg(&port);
        command
    }
}

/// Launches the source viewer, listening on the given port.
pub fn launch_viewer(program: &str, port: u16, title: &str) -> std::io::Result<Child> {
    let mut command = viewer_command(program, port, title);

    tracing::debug!(?command, "launching viewer");

    command
        .stdin(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
}

/// Connects to the viewer listening on `port`, waiting for it to start.
pub fn connect_viewer(
    port: u16,
    runtime: &tokio::runtime::Handle,
) -> rgdb_session::Result<ZmqUiLink> {
    let mut attempt = 1;

    loop {
        match ZmqUiLink::connect(port, runtime.clone()) {
            Ok(link) => return Ok(link),
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                tracing::debug!(error = %e, attempt, "viewer not ready");
                attempt += 1;
                std::thread::sleep(CONNECT_RETRY_DELAY);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::viewer_command;

    #[test]
    fn viewer_gets_its_port() {
        let command = viewer_command("rgdb-ui", 5123, "rgdb a.out");

        assert_eq!(
            command.get_args().last().and_then(|arg| arg.to_str()),
            Some("5123")
        );
    }
}
