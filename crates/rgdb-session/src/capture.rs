//! Packet capture around stepping commands, on remote hosts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexSet;

use crate::operator::{Operator, select_entry};

/// Where the capture is written to on the remote host.
const REMOTE_CAPTURE_PATH: &str = "/tmp/tcpdump_debug.out";

/// Time given to the capture tool to start before the command is issued.
const STARTUP_DELAY: Duration = Duration::from_secs(2);

/// Time given to packets to accumulate after the command returned.
const COLLECT_DELAY: Duration = Duration::from_secs(1);

/// Host operations needed for capturing packets.
pub trait CaptureHost {
    /// Runs a command and returns its (trimmed) standard output.
    fn execute(&mut self, command: &str) -> crate::Result<String>;

    /// Starts a command in the background, and returns its PID.
    fn spawn_background(&mut self, command: &str) -> crate::Result<u32>;

    /// Terminates a command started by [CaptureHost::spawn_background], and
    /// releases what was held for it.
    fn stop_background(&mut self, pid: u32) -> crate::Result<()>;

    /// Copies a host file to a local path.
    fn download(&mut self, remote: &str, local: &Path) -> crate::Result<()>;
}

/// A capture running on the host.
#[derive(Debug)]
pub struct RunningCapture {
    pid: u32,
}

/// Packet capture helper.
///
/// The network interface to monitor is selected on first use, and reused
/// for subsequent captures.
pub struct PacketCapture {
    interface: Option<String>,

    /// Local destination of fetched captures.
    local_path: PathBuf,

    /// Program opening fetched captures.
    viewer: Option<String>,

    startup_delay: Duration,
    collect_delay: Duration,
}

impl Default for PacketCapture {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("tcpdump_debug.out"))
    }
}

impl PacketCapture {
    /// Creates a new helper fetching captures to `local_path`.
    pub fn new(local_path: impl Into<PathBuf>) -> Self {
        Self {
            interface: None,
            local_path: local_path.into(),
            viewer: Some("wireshark".to_owned()),
            startup_delay: STARTUP_DELAY,
            collect_delay: COLLECT_DELAY,
        }
    }

    /// Overrides the delays waited around the captured command.
    pub fn with_delays(mut self, startup: Duration, collect: Duration) -> Self {
        self.startup_delay = startup;
        self.collect_delay = collect;
        self
    }

    /// Overrides the program opening fetched captures (`None` disables it).
    pub fn with_viewer(mut self, viewer: Option<String>) -> Self {
        self.viewer = viewer;
        self
    }

    /// Returns the selected network interface, if any.
    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    /// Starts capturing packets on the host (optionally filtered on `port`).
    #[tracing::instrument(name = "CaptureStart", skip(self, host, operator))]
    pub fn start(
        &mut self,
        host: &mut dyn CaptureHost,
        operator: &mut dyn Operator,
        port: Option<&str>,
    ) -> crate::Result<RunningCapture> {
        let interface = self.select_interface(host, operator)?;

        let mut command = format!("tcpdump -i {interface} -s0 -w {REMOTE_CAPTURE_PATH}");
        if let Some(port) = port {
            command.push_str(&format!(" port {port}"));
        }

        let pid = host.spawn_background(&command)?;

        tracing::debug!(pid, "capture started");

        std::thread::sleep(self.startup_delay);

        Ok(RunningCapture { pid })
    }

    /// Stops a capture, fetches it, and opens it in a viewer (if one is
    /// installed).
    ///
    /// Failures are logged and otherwise ignored.
    #[tracing::instrument(name = "CaptureFinish", skip(self, host))]
    pub fn finish(
        &mut self,
        host: &mut dyn CaptureHost,
        capture: RunningCapture,
    ) -> Option<PathBuf> {
        std::thread::sleep(self.collect_delay);

        if let Err(e) = host.stop_background(capture.pid) {
            tracing::warn!(error = %e, "failed to stop capture");
        }

        if let Err(e) = host.download(REMOTE_CAPTURE_PATH, &self.local_path) {
            tracing::warn!(error = %e, "failed to fetch capture");
            return None;
        }

        match self.viewer.as_deref().map(which::which) {
            Some(Ok(viewer)) => {
                if let Err(e) = std::process::Command::new(viewer)
                    .arg(&self.local_path)
                    .spawn()
                {
                    tracing::warn!(error = %e, "failed to launch capture viewer");
                }
            }
            _ => tracing::info!(path = %self.local_path.display(), "capture not opened"),
        }

        Some(self.local_path.clone())
    }

    fn select_interface(
        &mut self,
        host: &mut dyn CaptureHost,
        operator: &mut dyn Operator,
    ) -> crate::Result<String> {
        if let Some(interface) = &self.interface {
            return Ok(interface.clone());
        }

        let listing = host.execute("netstat -i | cut -d' ' -f1")?;
        let interfaces = parse_interfaces(&listing);

        let interface = match interfaces.as_slice() {
            [] => return Err(std::io::Error::other("no network interface found").into()),
            [interface] => interface.clone(),
            _ => {
                let index = select_entry(
                    operator,
                    "Monitor traffic on which ethernet controller? ",
                    &interfaces,
                )?;
                interfaces[index].clone()
            }
        };

        self.interface = Some(interface.clone());

        Ok(interface)
    }
}

/// Extracts interface names from the first column of `netstat -i`.
fn parse_interfaces(listing: &str) -> Vec<String> {
    const HEADERS: [&str; 3] = ["Kernel", "Iface", "Name"];

    listing
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty() && !HEADERS.contains(name) && !name.starts_with("lo"))
        .map(str::to_owned)
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}
