//! Synchronization of an external source viewer with the debuggee's current
//! location.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::runtime::Handle;
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use crate::Error;

/// Message asking the viewer to terminate.
const EXIT_MESSAGE: &str = "exit";

/// How long the viewer is given to acknowledge [EXIT_MESSAGE].
const EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Request/reply channel to the external viewer.
pub trait UiLink {
    /// Sends a message, and blocks until the viewer replies.
    fn request(&mut self, message: &str) -> crate::Result<String>;

    /// Sends a message, and waits at most `timeout` for the viewer's reply.
    fn request_within(&mut self, message: &str, _timeout: Duration) -> crate::Result<String> {
        self.request(message)
    }
}

/// [UiLink] over a ZeroMQ REQ socket.
///
/// The socket is driven by a tokio runtime, so that this link can be used
/// from synchronous code (outside of the runtime's worker threads).
pub struct ZmqUiLink {
    socket: ReqSocket,
    runtime: Handle,
}

impl ZmqUiLink {
    /// Connects to a viewer listening on the given local TCP port.
    pub fn connect(port: u16, runtime: Handle) -> crate::Result<Self> {
        let endpoint = format!("tcp://127.0.0.1:{port}");

        let mut socket = ReqSocket::new();
        runtime.block_on(socket.connect(&endpoint))?;

        tracing::debug!(endpoint, "connected to viewer");

        Ok(Self { socket, runtime })
    }
}

impl ZmqUiLink {
    fn exchange(&mut self, message: &str, timeout: Option<Duration>) -> crate::Result<String> {
        let socket = &mut self.socket;

        let exchange = async move {
            socket.send(ZmqMessage::from(message.to_owned())).await?;
            socket.recv().await
        };

        let reply = match timeout {
            Some(timeout) => self
                .runtime
                .block_on(tokio::time::timeout(timeout, exchange))
                .map_err(|_| Error::UiTimeout(timeout))??,
            None => self.runtime.block_on(exchange)?,
        };

        Ok(reply
            .into_vec()
            .iter()
            .map(|frame| String::from_utf8_lossy(frame))
            .collect())
    }
}

impl UiLink for ZmqUiLink {
    fn request(&mut self, message: &str) -> crate::Result<String> {
        self.exchange(message, None)
    }

    fn request_within(&mut self, message: &str, timeout: Duration) -> crate::Result<String> {
        self.exchange(message, Some(timeout))
    }
}

/// Pushes the debuggee's current location to the external viewer when it
/// changes.
pub struct LocationNotifier<L> {
    link: L,

    /// Last location sent.
    last: Option<(PathBuf, u32)>,

    shut_down: bool,
    exit_timeout: Duration,
}

impl<L: UiLink> LocationNotifier<L> {
    /// Creates a new notifier sending locations over `link`.
    pub fn new(link: L) -> Self {
        Self {
            link,
            last: None,
            shut_down: false,
            exit_timeout: EXIT_TIMEOUT,
        }
    }

    /// Overrides how long the viewer is given to acknowledge a shutdown.
    pub fn with_exit_timeout(mut self, exit_timeout: Duration) -> Self {
        self.exit_timeout = exit_timeout;
        self
    }

    /// Returns the link to the viewer.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Returns the last location sent, if any.
    pub fn last(&self) -> Option<(&Path, u32)> {
        self.last.as_ref().map(|(path, line)| (path.as_path(), *line))
    }

    /// Sends `path:line` to the viewer, unless it is the last location sent.
    ///
    /// Returns whether a message was sent.
    #[tracing::instrument(name = "Notify", skip(self), fields(path = %path.display()))]
    pub fn notify(&mut self, path: &Path, line: u32) -> crate::Result<bool> {
        let changed = match &self.last {
            Some((last_path, last_line)) => {
                (line != *last_line && last_path == path) || last_path != path
            }
            None => true,
        };

        if !changed {
            return Ok(false);
        }

        self.link.request(&format!("{}:{line}", path.display()))?;
        self.last = Some((path.to_path_buf(), line));

        Ok(true)
    }

    /// Asks the viewer to terminate.
    ///
    /// The viewer's acknowledgement is awaited for a bounded time only, so
    /// that an unresponsive viewer cannot hold up the session's teardown.
    /// Calling this function more than once has no effect.
    pub fn shutdown(&mut self) -> crate::Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        self.link.request_within(EXIT_MESSAGE, self.exit_timeout)?;

        tracing::debug!("viewer shut down");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use test_log::test;
    use zeromq::{Endpoint, RepSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

    use super::{LocationNotifier, UiLink, ZmqUiLink};
    use crate::Error;

    #[derive(Default)]
    struct RecordingLink {
        requests: Vec<String>,
    }

    impl UiLink for RecordingLink {
        fn request(&mut self, message: &str) -> crate::Result<String> {
            self.requests.push(message.to_owned());
            Ok("ok".to_owned())
        }
    }

    #[test]
    fn same_location_is_sent_once() {
        let mut notifier = LocationNotifier::new(RecordingLink::default());

        assert!(notifier.notify(Path::new("/src/main.c"), 3).expect("notify"));
        assert!(!notifier.notify(Path::new("/src/main.c"), 3).expect("notify"));

        assert_eq!(notifier.link.requests, ["/src/main.c:3"]);
        assert_eq!(notifier.last(), Some((Path::new("/src/main.c"), 3)));
    }

    #[test]
    fn line_and_file_changes_are_sent() {
        let mut notifier = LocationNotifier::new(RecordingLink::default());

        notifier.notify(Path::new("/src/main.c"), 3).expect("notify");
        notifier.notify(Path::new("/src/main.c"), 4).expect("notify");
        notifier.notify(Path::new("/src/math.c"), 4).expect("notify");
        notifier.notify(Path::new("/src/main.c"), 4).expect("notify");

        assert_eq!(
            notifier.link.requests,
            [
                "/src/main.c:3",
                "/src/main.c:4",
                "/src/math.c:4",
                "/src/main.c:4"
            ]
        );
    }

    #[test]
    fn shutdown_once() {
        let mut notifier = LocationNotifier::new(RecordingLink::default());

        notifier.shutdown().expect("shutdown");
        notifier.shutdown().expect("shutdown");

        assert_eq!(notifier.link.requests, ["exit"]);
    }

    #[test]
    fn zmq_request_reply() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("runtime");

        let mut viewer = RepSocket::new();
        let endpoint = runtime
            .block_on(viewer.bind("tcp://127.0.0.1:0"))
            .expect("bind");
        let Endpoint::Tcp(_, port) = endpoint else {
            panic!("unexpected endpoint: {endpoint}");
        };

        let viewer = runtime.spawn(async move {
            let mut received = Vec::new();
            loop {
                let request = viewer.recv().await.expect("recv");
                let request = String::try_from(request).expect("utf-8");
                viewer
                    .send(ZmqMessage::from("ok"))
                    .await
                    .expect("send");

                let exit = request == "exit";
                received.push(request);
                if exit {
                    break received;
                }
            }
        });

        let link = ZmqUiLink::connect(port, runtime.handle().clone()).expect("connect");
        let mut notifier = LocationNotifier::new(link);

        notifier.notify(Path::new("/src/main.c"), 7).expect("notify");
        notifier.shutdown().expect("shutdown");

        let received = runtime.block_on(viewer).expect("viewer");
        assert_eq!(received, ["/src/main.c:7", "exit"]);
    }

    #[test]
    fn unresponsive_viewer_does_not_block_shutdown() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("runtime");

        let mut viewer = RepSocket::new();
        let endpoint = runtime
            .block_on(viewer.bind("tcp://127.0.0.1:0"))
            .expect("bind");
        let Endpoint::Tcp(_, port) = endpoint else {
            panic!("unexpected endpoint: {endpoint}");
        };

        // receives the exit request, and never replies
        let viewer = runtime.spawn(async move {
            let request = viewer.recv().await.expect("recv");
            let request = String::try_from(request).expect("utf-8");
            (viewer, request)
        });

        let link = ZmqUiLink::connect(port, runtime.handle().clone()).expect("connect");
        let mut notifier =
            LocationNotifier::new(link).with_exit_timeout(Duration::from_millis(200));

        assert!(matches!(notifier.shutdown(), Err(Error::UiTimeout(_))));
        // not retried
        notifier.shutdown().expect("shutdown");

        let (_viewer, request) = runtime.block_on(viewer).expect("viewer");
        assert_eq!(request, "exit");
    }
}
