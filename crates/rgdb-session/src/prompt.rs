use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::transport::Transport;
use crate::{Dialect, Error};

/// Idle time between two polls of the debugger's output.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Answer sent to confirmation questions.
const CONFIRMATION_ANSWER: &[u8] = b"y\n";

/// Kind of line ending a debugger's answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Boundary {
    /// The debugger waits for a new command.
    Prompt,

    /// The debugger waits for a yes/no answer.
    Confirmation,
}

/// Splits the debugger's output stream into the answers of single commands.
///
/// Confirmation questions are always answered with "yes", and never shown to
/// the operator.
#[derive(Clone, Debug)]
pub struct PromptSync {
    dialect: Dialect,
    poll_interval: Duration,
}

impl PromptSync {
    /// Creates a new synchronizer for the given dialect.
    pub const fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Overrides the idle time between two polls.
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Reads the debugger's output until it prompts for a new command.
    ///
    /// The echoed command line and the prompt itself are stripped from the
    /// returned text. A confirmation question anywhere in the output is
    /// answered once, and its line is dropped.
    ///
    /// # Note
    ///
    /// There is no timeout: a command like `continue` may block for as long
    /// as the debuggee runs. The wait only stops early when `cancel` is
    /// triggered.
    pub fn wait(
        &self,
        transport: &mut (impl Transport + ?Sized),
        cancel: &CancellationToken,
    ) -> crate::Result<String> {
        let mut answers = Vec::new();
        let mut data = String::new();

        // bytes of a character split across chunks
        let mut partial = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut received = false;

            if transport.receive_ready()? {
                let chunk = transport.receive()?;
                tracing::trace!(chunk = %chunk.escape_ascii(), "received");

                received = !chunk.is_empty();
                partial.extend_from_slice(&chunk);
                data.push_str(&decode_complete(&mut partial));
            }

            match self.boundary(&data) {
                Some(Boundary::Prompt) => {
                    answers.push(self.answer(&data));
                    break;
                }
                Some(Boundary::Confirmation) => {
                    tracing::debug!("confirming");

                    answers.push(self.answer(&data));
                    data.clear();

                    transport.send(CONFIRMATION_ANSWER)?;
                }
                None if !received => std::thread::sleep(self.poll_interval),
                None => (),
            }
        }

        Ok(answers
            .iter()
            .map(|answer| answer.as_str())
            .filter(|answer| !answer.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_owned())
    }

    fn boundary(&self, data: &str) -> Option<Boundary> {
        let last_line = data.lines().map(str::trim).rfind(|line| !line.is_empty())?;

        if self.is_question(last_line) {
            Some(Boundary::Confirmation)
        } else if last_line.contains(self.dialect.prompt_marker()) {
            if data.lines().any(|line| self.is_question(line)) {
                Some(Boundary::Confirmation)
            } else {
                Some(Boundary::Prompt)
            }
        } else {
            None
        }
    }

    fn is_question(&self, line: &str) -> bool {
        self.dialect
            .confirmation_markers()
            .iter()
            .any(|marker| line.contains(marker))
    }

    /// Text of one answer, without its confirmation questions.
    fn answer(&self, data: &str) -> String {
        interior(data)
            .split('\n')
            .filter(|line| !self.is_question(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Decodes the complete UTF-8 characters of `bytes`, leaving a trailing
/// incomplete one (if any) for the next chunk.
///
/// Invalid sequences are replaced with U+FFFD.
fn decode_complete(bytes: &mut Vec<u8>) -> String {
    let mut text = String::new();

    loop {
        let (valid_up_to, invalid_len) = match std::str::from_utf8(bytes) {
            Ok(_) => (bytes.len(), None),
            Err(e) => (e.valid_up_to(), e.error_len()),
        };

        text.push_str(&String::from_utf8_lossy(&bytes[..valid_up_to]));

        match invalid_len {
            Some(len) => {
                text.push(char::REPLACEMENT_CHARACTER);
                bytes.drain(..valid_up_to + len);
            }
            // complete, or ending with the start of a character
            None => {
                bytes.drain(..valid_up_to);
                break;
            }
        }
    }

    text
}

/// Strips the first (echoed command) and last (prompt) lines.
fn interior(data: &str) -> String {
    let lines = data.trim_end().split('\n').collect::<Vec<_>>();

    match lines.as_slice() {
        [_, interior @ .., _] => interior.join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use tokio_util::sync::CancellationToken;

    use super::{Boundary, PromptSync, decode_complete, interior};
    use crate::Dialect;
    use crate::transport::tests::ScriptedTransport;

    #[test]
    fn boundaries() {
        let sync = PromptSync::new(Dialect::Gdb);

        assert_eq!(sync.boundary(""), None);
        assert_eq!(sync.boundary("next\n"), None);
        assert_eq!(sync.boundary("next\n5\tx++;\n(gdb) "), Some(Boundary::Prompt));
        assert_eq!(sync.boundary("next\n(gdb) \n\n"), Some(Boundary::Prompt));
        assert_eq!(sync.boundary("(rgdb) cmd\n"), None);
        assert_eq!(
            sync.boundary("run\nStart it from the beginning? (y or n) "),
            Some(Boundary::Confirmation)
        );
        assert_eq!(
            sync.boundary("break q\nMake breakpoint pending? (y or [n]) "),
            Some(Boundary::Confirmation)
        );
        assert_eq!(sync.boundary("run\n(lldb) "), None);
        assert_eq!(
            sync.boundary("break q\nMake q breakpoint pending? (y or n)\n(gdb) "),
            Some(Boundary::Confirmation)
        );

        let sync = PromptSync::new(Dialect::Lldb);
        assert_eq!(sync.boundary("run\n(lldb) "), Some(Boundary::Prompt));
        assert_eq!(
            sync.boundary("r\nkill it and restart?: [Y/n] "),
            Some(Boundary::Confirmation)
        );
    }

    #[test]
    fn interior_lines() {
        assert_eq!(interior(""), "");
        assert_eq!(interior("(gdb) "), "");
        assert_eq!(interior("next\n(gdb) "), "");
        assert_eq!(interior("next\none\ntwo\n(gdb) \n"), "one\ntwo");
    }

    #[test]
    fn strips_echo_and_prompt() {
        let mut transport = ScriptedTransport::new([indoc! {"
            (rgdb) cmd
            output line 1
            output line 2
            (gdb)"}]);

        let answer = PromptSync::new(Dialect::Gdb)
            .wait(&mut transport, &CancellationToken::new())
            .expect("wait");

        assert_eq!(answer, "output line 1\noutput line 2");
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn waits_across_chunks() {
        let mut transport = ScriptedTransport::new([
            "info line\r\n",
            "",
            "Line 3 of \"main.c\"",
            " starts at address 0x1139 <main+4>.\r\n(gd",
            "b) ",
        ]);

        let answer = PromptSync::new(Dialect::Gdb)
            .wait(&mut transport, &CancellationToken::new())
            .expect("wait");

        assert_eq!(answer, "Line 3 of \"main.c\" starts at address 0x1139 <main+4>.");
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn confirms_automatically() {
        let mut transport = ScriptedTransport::new([
            indoc! {"
                break q
                Function \"q\" not defined.
                Make q breakpoint pending on future shared library load? (y or [n]) "},
            indoc! {"
                y
                Breakpoint 1 (q) pending.
                (gdb) "},
        ]);

        let answer = PromptSync::new(Dialect::Gdb)
            .wait(&mut transport, &CancellationToken::new())
            .expect("wait");

        assert_eq!(answer, "Function \"q\" not defined.\nBreakpoint 1 (q) pending.");
        assert!(!answer.contains("(y or"));
        assert_eq!(transport.sent(), ["y\n"]);
    }

    #[test]
    fn confirms_question_followed_by_prompt() {
        let mut transport = ScriptedTransport::new([
            indoc! {"
                break q
                ...
                Make q breakpoint pending on future shared library load? (y or n)
                (gdb) "},
            "y\n(gdb) ",
        ]);

        let answer = PromptSync::new(Dialect::Gdb)
            .wait(&mut transport, &CancellationToken::new())
            .expect("wait");

        assert_eq!(answer, "...");
        assert_eq!(transport.sent(), ["y\n"]);
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn character_split_across_chunks() {
        let mut transport = ScriptedTransport::from_bytes([
            &b"info source\nLocated in /home/jos\xc3"[..],
            &b"\xa9/src/main.c\n(gdb) "[..],
        ]);

        let answer = PromptSync::new(Dialect::Gdb)
            .wait(&mut transport, &CancellationToken::new())
            .expect("wait");

        assert_eq!(answer, "Located in /home/jos\u{e9}/src/main.c");
    }

    #[test]
    fn utf8_decoding() {
        let mut bytes = b"ab\xc3".to_vec();
        assert_eq!(decode_complete(&mut bytes), "ab");
        assert_eq!(bytes, b"\xc3");

        bytes.push(0xa9);
        assert_eq!(decode_complete(&mut bytes), "\u{e9}");
        assert!(bytes.is_empty());

        let mut bytes = b"a\xffb".to_vec();
        assert_eq!(decode_complete(&mut bytes), "a\u{fffd}b");
        assert!(bytes.is_empty());
    }

    #[test]
    fn cancelled_wait() {
        let mut transport = ScriptedTransport::new(["continue\n", "Continuing.\n"]);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let res = PromptSync::new(Dialect::Gdb).wait(&mut transport, &cancel);

        assert!(matches!(res, Err(crate::Error::Cancelled)));
    }

    #[test]
    fn hang_up_while_waiting() {
        let mut transport = ScriptedTransport::new(["continue\n"]);

        let res = PromptSync::new(Dialect::Gdb).wait(&mut transport, &CancellationToken::new());

        assert!(matches!(res, Err(crate::Error::TransportClosed)));
    }
}
