use std::collections::{HashMap, VecDeque};

use rgdb_session::Error;
use rgdb_session::transport::Transport;

/// Answer of the fake debugger to one command.
#[derive(Default)]
pub struct Reply {
    text: String,
    program_output: Option<String>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            program_output: None,
        }
    }

    /// Output written by the debuggee while executing the command.
    pub fn with_program_output(mut self, output: impl Into<String>) -> Self {
        self.program_output = Some(output.into());
        self
    }
}

/// In-memory debugger answering commands with a user-provided function.
///
/// Answers are framed like a real debugger's: the echoed command line, the
/// answer, and the prompt, with `\r\n` line endings.
pub struct FakeDebugger {
    uname: String,
    prompt: String,
    answer: Box<dyn FnMut(&str) -> Reply>,
    pending: VecDeque<Vec<u8>>,
    sent: Vec<String>,
    files: HashMap<String, String>,

    /// Where the debuggee's output goes (from the `&>` redirection).
    redirection: Option<String>,

    started: Option<(String, Vec<String>)>,
    closed: bool,
}

impl FakeDebugger {
    /// Fake `gdb` on a Linux host.
    pub fn gdb(answer: impl FnMut(&str) -> Reply + 'static) -> Self {
        Self::new("Linux", "(gdb) ", answer)
    }

    /// Fake `lldb` on a Darwin host.
    pub fn lldb(answer: impl FnMut(&str) -> Reply + 'static) -> Self {
        Self::new("Darwin", "(lldb) ", answer)
    }

    fn new(uname: &str, prompt: &str, answer: impl FnMut(&str) -> Reply + 'static) -> Self {
        Self {
            uname: uname.to_owned(),
            prompt: prompt.to_owned(),
            answer: Box::new(answer),
            pending: VecDeque::new(),
            sent: Vec::new(),
            files: HashMap::new(),
            redirection: None,
            started: None,
            closed: false,
        }
    }

    /// Adds a file to the host.
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_owned(), content.to_owned());
        self
    }

    /// Command lines received by the debugger (without line endings).
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn files(&self) -> &HashMap<String, String> {
        &self.files
    }

    pub fn started(&self) -> Option<&(String, Vec<String>)> {
        self.started.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Transport for FakeDebugger {
    fn start_debugger(&mut self, program: &str, args: &[String]) -> rgdb_session::Result<()> {
        self.started = Some((program.to_owned(), args.to_vec()));
        self.pending
            .push_back(format!("Fake {program} 1.0\r\n{}", self.prompt).into_bytes());
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> rgdb_session::Result<()> {
        if self.closed || self.started.is_none() {
            return Err(Error::TransportClosed);
        }

        let line = String::from_utf8_lossy(bytes).trim().to_owned();

        if let Some((_, path)) = line.split_once("&>") {
            self.redirection = Some(path.trim().to_owned());
        }

        let reply = (self.answer)(&line);

        if let (Some(output), Some(path)) = (reply.program_output, &self.redirection) {
            self.files.entry(path.clone()).or_default().push_str(&output);
        }

        let mut chunk = format!("{line}\r\n");
        if !reply.text.is_empty() {
            chunk.push_str(&reply.text.replace('\n', "\r\n"));
            chunk.push_str("\r\n");
        }
        chunk.push_str(&self.prompt);

        // delivered in two chunks, as a pty would (possibly mid-character)
        let (head, tail) = chunk.as_bytes().split_at(chunk.len() / 2);
        self.pending.push_back(head.to_vec());
        self.pending.push_back(tail.to_vec());

        self.sent.push(line);

        Ok(())
    }

    fn receive_ready(&mut self) -> rgdb_session::Result<bool> {
        Ok(!self.pending.is_empty())
    }

    fn receive(&mut self) -> rgdb_session::Result<Vec<u8>> {
        self.pending.pop_front().ok_or(Error::TransportClosed)
    }

    fn execute_host_command(&mut self, command: &str) -> rgdb_session::Result<String> {
        match command {
            "uname" => Ok(self.uname.clone()),
            _ => Ok(String::new()),
        }
    }

    fn host_file_exists(&mut self, path: &str) -> rgdb_session::Result<bool> {
        Ok(self.files.contains_key(path))
    }

    fn truncate_host_file(&mut self, path: &str) -> rgdb_session::Result<()> {
        self.files.insert(path.to_owned(), String::new());
        Ok(())
    }

    fn read_host_file(&mut self, path: &str) -> rgdb_session::Result<String> {
        Ok(self.files.get(path).cloned().unwrap_or_default())
    }

    fn remove_host_file(&mut self, path: &str) -> rgdb_session::Result<()> {
        self.files.remove(path);
        Ok(())
    }

    fn close(&mut self) -> rgdb_session::Result<()> {
        self.closed = true;
        Ok(())
    }
}
