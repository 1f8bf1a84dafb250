use std::io::Write;

use crate::Command;
use crate::transport::Transport;

/// Advisory lines printed by the debugger when starting a program.
const NOISE_PREFIXES: [&str; 2] = ["Missing separate debuginfo for", "Try: "];

/// Marker framing the debuggee's output.
const FRAME_MARKER: &str = "... ...";

/// Keeps the debuggee's output apart from the debugger's output.
///
/// The debuggee's standard output and error are redirected to a side file on
/// the host (by rewriting `run` commands), which is echoed and emptied after
/// each command.
#[derive(Clone, Debug)]
pub struct OutputSplitter {
    program_output: String,
}

impl OutputSplitter {
    /// Creates a new splitter redirecting the debuggee's output to the given
    /// host file.
    pub fn new(program_output: impl Into<String>) -> Self {
        Self {
            program_output: program_output.into(),
        }
    }

    /// Path (on the host) of the debuggee's output file.
    pub fn program_output(&self) -> &str {
        &self.program_output
    }

    /// Redirects the output of the debuggee started by `command` (if any).
    pub fn redirect(&self, command: &Command) -> Command {
        if command.is_run() {
            command.with_arg(format!("&>{}", self.program_output))
        } else {
            command.clone()
        }
    }

    /// Extracts what the operator should see of the debugger's answer to
    /// `command`: its last paragraph.
    pub fn display_text(&self, command: &Command, answer: &str) -> String {
        let answer = if command.is_run() {
            answer
                .lines()
                .filter(|line| !NOISE_PREFIXES.iter().any(|noise| line.starts_with(noise)))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            answer.to_owned()
        };

        answer
            .replace('\r', "")
            .split("\n\n")
            .last()
            .unwrap_or_default()
            .trim()
            .to_owned()
    }

    /// Writes the debuggee's pending output (framed) to `out`, and empties
    /// the output file.
    pub fn flush_program_output(
        &self,
        transport: &mut (impl Transport + ?Sized),
        out: &mut (impl Write + ?Sized),
    ) -> crate::Result<()> {
        let output = transport.read_host_file(&self.program_output)?;
        let output = output.trim_end();

        if !output.is_empty() {
            write!(out, "\n{FRAME_MARKER}\n{output}\n{FRAME_MARKER}\n\n")?;
        }

        transport.truncate_host_file(&self.program_output)?;

        Ok(())
    }
}
