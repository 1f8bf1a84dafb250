use std::fmt;

/// Verbs after which the debuggee has (possibly) moved to another location.
const FLOW_CONTROL_VERBS: [&str; 5] = ["next", "step", "continue", "finish", "run"];

/// A canonical debugger command, as typed by the operator.
///
/// The first token is the verb (e.g., `break`, `run`, `info`), the following
/// ones are its arguments. Rewriting a command (dialect translation, output
/// redirection) always produces a new `Command`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Command {
    tokens: Vec<String>,
}

impl Command {
    /// Creates a new command from the given tokens.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits an operator's input line into a command.
    ///
    /// Returns `None` if the line is blank.
    pub fn parse(line: &str) -> Option<Self> {
        let command = Self::new(line.split_whitespace());
        (!command.tokens.is_empty()).then_some(command)
    }

    /// Returns the verb of this command.
    pub fn verb(&self) -> &str {
        self.tokens.first().map_or("", String::as_str)
    }

    /// Returns the argument at the given index (the verb excluded).
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.tokens.get(index + 1).map(String::as_str)
    }

    /// Returns all tokens of this command.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Returns a copy of this command with an additional trailing token.
    pub fn with_arg(&self, arg: impl Into<String>) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(arg.into());
        Self { tokens }
    }

    /// Whether this command is `run`.
    pub fn is_run(&self) -> bool {
        self.verb() == "run"
    }

    /// Whether this command moves the debuggee (and thus its current source
    /// location).
    pub fn is_flow_control(&self) -> bool {
        FLOW_CONTROL_VERBS.contains(&self.verb()) || self.verb().contains("reverse")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tokens.join(" ").trim())
    }
}
