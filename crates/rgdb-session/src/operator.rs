//! Interactions with the operator driving the session.

use std::fmt::Display;

use crate::Error;

/// Source of operator answers, and sink of messages shown to the operator.
pub trait Operator {
    /// Asks the operator a question, and returns the answer.
    ///
    /// Returns `None` when the operator's input is exhausted.
    fn ask(&mut self, question: &str) -> crate::Result<Option<String>>;

    /// Shows a line of text to the operator.
    fn say(&mut self, text: &str) -> crate::Result<()>;
}

/// Lists `entries` to the operator, and asks for the index of one of them
/// until a valid index is typed.
pub fn select_entry(
    operator: &mut dyn Operator,
    question: &str,
    entries: &[impl Display],
) -> crate::Result<usize> {
    operator.say("")?;
    for (i, entry) in entries.iter().enumerate() {
        operator.say(&format!("\t{i}:\t{entry}"))?;
    }

    loop {
        let answer = operator.ask(question)?.ok_or(Error::InputClosed)?;

        match answer.trim().parse::<usize>() {
            Ok(index) if index < entries.len() => return Ok(index),
            _ => tracing::debug!(answer = %answer, "invalid selection"),
        }
    }
}
