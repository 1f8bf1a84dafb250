mod debugger;

use rgdb_session::UiLink;

pub use self::debugger::{FakeDebugger, Reply};

/// Viewer link recording every request.
#[derive(Default)]
pub struct RecordingLink {
    pub requests: Vec<String>,
}

impl UiLink for RecordingLink {
    fn request(&mut self, message: &str) -> rgdb_session::Result<String> {
        self.requests.push(message.to_owned());
        Ok("ok".to_owned())
    }
}

/// Operator that must never be asked anything.
pub struct MuteOperator;

impl rgdb_session::Operator for MuteOperator {
    fn ask(&mut self, question: &str) -> rgdb_session::Result<Option<String>> {
        panic!("unexpected question: {question}");
    }

    fn say(&mut self, _text: &str) -> rgdb_session::Result<()> {
        Ok(())
    }
}
