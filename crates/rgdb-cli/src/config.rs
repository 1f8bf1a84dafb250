use std::path::{Path, PathBuf};

use miette::IntoDiagnostic;
use rgdb_session::{Error, Operator};

/// Persisted settings of rgdb.
#[derive(Debug, PartialEq, knus::Decode)]
pub struct Settings {
    /// Root of the local source tree.
    #[knus(child, unwrap(argument))]
    pub code_path: String,

    /// Path to a ctags file.
    #[knus(child, unwrap(argument))]
    pub tags_file: Option<String>,

    /// Whether to record execution after `run`, for reverse debugging.
    #[knus(child)]
    pub reverse: bool,
}

impl Settings {
    /// Default location of the settings file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rgdb").join("settings.kdl"))
    }

    /// Parses settings from their KDL representation.
    pub fn parse(filename: &str, content: &str) -> miette::Result<Self> {
        let settings: Self = knus::parse(filename, content)?;

        if settings.code_path.trim().is_empty() {
            miette::bail!("{filename}: empty code-path");
        }

        Ok(settings)
    }

    /// Loads settings from `path`, or asks the operator for them (and saves
    /// them to `path`) if the file does not exist.
    pub fn load_or_bootstrap(path: &Path, operator: &mut dyn Operator) -> miette::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).into_diagnostic()?;
            return Self::parse(&path.display().to_string(), &content);
        }

        let settings = Self::bootstrap(operator).into_diagnostic()?;

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).into_diagnostic()?;
        }
        std::fs::write(path, settings.to_kdl()).into_diagnostic()?;

        tracing::info!(path = %path.display(), "settings saved");

        Ok(settings)
    }

    /// Asks the operator for the settings.
    pub fn bootstrap(operator: &mut dyn Operator) -> rgdb_session::Result<Self> {
        let code_path = loop {
            let answer = operator
                .ask("Enter a base path for your code directory: ")?
                .ok_or(Error::InputClosed)?;

            if !answer.trim().is_empty() {
                break answer.trim().to_owned();
            }
        };

        let tags_file = operator
            .ask("Enter a tag file path (optional): ")?
            .ok_or(Error::InputClosed)?;

        let reverse = operator
            .ask("Enable reverse debugging (true/false)? ")?
            .ok_or(Error::InputClosed)?;

        Ok(Self {
            code_path,
            tags_file: Some(tags_file.trim().to_owned()).filter(|tags| !tags.is_empty()),
            reverse: reverse.trim().eq_ignore_ascii_case("true"),
        })
    }

    /// Path to the ctags file, if any.
    pub fn tags_file(&self) -> Option<&Path> {
        self.tags_file
            .as_deref()
            .filter(|tags| !tags.is_empty())
            .map(Path::new)
    }

    /// Serializes the settings into KDL.
    pub fn to_kdl(&self) -> String {
        let mut kdl = format!("code-path {}\n", kdl_string(&self.code_path));

        if let Some(tags_file) = &self.tags_file {
            kdl.push_str(&format!("tags-file {}\n", kdl_string(tags_file)));
        }
        if self.reverse {
            kdl.push_str("reverse\n");
        }

        kdl
    }
}

/// Quotes a string as a KDL (v1) string value.
fn kdl_string(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);

    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');

    quoted
}
