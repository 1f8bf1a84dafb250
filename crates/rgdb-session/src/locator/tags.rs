use std::path::Path;

/// Prefix of ctags pseudo-tag lines.
const PSEUDO_TAG_PREFIX: &str = "!_TAG_";

/// A symbol declaration from a tag file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagEntry {
    /// Name of the symbol.
    pub symbol: String,

    /// File declaring the symbol (relative to the code path).
    pub file: String,

    /// Position of the declaration in the file (line number or search
    /// pattern).
    pub position: String,
}

/// Symbol declarations parsed from a ctags file.
#[derive(Clone, Debug, Default)]
pub struct TagIndex {
    entries: Vec<TagEntry>,
}

impl TagIndex {
    /// Loads a ctags file.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let index = Self::parse(&content);

        tracing::debug!(
            path = %path.as_ref().display(),
            entries = index.entries.len(),
            "tag file loaded"
        );

        Ok(index)
    }

    /// Parses the content of a ctags file.
    ///
    /// Lines are expected as `symbol<TAB>file<TAB>position...`. Lines
    /// without tabs are split on whitespace instead. Malformed lines are
    /// skipped.
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter(|line| !line.starts_with(PSEUDO_TAG_PREFIX))
            .filter_map(parse_entry)
            .collect();

        Self { entries }
    }

    /// Returns all entries, in file order.
    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    /// Returns the files declaring the given symbol, in file order.
    pub fn files_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.symbol == symbol)
            .map(|entry| entry.file.as_str())
    }
}

fn parse_entry(line: &str) -> Option<TagEntry> {
    let line = line.trim_end();

    let (symbol, file, position) = if line.contains('\t') {
        let mut fields = line.splitn(3, '\t');
        (fields.next()?, fields.next()?, fields.next().unwrap_or_default())
    } else {
        let mut fields = line.split_whitespace();
        (fields.next()?, fields.next()?, fields.next().unwrap_or_default())
    };

    if symbol.is_empty() || file.is_empty() {
        return None;
    }

    Some(TagEntry {
        symbol: symbol.to_owned(),
        file: file.to_owned(),
        position: position.to_owned(),
    })
}
