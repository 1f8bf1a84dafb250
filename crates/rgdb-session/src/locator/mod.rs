//! Resolution of source locations reported by the debugger to local files.
//!
//! The debugger reports paths as seen from the debuggee's host, which may
//! not exist on the machine running `rgdb`. Remote files are fetched into
//! temporary copies, and files that cannot be found as reported are searched
//! by name under a local code path.

mod tags;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use walkdir::WalkDir;

pub use self::tags::{TagEntry, TagIndex};
use crate::operator::{Operator, select_entry};
use crate::transport::Transport;

const SELECTION_QUESTION: &str = "Ambiguous file reference, select the correct filename: ";

/// Maps source locations reported by the debugger to local files.
///
/// Resolved locations are cached for the locator's lifetime. Temporary
/// copies of remote files are deleted when the locator is dropped.
pub struct FileLocator {
    code_path: PathBuf,
    tags: Option<TagIndex>,
    cache: HashMap<String, PathBuf>,
    copies: Vec<TempPath>,
}

impl FileLocator {
    /// Creates a new locator searching files under `code_path`.
    pub fn new(code_path: impl Into<PathBuf>) -> Self {
        Self {
            code_path: code_path.into(),
            tags: None,
            cache: HashMap::new(),
            copies: Vec::new(),
        }
    }

    /// Uses a tag index to disambiguate files with the same name.
    pub fn with_tags(mut self, tags: TagIndex) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Root of the local source tree.
    pub fn code_path(&self) -> &Path {
        &self.code_path
    }

    /// Resolves a source location reported by the debugger to a local file.
    ///
    /// `method` is the function the debuggee currently executes, used to
    /// disambiguate homonymous files.
    #[tracing::instrument(name = "Resolve", skip(self, transport, operator))]
    pub fn resolve(
        &mut self,
        transport: &mut (impl Transport + ?Sized),
        reported: &str,
        method: Option<&str>,
        operator: &mut dyn Operator,
    ) -> crate::Result<Option<PathBuf>> {
        if let Some(path) = self.cache.get(reported) {
            return Ok(Some(path.clone()));
        }

        let resolved = match transport.fetch_host_file(reported) {
            Ok(Some(copy)) => {
                let path = copy.to_path_buf();
                self.copies.push(copy);
                Some(path)
            }
            Ok(None) if Path::new(reported).is_file() => Some(PathBuf::from(reported)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch source file");
                None
            }
        };

        let resolved = match resolved {
            Some(path) => Some(path),
            None => match Path::new(reported).file_name().and_then(|name| name.to_str()) {
                Some(name) => self.find(name, method, operator)?,
                None => None,
            },
        };

        if let Some(path) = &resolved {
            tracing::debug!(path = %path.display(), "location resolved");
            self.cache.insert(reported.to_owned(), path.clone());
        }

        Ok(resolved)
    }

    /// Searches the code path for files called `name`.
    ///
    /// When several files match, the tag index (if any) narrows them down to
    /// the ones declaring `method`, and the operator is asked to select one
    /// if this is still ambiguous.
    pub fn find(
        &self,
        name: &str,
        method: Option<&str>,
        operator: &mut dyn Operator,
    ) -> crate::Result<Option<PathBuf>> {
        let matches = WalkDir::new(&self.code_path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| {
                entry
                    .inspect_err(|e| tracing::debug!(error = %e, "skipped entry"))
                    .ok()
            })
            .filter(|entry| entry.file_type().is_file() && entry.file_name() == name)
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>();

        tracing::debug!(name, matches = matches.len(), "files found");

        if matches.len() <= 1 {
            return Ok(matches.into_iter().next());
        }

        let candidates = match (&self.tags, method) {
            (Some(tags), Some(method)) => {
                let declaring = tags
                    .files_for(method)
                    .map(|file| self.code_path.join(file))
                    .collect::<Vec<_>>();

                let survivors = matches
                    .iter()
                    .filter(|path| declaring.contains(path))
                    .cloned()
                    .collect::<Vec<_>>();

                match survivors.len() {
                    0 => matches,
                    1 => return Ok(survivors.into_iter().next()),
                    _ => survivors,
                }
            }
            _ => matches,
        };

        let displayed = candidates
            .iter()
            .map(|path| path.display())
            .collect::<Vec<_>>();
        let index = select_entry(operator, SELECTION_QUESTION, &displayed)?;

        Ok(Some(candidates[index].clone()))
    }
}
