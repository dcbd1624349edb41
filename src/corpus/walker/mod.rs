
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::normalizer::normalize_str;
use super::{DiscoveryError, IdCounter, IngestionRecord};

/// Inclusive start, exclusive end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: u16,
    pub end: u16,
}

/// One dataset group: a tag used for record ids and the folder holding its files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGroup {
    pub tag: String,
    /// Folder relative to the embeddings root
    pub path: PathBuf,
    /// Year partitions below `path`; `None` for a flat folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<YearRange>,
}

impl SourceGroup {
    #[inline]
    pub fn flat(tag: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            tag: tag.to_string(),
            path: path.into(),
            years: None,
        }
    }

    #[inline]
    pub fn yearly(tag: &str, path: impl Into<PathBuf>, start: u16, end: u16) -> Self {
        Self {
            tag: tag.to_string(),
            path: path.into(),
            years: Some(YearRange { start, end }),
        }
    }

    /// Whether `tag` can prefix run-wide counter values without collisions
    ///
    /// Ids are the tag followed by decimal digits, so a tag may not end in a
    /// digit (`q1` + `0` and `q` + `10` would both be `q10`). `_` is excluded
    /// because it is a `LIKE` wildcard in store filters.
    #[inline]
    pub fn has_valid_tag(&self) -> bool {
        self.tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && self
                .tag
                .chars()
                .last()
                .is_some_and(|c| !c.is_ascii_digit())
    }

    /// Folders this group resolves to under `root`, in visiting order
    #[inline]
    pub fn folders(&self, root: &Path) -> Vec<PathBuf> {
        let base = root.join(&self.path);
        match self.years {
            Some(range) => (range.start..range.end)
                .map(|year| base.join(year.to_string()))
                .collect(),
            None => vec![base],
        }
    }
}

/// Directory listing and whole-file reads used by the walker
pub trait SourceFs {
    /// List `.json` files directly inside `dir`, sorted by file name
    fn list_json_files(&self, dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError>;

    fn read_file(&self, path: &Path) -> Result<String, DiscoveryError>;
}

/// [`SourceFs`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl SourceFs for LocalFs {
    #[inline]
    fn list_json_files(&self, dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
        let entries = fs::read_dir(dir).map_err(|e| io_error(dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    #[inline]
    fn read_file(&self, path: &Path) -> Result<String, DiscoveryError> {
        fs::read_to_string(path).map_err(|e| io_error(path, e))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> DiscoveryError {
    if source.kind() == ErrorKind::NotFound {
        DiscoveryError::NotFound(path.to_path_buf())
    } else {
        DiscoveryError::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Counters describing one corpus walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    pub folders_visited: usize,
    pub folders_skipped: usize,
    pub files_parsed: usize,
    pub files_skipped: usize,
    pub records_emitted: usize,
}

/// Enumerates every source folder and file and normalizes their contents
#[derive(Debug, Clone)]
pub struct CorpusWalker<F = LocalFs> {
    root: PathBuf,
    groups: Vec<SourceGroup>,
    fs: F,
}

impl CorpusWalker<LocalFs> {
    #[inline]
    pub fn new(root: impl Into<PathBuf>, groups: Vec<SourceGroup>) -> Self {
        Self::with_fs(root, groups, LocalFs)
    }
}

impl<F: SourceFs> CorpusWalker<F> {
    #[inline]
    pub fn with_fs(root: impl Into<PathBuf>, groups: Vec<SourceGroup>, fs: F) -> Self {
        Self {
            root: root.into(),
            groups,
            fs,
        }
    }

    /// Visit every configured folder and collect all records
    ///
    /// Missing folders, unreadable files and malformed JSON are logged and
    /// skipped; they never abort the walk.
    #[inline]
    pub fn walk(&self, ids: &mut IdCounter) -> (Vec<IngestionRecord>, WalkStats) {
        let mut records = Vec::new();
        let mut stats = WalkStats::default();

        for group in &self.groups {
            if !group.has_valid_tag() {
                warn!("Skipping source with invalid tag {:?}", group.tag);
                stats.folders_skipped += group.folders(&self.root).len();
                continue;
            }

            let before = records.len();
            for folder in group.folders(&self.root) {
                self.walk_folder(&folder, &group.tag, ids, &mut records, &mut stats);
            }
            info!(
                "Collected {} records from source {}",
                records.len() - before,
                group.tag
            );
        }

        stats.records_emitted = records.len();
        (records, stats)
    }

    fn walk_folder(
        &self,
        folder: &Path,
        tag: &str,
        ids: &mut IdCounter,
        records: &mut Vec<IngestionRecord>,
        stats: &mut WalkStats,
    ) {
        let files = match self.fs.list_json_files(folder) {
            Ok(files) => files,
            Err(e) => {
                warn!("Error processing folder {}: {}", folder.display(), e);
                stats.folders_skipped += 1;
                return;
            }
        };

        stats.folders_visited += 1;
        debug!("Processing {} files in {}", files.len(), folder.display());

        for file in files {
            match self.read_records(&file, tag, ids) {
                Ok(file_records) => {
                    stats.files_parsed += 1;
                    records.extend(file_records);
                }
                Err(e) => {
                    warn!("Error processing file {}: {}", file.display(), e);
                    stats.files_skipped += 1;
                }
            }
        }
    }

    fn read_records(
        &self,
        file: &Path,
        tag: &str,
        ids: &mut IdCounter,
    ) -> Result<Vec<IngestionRecord>, DiscoveryError> {
        let contents = self.fs.read_file(file)?;
        normalize_str(&contents, tag, ids).map_err(|source| DiscoveryError::Malformed {
            path: file.to_path_buf(),
            source,
        })
    }
}
