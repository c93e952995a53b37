use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// One immediate child of the directory being renamed.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub is_dir: bool,
    pub created: Option<DateTime<Local>>,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, is_dir: bool, created: Option<DateTime<Local>>) -> Self {
        Self {
            name: name.into(),
            is_dir,
            created,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }

    /// Extension including the leading dot, as written on disk.
    pub fn extension(&self) -> &str {
        split_extension(&self.name).1
    }

    pub fn extension_lowercase(&self) -> String {
        self.extension().to_ascii_lowercase()
    }
}

/// Splits `name` at its last dot: `("photo", ".JPG")`, `("README", "")`.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) => name.split_at(pos),
        None => (name, ""),
    }
}

/// Lists the immediate children of `root`, sorted by name. A listing
/// failure is logged and treated as an empty directory. Names that are not
/// valid UTF-8 are skipped.
pub fn collect_entries(root: &Path) -> Vec<FileEntry> {
    let mut out = Vec::new();

    if !root.is_dir() {
        tracing::warn!(root = %root.display(), "failed to read directory: not a directory");
        return out;
    }

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "failed to read directory");
                if err.depth() == 0 {
                    return Vec::new();
                }
                continue;
            }
        };

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!(name = ?entry.file_name(), "skipping name that is not valid UTF-8");
            continue;
        };
        let created = match entry.metadata() {
            Ok(metadata) => Some(created_time(&metadata)),
            Err(err) => {
                tracing::debug!(name = %name, error = %err, "metadata unavailable");
                None
            }
        };
        out.push(FileEntry::new(name, entry.file_type().is_dir(), created));
    }

    out
}

/// Birth time where the platform records it, then inode change time, then
/// modification time. The first one that is not the epoch wins.
pub fn created_time(metadata: &fs::Metadata) -> DateTime<Local> {
    let candidates = [metadata.created().ok(), change_time(metadata)];
    let time = candidates
        .into_iter()
        .flatten()
        .find(|t| *t > UNIX_EPOCH)
        .or_else(|| metadata.modified().ok())
        .unwrap_or(UNIX_EPOCH);
    DateTime::from(time)
}

#[cfg(unix)]
fn change_time(metadata: &fs::Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    use std::time::Duration;

    let secs = u64::try_from(metadata.ctime()).ok()?;
    let nanos = u32::try_from(metadata.ctime_nsec()).ok()?;
    UNIX_EPOCH.checked_add(Duration::new(secs, nanos))
}

#[cfg(not(unix))]
fn change_time(_metadata: &fs::Metadata) -> Option<SystemTime> {
    None
}
