use crate::entry::{collect_entries, split_extension, FileEntry};
use crate::transform::{unique_token, with_separator, Pipeline, Transform};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub scanned: usize,
    pub skipped_dirs: usize,
    pub ignored: usize,
    pub planned: usize,
    pub collisions: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlannedRename {
    pub original: String,
    pub target: String,
}

/// Final mapping from new name to original name. Keys are unique.
#[derive(Debug, Clone, Serialize, Default)]
pub struct RenamePlan {
    pub root: PathBuf,
    renames: BTreeMap<String, String>,
    pub stats: PlanStats,
}

impl RenamePlan {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    pub fn original_for(&self, target: &str) -> Option<&str> {
        self.renames.get(target).map(String::as_str)
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.renames.keys().map(String::as_str)
    }

    /// Entries ordered by original name.
    pub fn entries(&self) -> Vec<PlannedRename> {
        let mut out: Vec<PlannedRename> = self
            .renames
            .iter()
            .map(|(target, original)| PlannedRename {
                original: original.clone(),
                target: target.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.original.cmp(&b.original));
        out
    }

    /// Inserts `target -> original`, appending `<sep><token>` to the base
    /// name until the key is free. Returns the key actually used.
    pub fn insert_unique(&mut self, target: String, original: String, separator: &str) -> String {
        let mut key = target;
        if self.renames.contains_key(&key) {
            self.stats.collisions += 1;
            let (base, ext) = split_extension(&key);
            let (base, ext) = (base.to_string(), ext.to_string());
            while self.renames.contains_key(&key) {
                key = format!("{}{}", with_separator(&base, &unique_token(), separator), ext);
            }
        }
        self.renames.insert(key.clone(), original);
        self.stats.planned = self.renames.len();
        key
    }
}

/// Lists the root directory and computes a collision-free plan.
pub fn build_plan(pipeline: &Pipeline<'_>) -> Result<RenamePlan> {
    let entries = collect_entries(pipeline.root());
    build_plan_from_entries(pipeline, entries)
}

pub fn build_plan_from_entries(pipeline: &Pipeline<'_>, entries: Vec<FileEntry>) -> Result<RenamePlan> {
    let options = pipeline.options();
    let mut plan = RenamePlan::new(pipeline.root());
    plan.stats.scanned = entries.len();

    let (candidates, dirs): (Vec<FileEntry>, Vec<FileEntry>) = entries
        .into_iter()
        .partition(|entry| options.allow_dir || !entry.is_dir);
    plan.stats.skipped_dirs = dirs.len();

    if pipeline.probes_resolution() {
        tracing::info!(
            files = candidates.len(),
            workers = options.probe_workers,
            "building plan with resolution probing"
        );
        plan = build_concurrent(pipeline, candidates, plan)?;
    } else {
        tracing::info!(files = candidates.len(), "building plan");
        for entry in candidates {
            insert_transformed(pipeline, &entry, &mut plan);
        }
    }

    tracing::info!(
        planned = plan.stats.planned,
        ignored = plan.stats.ignored,
        collisions = plan.stats.collisions,
        "plan ready"
    );
    Ok(plan)
}

fn build_concurrent(
    pipeline: &Pipeline<'_>,
    candidates: Vec<FileEntry>,
    plan: RenamePlan,
) -> Result<RenamePlan> {
    let workers = pipeline.options().probe_workers.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("probe-{i}"))
        .build()
        .context("failed to start probe workers")?;

    let shared = Mutex::new(plan);
    pool.install(|| {
        candidates.par_iter().for_each(|entry| {
            let transform = pipeline.transform(entry);
            // one lock window per entry: existence check, suffixing and insert
            let mut plan = shared.lock().unwrap_or_else(PoisonError::into_inner);
            record(pipeline, entry, transform, &mut plan);
        });
    });

    Ok(shared.into_inner().unwrap_or_else(PoisonError::into_inner))
}

fn insert_transformed(pipeline: &Pipeline<'_>, entry: &FileEntry, plan: &mut RenamePlan) {
    let transform = pipeline.transform(entry);
    record(pipeline, entry, transform, plan);
}

fn record(pipeline: &Pipeline<'_>, entry: &FileEntry, transform: Transform, plan: &mut RenamePlan) {
    match transform {
        Transform::Ignored => {
            plan.stats.ignored += 1;
            tracing::debug!(name = %entry.name, "ignored");
        }
        Transform::Renamed(target) => {
            let key = plan.insert_unique(
                target,
                entry.name.clone(),
                &pipeline.options().separator,
            );
            tracing::debug!(from = %entry.name, to = %key, "planned");
        }
    }
}

/// Joins a plan name onto the root directory.
pub fn plan_path(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Placement, RenameOptions};
    use crate::resolution::{ProbeDimensions, Resolution};
    use crate::transform::tests::FixedProbe;
    use crate::transform::UNIQUE_TOKEN_LEN;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    const NO_PROBE: FixedProbe = FixedProbe(Resolution::UNKNOWN);

    fn touch(root: &Path, names: &[&str]) {
        for name in names {
            fs::write(root.join(name), name.as_bytes()).expect("write fixture");
        }
    }

    fn options_for(root: &Path) -> RenameOptions {
        RenameOptions {
            path: root.to_path_buf(),
            ..RenameOptions::default()
        }
    }

    #[test]
    fn prefix_plan_maps_new_to_original() {
        let temp = tempdir().expect("tempdir");
        touch(temp.path(), &["a.jpg", "b.jpg"]);

        let options = RenameOptions {
            prefix: "IMG".to_string(),
            ..options_for(temp.path())
        };
        let pipeline = Pipeline::new(&options, &NO_PROBE).expect("pipeline");
        let plan = build_plan(&pipeline).expect("plan");

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.original_for("IMG_a.jpg"), Some("a.jpg"));
        assert_eq!(plan.original_for("IMG_b.jpg"), Some("b.jpg"));
        assert_eq!(plan.stats.scanned, 2);
        assert_eq!(plan.stats.collisions, 0);
    }

    #[test]
    fn include_filters_plan() {
        let temp = tempdir().expect("tempdir");
        touch(temp.path(), &["a.jpg", "b.png"]);

        let options = RenameOptions {
            prefix: "IMG".to_string(),
            include: r".*\.png$".to_string(),
            ..options_for(temp.path())
        };
        let pipeline = Pipeline::new(&options, &NO_PROBE).expect("pipeline");
        let plan = build_plan(&pipeline).expect("plan");

        let entries = plan.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].original, "b.png");
        assert_eq!(entries[0].target, "IMG_b.png");
        assert_eq!(plan.stats.ignored, 1);
    }

    #[test]
    fn directories_need_allow_dir() {
        let temp = tempdir().expect("tempdir");
        touch(temp.path(), &["a.jpg"]);
        fs::create_dir_all(temp.path().join("album")).expect("create album");

        let options = RenameOptions {
            prefix: "X".to_string(),
            ..options_for(temp.path())
        };
        let pipeline = Pipeline::new(&options, &NO_PROBE).expect("pipeline");
        let plan = build_plan(&pipeline).expect("plan");
        assert_eq!(plan.targets().collect::<Vec<_>>(), vec!["X_a.jpg"]);
        assert_eq!(plan.stats.skipped_dirs, 1);

        let options = RenameOptions {
            allow_dir: true,
            ..options
        };
        let pipeline = Pipeline::new(&options, &NO_PROBE).expect("pipeline");
        let plan = build_plan(&pipeline).expect("plan");
        assert_eq!(plan.original_for("X_album"), Some("album"));
    }

    #[test]
    fn collisions_get_random_suffix() {
        let temp = tempdir().expect("tempdir");
        touch(temp.path(), &["one.jpg", "two.jpg"]);

        let options = RenameOptions {
            override_name: "x".to_string(),
            ..options_for(temp.path())
        };
        let pipeline = Pipeline::new(&options, &NO_PROBE).expect("pipeline");
        let plan = build_plan(&pipeline).expect("plan");

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.stats.collisions, 1);
        let suffixed = plan
            .targets()
            .find(|t| *t != "x.jpg")
            .expect("suffixed target");
        assert!(plan.original_for("x.jpg").is_some());
        assert!(suffixed.starts_with("x_"));
        assert!(suffixed.ends_with(".jpg"));
        assert_eq!(suffixed.len(), "x_.jpg".len() + UNIQUE_TOKEN_LEN);

        let originals: HashSet<&str> = plan
            .targets()
            .filter_map(|t| plan.original_for(t))
            .collect();
        assert_eq!(originals, HashSet::from(["one.jpg", "two.jpg"]));
    }

    #[test]
    fn insert_unique_never_overwrites() {
        let mut plan = RenamePlan::new("/tmp");
        let first = plan.insert_unique("x.jpg".to_string(), "a.jpg".to_string(), "_");
        let second = plan.insert_unique("x.jpg".to_string(), "b.jpg".to_string(), "_");
        let third = plan.insert_unique("x.jpg".to_string(), "c.jpg".to_string(), "_");

        assert_eq!(first, "x.jpg");
        assert_ne!(second, third);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.stats.collisions, 2);
        assert_eq!(plan.original_for("x.jpg"), Some("a.jpg"));
    }

    #[test]
    fn concurrent_mode_keeps_keys_unique() {
        let temp = tempdir().expect("tempdir");
        let names: Vec<String> = (0..64).map(|i| format!("clip{i:02}.mp4")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        touch(temp.path(), &refs);

        let probe = FixedProbe(Resolution::new(1280, 720));
        let options = RenameOptions {
            override_name: "video".to_string(),
            detect_resolution: Some(Placement::Suffix),
            probe_workers: 8,
            ..options_for(temp.path())
        };
        let pipeline = Pipeline::new(&options, &probe).expect("pipeline");
        let plan = build_plan(&pipeline).expect("plan");

        assert_eq!(plan.len(), 64);
        assert_eq!(plan.stats.collisions, 63);
        assert!(plan.original_for("video_1280x720.mp4").is_some());
        let originals: HashSet<&str> = plan
            .targets()
            .filter_map(|t| plan.original_for(t))
            .collect();
        assert_eq!(originals.len(), 64);
    }

    struct CountingProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ProbeDimensions for CountingProbe {
        fn tool(&self) -> &str {
            "counting"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn resolve(&self, _entry: &FileEntry, _dir: &Path) -> Resolution {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Resolution::new(640, 480)
        }
    }

    #[test]
    fn concurrent_mode_respects_worker_cap() {
        let entries: Vec<FileEntry> = (0..32)
            .map(|i| FileEntry::new(format!("clip{i:02}.mp4"), false, None))
            .collect();
        let probe = CountingProbe {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let options = RenameOptions {
            detect_resolution: Some(Placement::Prefix),
            probe_workers: 4,
            ..RenameOptions::default()
        };
        let pipeline = Pipeline::new(&options, &probe).expect("pipeline");
        let plan = build_plan_from_entries(&pipeline, entries).expect("plan");

        assert_eq!(plan.len(), 32);
        let peak = probe.peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "peak in-flight resolves was {peak}");
        assert!(peak > 1, "resolves never overlapped");
    }

    #[test]
    fn missing_directory_yields_empty_plan() {
        let temp = tempdir().expect("tempdir");
        let options = RenameOptions {
            prefix: "IMG".to_string(),
            ..options_for(&temp.path().join("missing"))
        };
        let pipeline = Pipeline::new(&options, &NO_PROBE).expect("pipeline");
        let plan = build_plan(&pipeline).expect("plan");
        assert!(plan.is_empty());
    }

    #[test]
    fn entries_are_sorted_by_original_name() {
        let entries = vec![
            FileEntry::new("b.jpg", false, None),
            FileEntry::new("a.jpg", false, None),
            FileEntry::new("c.jpg", false, None),
        ];
        let options = RenameOptions {
            suffix: "z".to_string(),
            ..RenameOptions::default()
        };
        let pipeline = Pipeline::new(&options, &NO_PROBE).expect("pipeline");
        let plan = build_plan_from_entries(&pipeline, entries).expect("plan");
        let originals: Vec<String> = plan.entries().into_iter().map(|e| e.original).collect();
        assert_eq!(originals, vec!["a.jpg", "b.jpg", "c.jpg"]);
    }
}
