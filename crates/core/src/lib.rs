mod apply;
mod config;
mod date_layout;
mod entry;
mod error;
mod planner;
mod prompt;
mod resolution;
mod transform;

pub use apply::{
    apply_plan, run_batch, write_dry_run, write_summary, ApplyOutcome, ApplyResult, RenameFailure,
};
pub use config::{
    app_paths, load_config, save_config, AppConfig, AppPaths, Placement, RenameOptions,
    EMPTY_OVERRIDE,
};
pub use date_layout::{DateLayout, DateStamp, DateToken, LayoutPart};
pub use entry::{collect_entries, created_time, split_extension, FileEntry};
pub use error::RenamerError;
pub use planner::{build_plan, build_plan_from_entries, PlanStats, PlannedRename, RenamePlan};
pub use prompt::confirm_action;
pub use resolution::{
    ensure_probe_available, parse_probe_output, reduce_aspect_ratio, MediaKind, ProbeDimensions,
    Resolution, ResolutionProber,
};
pub use transform::{unique_token, with_separator, Pipeline, Replacer, Transform};
