use crate::config::{Placement, RenameOptions};
use crate::date_layout::DateStamp;
use crate::entry::{split_extension, FileEntry};
use crate::error::RenamerError;
use crate::resolution::ProbeDimensions;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use regex::Regex;
use std::path::Path;

pub const UNIQUE_TOKEN_LEN: usize = 8;

/// Random `[0-9a-zA-Z]` token from the OS entropy source.
pub fn unique_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(UNIQUE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Joins two segments, skipping the separator when either side is empty.
pub fn with_separator(a: &str, b: &str, separator: &str) -> String {
    if a.is_empty() {
        return b.to_string();
    }
    if b.is_empty() {
        return a.to_string();
    }
    format!("{a}{separator}{b}")
}

fn place(base: &str, segment: &str, placement: Placement, separator: &str) -> String {
    match placement {
        Placement::Prefix => with_separator(segment, base, separator),
        Placement::Suffix => with_separator(base, segment, separator),
    }
}

/// A `pattern=replacement` substitution applied to the base name.
#[derive(Debug, Clone)]
pub struct Replacer {
    regex: Regex,
    replacement: String,
}

impl Replacer {
    pub fn parse(value: &str) -> Result<Option<Self>, RenamerError> {
        if value.is_empty() {
            return Ok(None);
        }

        let parts: Vec<&str> = value.split('=').collect();
        let [pattern, replacement] = parts.as_slice() else {
            return Err(RenamerError::InvalidReplace(value.to_string()));
        };

        let regex = compile("replace", pattern)?;
        Ok(Some(Self {
            regex,
            replacement: replacement.to_string(),
        }))
    }

    pub fn apply(&self, input: &str) -> String {
        self.regex
            .replace_all(input, self.replacement.as_str())
            .into_owned()
    }
}

fn compile(option: &'static str, pattern: &str) -> Result<Regex, RenamerError> {
    Regex::new(pattern).map_err(|source| RenamerError::InvalidPattern {
        option,
        pattern: pattern.to_string(),
        source,
    })
}

fn compile_optional(option: &'static str, pattern: &str) -> Result<Option<Regex>, RenamerError> {
    if pattern.is_empty() {
        return Ok(None);
    }
    compile(option, pattern).map(Some)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    Ignored,
    Renamed(String),
}

impl Transform {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }
}

/// The naming rules of one run, compiled once and shared by every worker.
pub struct Pipeline<'a> {
    options: &'a RenameOptions,
    include: Option<Regex>,
    exclude: Option<Regex>,
    replacer: Option<Replacer>,
    date_stamp: Option<DateStamp>,
    prober: &'a dyn ProbeDimensions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        options: &'a RenameOptions,
        prober: &'a dyn ProbeDimensions,
    ) -> Result<Self, RenamerError> {
        Ok(Self {
            options,
            include: compile_optional("include", &options.include)?,
            exclude: compile_optional("exclude", &options.exclude)?,
            replacer: Replacer::parse(&options.replace)?,
            date_stamp: DateStamp::parse(&options.created_date)?,
            prober,
        })
    }

    pub fn options(&self) -> &RenameOptions {
        self.options
    }

    pub fn root(&self) -> &Path {
        &self.options.path
    }

    pub fn probes_resolution(&self) -> bool {
        self.options.detect_resolution.is_some()
    }

    pub fn transform(&self, entry: &FileEntry) -> Transform {
        let options = self.options;
        let sep = options.separator.as_str();
        let old_name = entry.name.as_str();

        if entry.is_hidden() {
            return Transform::Ignored;
        }
        if self.exclude.as_ref().is_some_and(|re| re.is_match(old_name)) {
            return Transform::Ignored;
        }
        if self.include.as_ref().is_some_and(|re| !re.is_match(old_name)) {
            return Transform::Ignored;
        }

        let (base, ext) = split_extension(old_name);
        let mut name = if options.clears_base_name() {
            String::new()
        } else if !options.override_name.is_empty() && !is_bare_sentinel(options) {
            options.override_name.clone()
        } else if let Some(replacer) = &self.replacer {
            replacer.apply(base)
        } else {
            base.to_string()
        };

        if let Some(stamp) = &self.date_stamp {
            match entry.created {
                Some(created) => {
                    let date = stamp.layout.render(&created);
                    name = place(&name, &date, stamp.placement, sep);
                }
                None => tracing::debug!(name = old_name, "no timestamp, date stamp skipped"),
            }
        }

        if let Some(placement) = options.detect_resolution {
            let resolution = self.prober.resolve(entry, &options.path);
            if resolution.is_known() {
                let label = resolution.label(sep, options.aspect_ratio);
                name = place(&name, &label, placement, sep);
            }
        }

        if !options.prefix.is_empty() {
            name = with_separator(&options.prefix, &name, sep);
        }
        if !options.suffix.is_empty() {
            name = with_separator(&name, &options.suffix, sep);
        }
        if options.unique_suffix {
            name = with_separator(&name, &unique_token(), sep);
        }

        let new_name = format!("{name}{ext}");
        if new_name == old_name {
            return Transform::Ignored;
        }
        Transform::Renamed(new_name)
    }
}

/// `<empty>` with nothing to compose onto leaves the base name alone.
fn is_bare_sentinel(options: &RenameOptions) -> bool {
    options.override_name == crate::config::EMPTY_OVERRIDE && !options.clears_base_name()
}
