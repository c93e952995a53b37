use crate::config::{RenameOptions, DEFAULT_PROBE_TOOL};
use crate::entry::FileEntry;
use crate::error::RenamerError;
use image::ImageReader;
use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Stdio};

/// Decoded in-process from the file header.
const NATIVE_IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

/// Images the in-process decoder cannot read; handed to the probe tool.
const PROBE_IMAGE_EXTENSIONS: &[&str] = &[".heic", ".heif", ".webp"];

const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".mov", ".avi", ".mkv", ".webm", ".m4v", ".3gp", ".flv", ".wmv", ".mpg", ".mpeg",
    ".m2v", ".mts", ".m2ts",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    NativeImage,
    ProbeImage,
    Video,
}

impl MediaKind {
    /// `extension` includes the leading dot; case is ignored.
    pub fn classify(extension: &str) -> Option<Self> {
        let ext = extension.to_ascii_lowercase();
        if NATIVE_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::NativeImage)
        } else if PROBE_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::ProbeImage)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }
}

/// Pixel dimensions; `0x0` means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const UNKNOWN: Resolution = Resolution {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_known(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn aspect_ratio(&self) -> (u32, u32) {
        reduce_aspect_ratio(self.width, self.height)
    }

    /// `1920x1080`, or `1920x1080<sep>16x9` when the reduced ratio is
    /// requested and differs from the raw dimensions.
    pub fn label(&self, separator: &str, with_ratio: bool) -> String {
        let raw = format!("{}x{}", self.width, self.height);
        if !with_ratio {
            return raw;
        }
        let (w, h) = self.aspect_ratio();
        if (w, h) == (self.width, self.height) {
            return raw;
        }
        format!("{raw}{separator}{w}x{h}")
    }
}

/// Reduces `width:height` by their greatest common divisor.
pub fn reduce_aspect_ratio(width: u32, height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let divisor = gcd(width, height);
    (width / divisor, height / divisor)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Source of media dimensions for the naming pipeline.
pub trait ProbeDimensions: Sync {
    /// Name of the out-of-process tool, for messages.
    fn tool(&self) -> &str;

    /// Whether the out-of-process tool can be run at all.
    fn is_available(&self) -> bool;

    /// Never fails; unsupported or unreadable files yield [`Resolution::UNKNOWN`].
    fn resolve(&self, entry: &FileEntry, dir: &Path) -> Resolution;
}

/// Fails the whole run up front when resolution tagging is requested but
/// the probe tool cannot be executed.
pub fn ensure_probe_available(
    options: &RenameOptions,
    prober: &dyn ProbeDimensions,
) -> Result<(), RenamerError> {
    if options.detect_resolution.is_some() && !prober.is_available() {
        return Err(RenamerError::ProbeUnavailable(prober.tool().to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ResolutionProber {
    tool: String,
}

impl Default for ResolutionProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TOOL)
    }
}

impl ResolutionProber {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    fn probe_with_tool(&self, path: &Path) -> Resolution {
        let output = Command::new(&self.tool)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(output) if output.status.success() => parse_probe_output(&output.stdout),
            Ok(output) => {
                tracing::debug!(path = %path.display(), status = %output.status, "probe exited with failure");
                Resolution::UNKNOWN
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "probe could not be spawned");
                Resolution::UNKNOWN
            }
        }
    }
}

impl ProbeDimensions for ResolutionProber {
    fn tool(&self) -> &str {
        &self.tool
    }

    fn is_available(&self) -> bool {
        Command::new(&self.tool)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn resolve(&self, entry: &FileEntry, dir: &Path) -> Resolution {
        let Some(kind) = MediaKind::classify(entry.extension()) else {
            return Resolution::UNKNOWN;
        };

        let path = dir.join(&entry.name);
        match kind {
            MediaKind::NativeImage => read_image_header(&path),
            MediaKind::ProbeImage | MediaKind::Video => self.probe_with_tool(&path),
        }
    }
}

/// Reads only the image header, never the pixel data. The format is
/// sniffed from the file contents, not the extension.
pub fn read_image_header(path: &Path) -> Resolution {
    match header_dimensions(path) {
        Ok((width, height)) => Resolution::new(width, height),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "image header unreadable");
            Resolution::UNKNOWN
        }
    }
}

fn header_dimensions(path: &Path) -> anyhow::Result<(u32, u32)> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

/// Dimensions of the first stream in the tool's JSON output.
pub fn parse_probe_output(stdout: &[u8]) -> Resolution {
    let parsed = match serde_json::from_slice::<ProbeOutput>(stdout) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!(error = %err, "probe output is not valid JSON");
            return Resolution::UNKNOWN;
        }
    };

    parsed
        .streams
        .first()
        .map(|stream| Resolution::new(stream.width, stream.height))
        .unwrap_or(Resolution::UNKNOWN)
}
