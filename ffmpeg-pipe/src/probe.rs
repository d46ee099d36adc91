//! Locating ffmpeg and checking which encoders it offers.

use std::path::{Path, PathBuf};

use anyhow::Context;

const INSTALL_HINT: &str = "Please make sure ffmpeg is installed in the application directory or in PATH";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderInfo {
    pub kind: MediaKind,
    pub name: String,
    pub experimental: bool,
    pub description: String,
}

/// Resolves the ffmpeg executable: an existing configured path wins,
/// otherwise `ffmpeg` is searched on `PATH`.
pub fn locate_ffmpeg(configured: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        log::warn!("configured ffmpeg {} not found, searching PATH", path.display());
    }
    which::which("ffmpeg").map_err(|e| anyhow::anyhow!("ffmpeg not found ({}). {}", e, INSTALL_HINT))
}

/// Runs `<exec> -encoders` and parses the listing.
pub async fn list_encoders(exec: &Path) -> anyhow::Result<Vec<EncoderInfo>> {
    let output = tokio::process::Command::new(exec)
        .args(["-hide_banner", "-encoders"])
        .output()
        .await
        .with_context(|| format!("failed to run {}", exec.display()))?;

    if !output.status.success() {
        // 127: the loader could not resolve ffmpeg's shared libraries
        if output.status.code() == Some(127) {
            anyhow::bail!(
                "ffmpeg was installed incorrectly, its libraries could not be loaded. {}",
                INSTALL_HINT
            );
        }
        anyhow::bail!(
            "failed to get encoder info, ffmpeg exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    parse_encoders(&String::from_utf8_lossy(&output.stdout))
}

/// Parses `ffmpeg -encoders` output.
///
/// The flag column meaning "experimental" is read from the legend printed
/// above the `------` separator instead of being assumed.
pub fn parse_encoders(text: &str) -> anyhow::Result<Vec<EncoderInfo>> {
    let mut lines = text.lines();
    let mut experimental_column = None;

    for line in lines.by_ref() {
        let line = line.trim();
        if line == "------" {
            break;
        }
        let Some((flags, meaning)) = line.split_once('=') else {
            continue;
        };
        if meaning.to_ascii_lowercase().contains("experimental") {
            experimental_column = flags.trim().chars().position(|c| c != '.');
        }
    }

    let experimental_column =
        experimental_column.context("encoder listing has no experimental flag in its legend")?;

    let mut encoders = Vec::new();
    for line in lines {
        let mut tokens = line.split_whitespace();
        let (Some(flags), Some(name)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        let kind = match flags.chars().next() {
            Some('V') => MediaKind::Video,
            Some('A') => MediaKind::Audio,
            Some('S') => MediaKind::Subtitle,
            _ => MediaKind::Other,
        };
        let experimental = flags
            .chars()
            .nth(experimental_column)
            .is_some_and(|c| c != '.');
        encoders.push(EncoderInfo {
            kind,
            name: name.to_string(),
            experimental,
            description: tokens.collect::<Vec<_>>().join(" "),
        });
    }

    if encoders.is_empty() {
        anyhow::bail!("encoder listing is empty");
    }
    Ok(encoders)
}

/// Checks that `codec` is a usable, non-experimental audio encoder.
pub fn check_audio_codec(encoders: &[EncoderInfo], codec: &str) -> anyhow::Result<()> {
    let found = encoders
        .iter()
        .find(|e| e.kind == MediaKind::Audio && e.name == codec);
    match found {
        Some(e) if e.experimental => {
            anyhow::bail!("Audio codec {:?} is experimental and cannot be used", codec)
        }
        Some(_) => Ok(()),
        None => anyhow::bail!("Audio codec {:?} does not exist", codec),
    }
}

/// [`list_encoders`] followed by [`check_audio_codec`].
pub async fn precheck_audio_codec(exec: &Path, codec: &str) -> anyhow::Result<()> {
    let encoders = list_encoders(exec).await?;
    log::debug!("ffmpeg offers {} encoders", encoders.len());
    check_audio_codec(&encoders, codec)
}
