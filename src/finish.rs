//! Turns the raw encoder outputs of a stopped session into finished files.
//!
//! Nothing here is fatal: the encoded tracks already exist, so failures are
//! logged with their paths and the remaining steps still run.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use ffmpeg_pipe::track::{Track, TrackSummary};

/// Where a session keeps its intermediate and finished files.
#[derive(Clone, Debug)]
pub struct OutputLayout {
    pub output_dir: PathBuf,
    pub name: String,
    pub container: String,
}

impl OutputLayout {
    pub fn new(output_dir: impl Into<PathBuf>, name: &str, container: &str) -> Self {
        Self {
            output_dir: output_dir.into(),
            name: name.to_string(),
            container: container.to_string(),
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.output_dir.join(format!("{}_temp", self.name))
    }

    /// Video encoded by the video pipeline, if one ran.
    pub fn video_file(&self) -> PathBuf {
        self.work_dir().join(format!("video.{}", self.container))
    }

    pub fn final_file(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.name, self.container))
    }

    /// `<name>_<role>.<ext>` next to the final video.
    pub fn role_file(&self, role: &str, ext: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", self.name, role, ext))
    }

    /// Recreates an empty working directory.
    pub async fn prepare(&self) -> anyhow::Result<()> {
        let work_dir = self.work_dir();
        let _ = tokio::fs::remove_dir_all(&work_dir).await;
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| anyhow::anyhow!("create {}: {}", work_dir.display(), e))
    }

    pub async fn cleanup(&self) {
        log::info!("Cleaning up intermediate files...");
        let work_dir = self.work_dir();
        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::error!("Failed to remove {}: {}", work_dir.display(), e);
            }
        }
    }
}

/// Produces the single finished file of a combined session.
///
/// With a video in the working directory both are muxed with stream copy;
/// otherwise the audio itself becomes the finished file.
pub async fn combine(
    layout: &OutputLayout,
    audio: &Path,
    ffmpeg: Option<&Path>,
    show_logs: bool,
) -> Option<PathBuf> {
    let video = layout.video_file();
    let target = layout.final_file();

    if !video.exists() {
        log::info!("No video track found, keeping audio only");
        return move_file(audio, &target).await.then_some(target);
    }

    let Some(ffmpeg) = ffmpeg else {
        log::error!(
            "Cannot combine {} and {}: no ffmpeg executable",
            video.display(),
            audio.display()
        );
        return None;
    };

    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        video.to_string_lossy().into_owned(),
        "-i".to_string(),
        audio.to_string_lossy().into_owned(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "copy".to_string(),
        "-strict".to_string(),
        "-2".to_string(),
    ];
    if layout.container == "mp4" {
        args.push("-movflags".to_string());
        args.push("+faststart".to_string());
    }
    args.push(target.to_string_lossy().into_owned());

    log::info!("Starting composing audio and video into one file...");
    log::info!("Running {} with options: {:?}", ffmpeg.display(), args);

    let mut cmd = tokio::process::Command::new(ffmpeg);
    cmd.args(&args).stdin(Stdio::null());
    if !show_logs {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }

    match cmd.status().await {
        Ok(status) if status.success() => {
            log::info!("Finished! Video is available at: {}", target.display());
            Some(target)
        }
        Ok(status) => {
            log::error!(
                "ffmpeg finished abruptly with {} while writing {}! Please check if you have enough storage",
                status,
                target.display()
            );
            None
        }
        Err(e) => {
            log::error!("Failed to start ffmpeg for {}: {}", target.display(), e);
            None
        }
    }
}

/// Moves the video (if any) and every split track next to each other in the
/// output directory.
pub async fn move_separate_files(layout: &OutputLayout, summaries: &[TrackSummary]) -> Vec<PathBuf> {
    log::info!("Moving separate audio files to output directory...");
    let mut moved = Vec::new();

    let video = layout.video_file();
    if video.exists() {
        let target = layout.final_file();
        if move_file(&video, &target).await {
            moved.push(target);
        }
    }

    for summary in summaries {
        let role = match summary.track {
            Track::Combined => continue,
            track => track.file_stem(),
        };
        let ext = summary
            .output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("wav");
        let target = layout.role_file(role, ext);
        if move_file(&summary.output, &target).await {
            moved.push(target);
        }
    }

    moved
}

async fn move_file(src: &Path, dst: &Path) -> bool {
    match tokio::fs::rename(src, dst).await {
        Ok(()) => {
            log::info!("Moved {} to {}", src.display(), dst.display());
            true
        }
        Err(e) => {
            log::error!(
                "Failed to move {} to {}: {}",
                src.display(),
                dst.display(),
                e
            );
            false
        }
    }
}
