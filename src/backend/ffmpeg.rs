//! FFmpeg-backed implementation of the command gateway.
//!
//! One accepted job spawns an ffmpeg process running the two-pass palette
//! pipeline (palettegen + paletteuse) and a monitor task that translates its
//! `-progress` output into job-tagged events: zero or more progress events,
//! then exactly one terminal event.

use crate::constants::{
    FALLBACK_DURATION_SECONDS, PROGRESS_CEILING, STDERR_TAIL_LINES, VIDEO_EXTENSIONS,
};
use crate::gateway::event::EventPublisher;
use crate::gateway::{CommandError, CommandGateway};
use crate::options::ConversionOptions;
use crate::protocol::{EventEnvelope, JobId};
use async_trait::async_trait;
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

pub struct FfmpegBackend {
    events: EventPublisher,
    last_input_dir: Mutex<Option<PathBuf>>,
    last_output_dir: Mutex<Option<PathBuf>>,
}

impl FfmpegBackend {
    pub fn new(events: EventPublisher) -> Self {
        Self {
            events,
            last_input_dir: Mutex::new(None),
            last_output_dir: Mutex::new(None),
        }
    }

    pub fn with_folders(
        events: EventPublisher,
        input_dir: Option<PathBuf>,
        output_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            events,
            last_input_dir: Mutex::new(input_dir),
            last_output_dir: Mutex::new(output_dir),
        }
    }

    /// Folders of the most recent selections, for config persistence.
    pub fn last_folders(&self) -> (Option<PathBuf>, Option<PathBuf>) {
        (
            lock(&self.last_input_dir).clone(),
            lock(&self.last_output_dir).clone(),
        )
    }

    async fn probe_ffmpeg() -> bool {
        match Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(_) => false,
        }
    }

    /// Input duration in seconds via ffprobe, `None` when it cannot be
    /// determined.
    async fn probe_duration(input: &Path) -> Option<f64> {
        let output = Command::new("ffprobe")
            .args(["-v", "quiet", "-show_entries", "format=duration", "-of", "csv=p=0"])
            .arg(input)
            .output()
            .await
            .ok()?;

        String::from_utf8(output.stdout)
            .ok()?
            .trim()
            .parse::<f64>()
            .ok()
    }

    fn spawn_ffmpeg(
        input: &Path,
        output: &Path,
        options: &ConversionOptions,
    ) -> Result<Child, CommandError> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-nostdin")
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(input)
            .arg("-filter_complex")
            .arg(build_filter_complex(options))
            .arg("-progress")
            .arg("pipe:1")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::BackendUnavailable
            } else {
                CommandError::Io(e)
            }
        })
    }

    async fn monitor(
        events: EventPublisher,
        job: JobId,
        mut child: Child,
        output: PathBuf,
        total_duration: f64,
    ) {
        // Drained concurrently with the progress loop: a child blocked on a
        // full stderr pipe would never close stdout, and no terminal event
        // would ever fire.
        let stderr_tail = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut tail: VecDeque<String> = VecDeque::new();
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail.into_iter().collect::<Vec<_>>().join("\n")
            })
        });

        let parser = ProgressParser::new();
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(current) = parser.parse_out_time(&line) {
                    events.publish(EventEnvelope::progress(
                        job,
                        percentage(current, total_duration),
                        "converting",
                        &format!("Processing... {:.1}s / {:.1}s", current, total_duration),
                    ));
                }
            }
        }

        let diagnostics = match stderr_tail {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        match child.wait().await {
            Ok(status) if status.success() => {
                events.publish(EventEnvelope::progress(job, 100.0, "done", "Encoding finished"));
                events.publish(EventEnvelope::completed(job, output));
            }
            Ok(_) => {
                let detail = if diagnostics.is_empty() {
                    "no diagnostic output".to_string()
                } else {
                    diagnostics
                };
                tracing::error!(%job, "ffmpeg exited with non-zero status: {detail}");
                events.publish(EventEnvelope::failed(
                    job,
                    format!("FFmpeg exited with an error: {detail}"),
                ));
            }
            Err(e) => {
                tracing::error!(%job, error = %e, "failed to wait on ffmpeg");
                events.publish(EventEnvelope::failed(job, format!("FFmpeg process error: {e}")));
            }
        }
    }
}

#[async_trait]
impl CommandGateway for FfmpegBackend {
    async fn pick_input_file(&self) -> Result<Option<PathBuf>, CommandError> {
        let mut dialog = rfd::AsyncFileDialog::new()
            .add_filter("Video", VIDEO_EXTENSIONS)
            .set_title("Select a video");
        if let Some(dir) = lock(&self.last_input_dir).clone() {
            dialog = dialog.set_directory(dir);
        }

        let selection = dialog.pick_file().await.map(|f| f.path().to_path_buf());
        if let Some(path) = &selection {
            *lock(&self.last_input_dir) = path.parent().map(Path::to_path_buf);
        }
        Ok(selection)
    }

    async fn pick_output_directory(&self) -> Result<Option<PathBuf>, CommandError> {
        let mut dialog = rfd::AsyncFileDialog::new().set_title("Select an output directory");
        if let Some(dir) = lock(&self.last_output_dir).clone() {
            dialog = dialog.set_directory(dir);
        }

        let selection = dialog.pick_folder().await.map(|f| f.path().to_path_buf());
        if let Some(path) = &selection {
            *lock(&self.last_output_dir) = Some(path.clone());
        }
        Ok(selection)
    }

    async fn check_backend_available(&self) -> bool {
        Self::probe_ffmpeg().await
    }

    async fn start_conversion(
        &self,
        job: JobId,
        input: &Path,
        output_dir: &Path,
        options: &ConversionOptions,
    ) -> Result<(), CommandError> {
        if !input.is_file() {
            return Err(CommandError::InvalidPath {
                path: input.to_path_buf(),
                reason: "input file does not exist".to_string(),
            });
        }

        tokio::fs::create_dir_all(output_dir).await?;

        let output = gif_output_path(input, output_dir);
        let total_duration = Self::probe_duration(input)
            .await
            .unwrap_or(FALLBACK_DURATION_SECONDS);

        // Spawn before returning so a missing binary or unreadable input is
        // a synchronous start error, not a runtime failure event.
        let child = Self::spawn_ffmpeg(input, &output, options)?;

        self.events.publish(EventEnvelope::progress(
            job,
            0.0,
            "starting",
            "Generating color palette...",
        ));

        tracing::info!(%job, output = %output.display(), "ffmpeg accepted job");

        let events = self.events.clone();
        tokio::spawn(Self::monitor(events, job, child, output, total_duration));

        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Single-command two-pass pipeline: scale and resample, then generate a
/// palette from one branch and apply it to the other.
fn build_filter_complex(options: &ConversionOptions) -> String {
    format!(
        "[0:v] fps={},scale={}:-1:flags=lanczos,split [a][b];[a] palettegen=max_colors={} [p];[b][p] paletteuse=dither={}",
        options.fps(),
        options.width(),
        options.quality().max_colors(),
        options.quality().dither_algo()
    )
}

fn gif_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    output_dir.join(format!("{stem}.gif"))
}

fn percentage(current_seconds: f64, total_seconds: f64) -> f64 {
    if total_seconds <= 0.0 {
        return 0.0;
    }
    (current_seconds / total_seconds * 100.0).min(PROGRESS_CEILING)
}

struct ProgressParser {
    out_time: Regex,
}

impl ProgressParser {
    fn new() -> Self {
        Self {
            // -progress emits key=value lines, e.g. out_time=00:00:02.120000
            out_time: Regex::new(r"out_time=(\d+):(\d{2}):(\d{2})\.(\d+)")
                .expect("hardcoded regex"),
        }
    }

    fn parse_out_time(&self, line: &str) -> Option<f64> {
        let caps = self.out_time.captures(line)?;
        let hours: f64 = caps[1].parse().ok()?;
        let minutes: f64 = caps[2].parse().ok()?;
        let seconds: f64 = caps[3].parse().ok()?;
        let fraction: f64 = format!("0.{}", &caps[4]).parse().ok()?;
        Some(hours * 3600.0 + minutes * 60.0 + seconds + fraction)
    }
}
