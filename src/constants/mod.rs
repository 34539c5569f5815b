// App constants
pub const APP_NAME: &str = "GifForge";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// File handling
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "3gp", "ogv",
];

// Progress is held at 99% until ffmpeg exits cleanly.
pub const PROGRESS_CEILING: f64 = 99.0;

// Used when ffprobe cannot determine the input duration.
pub const FALLBACK_DURATION_SECONDS: f64 = 10.0;

// How many trailing stderr lines are kept for the failure message.
pub const STDERR_TAIL_LINES: usize = 5;
