use crate::backend::FfmpegBackend;
use crate::config::Config;
use crate::dialog::DialogAdapter;
use crate::gateway::EventGateway;
use crate::options::{ConversionOptions, Quality};
use crate::session::{ConversionSession, ConversionStatus};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;

/// Async results the UI thread picks up on the next frame.
#[derive(Default)]
struct PendingResults {
    input_file: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    backend_available: Option<bool>,
}

pub struct GifForgeApp {
    runtime: Handle,
    session: Arc<ConversionSession>,
    dialog: DialogAdapter,
    backend: Arc<FfmpegBackend>,
    config: Config,
    pending: Arc<Mutex<PendingResults>>,

    pub input_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub fps: u32,
    pub width: u32,
    pub quality: Quality,
    pub options_error: Option<String>,
    pub backend_available: Option<bool>,
}

impl GifForgeApp {
    pub fn new(runtime: Handle, events: EventGateway) -> Self {
        let config = Config::load();
        let backend = Arc::new(FfmpegBackend::with_folders(
            events.publisher(),
            config.last_input_folder.clone(),
            config.last_output_folder.clone(),
        ));
        let session = Arc::new(ConversionSession::new(Arc::clone(&backend) as _, &events));
        let dialog = DialogAdapter::new(Arc::clone(&backend) as _);
        let pending = Arc::new(Mutex::new(PendingResults::default()));

        let app = Self {
            runtime,
            session,
            dialog,
            backend,
            fps: config.default_fps,
            width: config.default_width,
            quality: config.default_quality,
            config,
            pending,
            input_file: None,
            output_dir: None,
            options_error: None,
            backend_available: None,
        };

        app.spawn_backend_check();
        app
    }

    fn spawn_backend_check(&self) {
        use crate::gateway::CommandGateway;

        let backend = Arc::clone(&self.backend);
        let pending = Arc::clone(&self.pending);
        self.runtime.spawn(async move {
            let available = backend.check_backend_available().await;
            if !available {
                tracing::warn!("ffmpeg not found on PATH");
            }
            if let Ok(mut pending) = pending.lock() {
                pending.backend_available = Some(available);
            }
        });
    }

    /// Applies results of finished async work; called once per frame.
    pub fn poll_async_results(&mut self) {
        let taken = {
            let Ok(mut pending) = self.pending.lock() else {
                return;
            };
            (
                pending.input_file.take(),
                pending.output_dir.take(),
                pending.backend_available.take(),
            )
        };

        if let Some(path) = taken.0 {
            self.input_file = Some(path);
            self.persist_folders();
        }
        if let Some(path) = taken.1 {
            self.output_dir = Some(path);
            self.persist_folders();
        }
        if let Some(available) = taken.2 {
            self.backend_available = Some(available);
        }
    }

    fn persist_folders(&mut self) {
        let (input, output) = self.backend.last_folders();
        self.config.last_input_folder = input;
        self.config.last_output_folder = output;
        self.config.save();
    }

    pub fn browse_input(&self, ctx: &egui::Context) {
        let dialog = self.dialog.clone();
        let pending = Arc::clone(&self.pending);
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            // Cancellation comes back as None and leaves the selection alone.
            if let Some(path) = dialog.select_input_file().await {
                if let Ok(mut pending) = pending.lock() {
                    pending.input_file = Some(path);
                }
                ctx.request_repaint();
            }
        });
    }

    pub fn browse_output(&self, ctx: &egui::Context) {
        let dialog = self.dialog.clone();
        let pending = Arc::clone(&self.pending);
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            if let Some(path) = dialog.select_output_directory().await {
                if let Ok(mut pending) = pending.lock() {
                    pending.output_dir = Some(path);
                }
                ctx.request_repaint();
            }
        });
    }

    pub fn status(&self) -> ConversionStatus {
        self.session.snapshot()
    }

    pub fn can_convert(&self) -> bool {
        self.input_file.is_some()
            && self.output_dir.is_some()
            && self.backend_available != Some(false)
    }

    pub fn start_conversion(&mut self) {
        let (Some(input), Some(output_dir)) = (self.input_file.clone(), self.output_dir.clone())
        else {
            return;
        };

        let options = match ConversionOptions::validate(self.fps, self.width, self.quality) {
            Ok(options) => options,
            Err(e) => {
                // Rejected before a job is created; the session never sees it.
                self.options_error = Some(e.to_string());
                return;
            }
        };
        self.options_error = None;

        self.config.default_fps = self.fps;
        self.config.default_width = self.width;
        self.config.default_quality = self.quality;
        self.config.save();

        let session = Arc::clone(&self.session);
        self.runtime.spawn(async move {
            // Failures surface through the session status; nothing to do here.
            let _ = session.convert(&input, &output_dir, options).await;
        });
    }

    pub fn reset(&mut self) {
        self.session.reset();
        self.options_error = None;
    }
}
