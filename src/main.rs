use tokio::runtime::Runtime;

mod app;
mod backend;
mod config;
mod constants;
mod dialog;
mod gateway;
mod options;
mod protocol;
mod session;
mod ui;

use app::GifForgeApp;
use constants::{APP_NAME, APP_VERSION};
use gateway::EventGateway;

fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting {} {}", APP_NAME, APP_VERSION);

    // Runtime for dialogs, ffmpeg processes and the session; kept alive for
    // the duration of the UI loop.
    let runtime = Runtime::new().expect("Failed to create async runtime");
    let handle = runtime.handle().clone();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([720.0, 560.0])
            .with_min_inner_size([560.0, 480.0])
            .with_title(APP_NAME),
        ..Default::default()
    };

    let app_creator = move |_cc: &eframe::CreationContext| -> Box<dyn eframe::App> {
        Box::new(GifForgeApp::new(handle, EventGateway::new()))
    };

    let result = eframe::run_native(APP_NAME, options, Box::new(app_creator));

    tracing::info!("Application shutting down");
    result
}
