use anyhow::{Context, Result};
use doctutor::{ApiWorker, AppConfig, DocTutorApp};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doctutor=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::discover().context("Failed to load configuration")?;
    info!("Starting DocTutor against {}", config.api.base_url);

    let (api, worker) = ApiWorker::spawn(&config.api).context("Failed to start API worker")?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.ui.window_width, config.ui.window_height])
            .with_min_inner_size([480.0, 400.0])
            .with_title("DocTutor"),
        ..Default::default()
    };

    let shutdown = api.fork();
    let result = eframe::run_native(
        "DocTutor",
        options,
        Box::new(move |cc| Ok(Box::new(DocTutorApp::new(cc, config, api)))),
    );

    shutdown.shutdown();
    if worker.join().is_err() {
        tracing::error!("API worker panicked");
    }

    result.map_err(|e| anyhow::anyhow!("UI error: {}", e))
}
