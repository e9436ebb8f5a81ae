use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use editor_core::{
    DirectorySink, HttpProcessingService, NotificationLevel, WorkflowController, WorkflowEvent,
};
use shared::domain::{
    Adjustment, OutputFormat, BRIGHTNESS_RANGE, CONTRAST_RANGE, MAX_ROTATION_DEGREES,
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

/// Uploads an image, applies brightness/contrast/rotation on the processing
/// service and saves the result as `processed.<format>`.
#[derive(Parser, Debug)]
#[command(name = "editor", version)]
struct Args {
    /// PNG or JPEG image to edit.
    image: PathBuf,
    #[arg(long, default_value_t = 1.0, value_parser = parse_brightness)]
    brightness: f32,
    #[arg(long, default_value_t = 1.0, value_parser = parse_contrast)]
    contrast: f32,
    #[arg(
        long,
        default_value_t = 0,
        value_parser = clap::value_parser!(u16).range(0..=MAX_ROTATION_DEGREES as i64)
    )]
    rotation: u16,
    /// Export format; repeat to export several.
    #[arg(long = "format", default_value = "png")]
    formats: Vec<OutputFormat>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Per-request timeout; 0 waits indefinitely.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn parse_brightness(raw: &str) -> Result<f32, String> {
    parse_in_range(raw, BRIGHTNESS_RANGE)
}

fn parse_contrast(raw: &str) -> Result<f32, String> {
    parse_in_range(raw, CONTRAST_RANGE)
}

fn parse_in_range(raw: &str, (min, max): (f32, f32)) -> Result<f32, String> {
    let value: f32 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside {min}..={max}"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref());
    if let Some(server_url) = &args.server_url {
        settings.server_url = server_url.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        settings.output_dir = output_dir.clone();
    }
    if args.timeout_secs.is_some() {
        settings.request_timeout_secs = args.timeout_secs;
    }

    let service =
        HttpProcessingService::with_timeout(&settings.server_url, settings.request_timeout())
            .with_context(|| format!("failed to set up client for '{}'", settings.server_url))?;
    let controller = WorkflowController::new(
        Arc::new(service),
        Arc::new(DirectorySink::new(&settings.output_dir)),
    );
    let printer = spawn_notice_printer(controller.subscribe_events());

    let result = run(&controller, &args).await;

    drop(controller);
    let _ = printer.await;
    result
}

async fn run(controller: &WorkflowController, args: &Args) -> Result<()> {
    controller
        .upload_file(&args.image)
        .await
        .with_context(|| format!("upload of '{}' failed", args.image.display()))?;

    let adjustment = Adjustment::new(args.brightness, args.contrast, args.rotation);
    controller
        .apply_edits_with(adjustment)
        .await
        .context("applying edits failed")?;

    for format in &args.formats {
        let path = controller
            .export(*format)
            .await
            .with_context(|| format!("export as {format} failed"))?;
        println!("Saved {}", path.display());
    }
    Ok(())
}

fn spawn_notice_printer(mut events: broadcast::Receiver<WorkflowEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(WorkflowEvent::Notice(notice)) => match notice.level {
                    NotificationLevel::Success => println!("{}", notice.message),
                    NotificationLevel::Error => match &notice.detail {
                        Some(detail) => eprintln!("{} ({detail})", notice.message),
                        None => eprintln!("{}", notice.message),
                    },
                },
                Ok(WorkflowEvent::PhaseChanged { from, to }) => {
                    debug!(%from, %to, "workflow phase");
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
