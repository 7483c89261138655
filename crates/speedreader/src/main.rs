// CLI glue: file handling and progress reporting do a few lossy numeric
// conversions that are safe for realistic image sizes.
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

//! SpeedReader CLI - OCR images into words with bounding polygons.
//!
//! `speedreader page1.png page2.jpg` prints a JSON array of per-page
//! results to stdout. `--serve` runs the HTTP/WebSocket server instead;
//! `--viz` writes an SVG overlay next to each input.

mod boot;
mod viz;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use speedreader_core::{json, Image, OcrJsonResult, PageContext};
use speedreader_server::ApiState;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "speedreader", version, about = "Two-stage neural OCR over ONNX models")]
struct Cli {
    /// Image files to recognize.
    files: Vec<PathBuf>,

    /// Start the HTTP/WebSocket server (incompatible with files and --viz).
    #[arg(long)]
    serve: bool,

    /// Additionally write `<name>_viz.svg` next to each input.
    #[arg(long)]
    viz: bool,

    /// Bind address for --serve; falls back to SPEEDREADER_ADDR.
    #[arg(long)]
    addr: Option<String>,

    /// Directory holding det.onnx, rec.onnx and dict.txt; falls back to
    /// SPEEDREADER_MODELS, then ./models.
    #[arg(long)]
    models: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "speedreader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    if let Err(message) = validate(&cli) {
        eprintln!("error: {message}");
        return ExitCode::from(1);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn validate(cli: &Cli) -> Result<(), String> {
    if cli.serve && !cli.files.is_empty() {
        return Err("--serve cannot be combined with input files".into());
    }
    if cli.serve && cli.viz {
        return Err("--serve cannot be combined with --viz".into());
    }
    if !cli.serve && cli.files.is_empty() {
        return Err("no input files given (or pass --serve)".into());
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async {
        let models_dir = boot::resolve_models_dir(cli.models.clone())?;
        let pipeline = boot::build_pipeline(&models_dir)?;

        if cli.serve {
            let addr = cli
                .addr
                .clone()
                .or_else(|| std::env::var("SPEEDREADER_ADDR").ok())
                .unwrap_or_else(|| "0.0.0.0:8080".into());
            speedreader_server::start_server(&addr, ApiState::new(pipeline))
                .await
                .context("server failed")?;
            return Ok(());
        }

        process_files(&cli, &pipeline).await
    })
}

async fn process_files(
    cli: &Cli,
    pipeline: &speedreader_pipeline::OcrPipeline,
) -> Result<()> {
    // Decode everything first so bad inputs fail before inference starts.
    let mut pages = Vec::with_capacity(cli.files.len());
    for (index, path) in cli.files.iter().enumerate() {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let image = Image::decode(&bytes)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        let dims = (image.width(), image.height());
        pages.push((index, path.clone(), image, dims));
    }

    let submissions: Vec<_> = pages
        .into_iter()
        .map(|(index, path, image, dims)| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());
            let ctx = match &name {
                Some(name) => PageContext::with_source(index, name.clone()),
                None => PageContext::new(index),
            };
            async move {
                let result = pipeline.submit(image, ctx).await?;
                Ok::<_, speedreader_core::OcrError>((path, name, dims, result))
            }
        })
        .collect();

    let outcomes = futures::future::join_all(submissions).await;

    let mut output = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let (path, name, dims, result) = outcome.context("ocr failed")?;
        if cli.viz {
            let svg = viz::render_svg(dims.0, dims.1, &result);
            let target = viz::viz_path(&path);
            std::fs::write(&target, svg)
                .with_context(|| format!("failed to write {}", target.display()))?;
            tracing::info!(file = %target.display(), "wrote visualization");
        }
        output.push(OcrJsonResult::new(name, result));
    }

    let text = json::to_pretty_json(&output).context("failed to serialize results")?;
    println!("{text}");
    Ok(())
}
