//! Startup wiring: model resolution, pool construction, pipeline assembly.

use anyhow::{Context, Result};
use speedreader_core::{
    DetectionConfig, EngineConfig, PipelineConfig, RecognitionConfig,
};
use speedreader_cpu::PinnedPool;
use speedreader_engine::{resolve_cores, CpuEngine, TextInference};
use speedreader_ocr::{CharDictionary, Detector, Recognizer};
use speedreader_pipeline::OcrPipeline;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Locate the model directory: `--models` flag, then the SPEEDREADER_MODELS
/// environment variable, then `./models`.
pub fn resolve_models_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        if dir.is_dir() {
            return Ok(dir);
        }
        anyhow::bail!("model directory {} does not exist", dir.display());
    }
    if let Ok(env_dir) = std::env::var("SPEEDREADER_MODELS") {
        let dir = PathBuf::from(env_dir);
        if dir.is_dir() {
            return Ok(dir);
        }
    }
    let fallback = PathBuf::from("models");
    if fallback.is_dir() {
        return Ok(fallback);
    }
    anyhow::bail!(
        "could not find a model directory. Tried:\n\
         - the --models flag\n\
         - the SPEEDREADER_MODELS environment variable\n\
         - ./models\n\
         The directory must contain det.onnx, rec.onnx and dict.txt"
    )
}

/// Build the full OCR pipeline over the models in `models_dir`.
pub fn build_pipeline(models_dir: &Path) -> Result<OcrPipeline> {
    let det_bytes = std::fs::read(models_dir.join("det.onnx"))
        .with_context(|| format!("missing detection model in {}", models_dir.display()))?;
    let rec_bytes = std::fs::read(models_dir.join("rec.onnx"))
        .with_context(|| format!("missing recognition model in {}", models_dir.display()))?;
    let dict = CharDictionary::from_path(&models_dir.join("dict.txt"))
        .context("failed to load character dictionary")?;

    let engine_config = EngineConfig::default();
    let pool = Arc::new(build_pool(&engine_config)?);

    let det_engine: Arc<dyn TextInference> = Arc::new(
        CpuEngine::load("detection", &det_bytes, &engine_config, Arc::clone(&pool))
            .context("failed to load detection model")?,
    );
    let rec_engine: Arc<dyn TextInference> = Arc::new(
        CpuEngine::load("recognition", &rec_bytes, &engine_config, Arc::clone(&pool))
            .context("failed to load recognition model")?,
    );

    let detector = Detector::new(DetectionConfig::default());
    let recognizer = Recognizer::new(RecognitionConfig::default(), Arc::new(dict));

    Ok(OcrPipeline::new(
        det_engine,
        rec_engine,
        detector,
        recognizer,
        pool,
        &PipelineConfig::default(),
    ))
}

/// Pin one worker per L2 cache when the platform allows it; otherwise run
/// unpinned at the machine's parallelism so the tool stays usable.
fn build_pool(config: &EngineConfig) -> Result<PinnedPool> {
    match resolve_cores(config).and_then(|cores| Ok(PinnedPool::pinned(&cores)?)) {
        Ok(pool) => Ok(pool),
        Err(err) => {
            warn!(error = %err, "cpu pinning unavailable, using unpinned workers");
            let size = std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(2);
            Ok(PinnedPool::unpinned(size)?)
        }
    }
}
