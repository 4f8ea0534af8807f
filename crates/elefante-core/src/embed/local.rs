//! Local embeddings via fastembed (ONNX inference, no external API calls).
//!
//! The model is process-global and lazily loaded; weights are fetched into a
//! platform cache directory on first use.

use std::sync::{Mutex, OnceLock};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::provider::{EmbedError, Embedding, EmbeddingProvider};

/// Output dimensions of the default fastembed model
pub const FASTEMBED_DIMENSIONS: usize = 384;

/// Maximum text length passed to the model (characters; longer is truncated)
const MAX_TEXT_LENGTH: usize = 8192;

/// Result type for model initialization; errors are cached so every caller
/// sees the same failure instead of re-downloading
static EMBEDDING_MODEL_RESULT: OnceLock<Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

/// Cache directory for model weights.
/// Uses ELEFANTE_MODEL_CACHE env var, or falls back to the platform cache dir.
fn get_cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("ELEFANTE_MODEL_CACHE") {
        return std::path::PathBuf::from(path);
    }

    if let Some(proj_dirs) = directories::ProjectDirs::from("ai", "elefante", "core") {
        return proj_dirs.cache_dir().join("fastembed");
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".cache/elefante/fastembed");
    }

    std::path::PathBuf::from(".fastembed_cache")
}

fn get_model() -> Result<std::sync::MutexGuard<'static, TextEmbedding>, EmbedError> {
    let result = EMBEDDING_MODEL_RESULT.get_or_init(|| {
        let cache_dir = get_cache_dir();
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            tracing::warn!("Failed to create model cache directory {:?}: {}", cache_dir, e);
        }

        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false)
            .with_cache_dir(cache_dir);

        TextEmbedding::try_new(options).map(Mutex::new).map_err(|e| {
            format!(
                "Failed to initialize embedding model: {}. \
                 Ensure ONNX runtime is available and model files can be downloaded.",
                e
            )
        })
    });

    match result {
        Ok(model) => model
            .lock()
            .map_err(|e| EmbedError::ModelInit(format!("Lock poisoned: {}", e))),
        Err(err) => Err(EmbedError::ModelInit(err.clone())),
    }
}

/// Embedding provider backed by a local fastembed model
pub struct FastembedProvider {
    _unused: (),
}

impl FastembedProvider {
    /// Create the provider. The model loads lazily on first [`embed`] call.
    ///
    /// [`embed`]: EmbeddingProvider::embed
    pub fn new() -> Self {
        Self { _unused: () }
    }

    /// Eagerly load the model, surfacing any download/init error
    pub fn init(&self) -> Result<(), EmbedError> {
        get_model().map(|_| ())
    }

    /// True when the model loaded (or can load) successfully
    pub fn is_ready(&self) -> bool {
        match get_model() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Embedding model not ready: {}", e);
                false
            }
        }
    }
}

impl Default for FastembedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for FastembedProvider {
    fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::InvalidInput("empty text".to_string()));
        }

        let truncated = if text.len() > MAX_TEXT_LENGTH {
            // Truncate on a char boundary
            let mut end = MAX_TEXT_LENGTH;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            &text[..end]
        } else {
            text
        };

        let mut model = get_model()?;
        let vectors = model
            .embed(vec![truncated], None)
            .map_err(|e| EmbedError::Failed(e.to_string()))?;

        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Failed("model returned no vectors".to_string()))?;

        let mut embedding = Embedding::new(vector);
        embedding.normalize();
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        FASTEMBED_DIMENSIONS
    }

    fn model_name(&self) -> &str {
        "sentence-transformers/all-MiniLM-L6-v2"
    }
}
