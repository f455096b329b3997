//! Local embedding provider using Candle
//!
//! Runs `sentence-transformers/all-MiniLM-L6-v2` (384 dimensions) with mean
//! pooling and L2 normalization, the same recipe the sentence-transformers
//! library applies.
//!
//! GPU acceleration via compile-time features:
//! - `--features metal` for macOS Metal/MPS
//! - `--features cuda` for NVIDIA CUDA

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::{api::sync::Api, Repo, RepoType};
use once_cell::sync::OnceCell;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};
use crate::error::{Result, SearchError};
use crate::schema::EMBEDDING_DIM;

/// Default model on HuggingFace Hub
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Longest input the model was trained on, in tokens
const MAX_SEQUENCE_LENGTH: usize = 256;

/// Data type for model inference
const DTYPE: DType = DType::F32;

/// Local embedding provider using Candle for inference
///
/// Cheap to clone; clones share the lazily loaded model, which lets
/// `spawn_blocking` move a handle into the blocking task.
#[derive(Clone)]
pub struct LocalProvider {
    inner: Arc<LocalProviderInner>,
}

struct LocalProviderInner {
    model_id: String,
    model: OnceCell<LoadedModel>,
    device: Device,
}

struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
}

impl LocalProvider {
    /// Create a provider for the default model; nothing is loaded yet.
    ///
    /// Device is selected automatically: Metal > CUDA > CPU
    pub fn new() -> Result<Self> {
        Self::with_model(DEFAULT_MODEL_ID)
    }

    /// Create a provider for another 384-dimension sentence-transformers model
    pub fn with_model(model_id: impl Into<String>) -> Result<Self> {
        let device = select_device()?;
        Ok(Self {
            inner: Arc::new(LocalProviderInner {
                model_id: model_id.into(),
                model: OnceCell::new(),
                device,
            }),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.inner.model_id
    }

    /// Whether the model has been loaded
    pub fn is_loaded(&self) -> bool {
        self.inner.model.get().is_some()
    }

    fn device_name(&self) -> String {
        match &self.inner.device {
            Device::Cpu => "CPU".to_string(),
            #[cfg(feature = "metal")]
            Device::Metal(_) => "Metal".to_string(),
            #[cfg(feature = "cuda")]
            Device::Cuda(_) => "CUDA".to_string(),
            #[allow(unreachable_patterns)]
            _ => "Unknown".to_string(),
        }
    }

    fn ensure_model(&self) -> Result<&LoadedModel> {
        self.inner
            .model
            .get_or_try_init(|| load_model(&self.inner.model_id, &self.inner.device))
    }

    fn embed_sync(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Encoding {} texts with {}", texts.len(), self.inner.model_id);
        let loaded = self.ensure_model()?;
        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
        encode(&loaded.model, &loaded.tokenizer, &self.inner.device, &texts)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let provider = self.clone();
        tokio::task::spawn_blocking(move || provider.embed_sync(&texts))
            .await
            .map_err(|e| SearchError::Embedding(format!("Blocking task panicked: {}", e)))?
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        let loaded = self.is_loaded();
        let available = loaded || model_reachable(&self.inner.model_id).is_ok();

        Ok(ProviderStatus {
            available,
            provider_type: EmbeddingProviderType::Local,
            device: self.device_name(),
            latency_ms: None,
            model_ready: loaded,
            error: (!available).then(|| "Model not available - download required".to_string()),
        })
    }

    async fn warmup(&self) -> Result<()> {
        let provider = self.clone();
        let start = Instant::now();

        tokio::task::spawn_blocking(move || provider.ensure_model().map(|_| ()))
            .await
            .map_err(|e| SearchError::Embedding(format!("Warmup task panicked: {}", e)))??;

        info!("LocalProvider warmup complete in {:?}", start.elapsed());
        Ok(())
    }

    fn embedding_dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Local
    }
}

impl std::fmt::Debug for LocalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProvider")
            .field("model_id", &self.inner.model_id)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Select the best available device for inference
fn select_device() -> Result<Device> {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Using Metal/MPS GPU acceleration");
                return Ok(device);
            }
            Err(e) => debug!("Metal not available: {}", e),
        }
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("Using CUDA GPU acceleration");
                return Ok(device);
            }
            Err(e) => debug!("CUDA not available: {}", e),
        }
    }

    debug!("Using CPU for embeddings");
    Ok(Device::Cpu)
}

fn model_repo(model_id: &str) -> Result<hf_hub::api::sync::ApiRepo> {
    let api = Api::new()
        .map_err(|e| SearchError::ProviderUnavailable(format!("HuggingFace API unavailable: {}", e)))?;
    Ok(api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        "main".to_string(),
    )))
}

fn model_reachable(model_id: &str) -> Result<()> {
    model_repo(model_id)?
        .info()
        .map(|_| ())
        .map_err(|e| SearchError::ProviderUnavailable(format!("Model not available: {}", e)))
}

/// Download (or reuse cached) config, tokenizer and weights
fn fetch_model_files(model_id: &str) -> Result<(PathBuf, PathBuf, PathBuf)> {
    let repo = model_repo(model_id)?;
    let fetch = |name: &str| {
        repo.get(name)
            .map_err(|e| SearchError::Embedding(format!("Failed to download {}: {}", name, e)))
    };
    Ok((
        fetch("config.json")?,
        fetch("tokenizer.json")?,
        fetch("model.safetensors")?,
    ))
}

fn load_model(model_id: &str, device: &Device) -> Result<LoadedModel> {
    info!("Loading embedding model ({})...", model_id);

    let (config_path, tokenizer_path, weights_path) = fetch_model_files(model_id)?;

    let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)
        .map_err(|e| SearchError::Embedding(format!("Failed to parse config: {}", e)))?;

    let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| SearchError::Embedding(format!("Failed to load tokenizer: {}", e)))?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        ..Default::default()
    }));
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQUENCE_LENGTH,
            ..Default::default()
        }))
        .map_err(|e| SearchError::Embedding(format!("Failed to configure truncation: {}", e)))?;

    // SAFETY: the safetensors file is not modified while mapped
    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, device)
            .map_err(|e| SearchError::Embedding(format!("Failed to load weights: {}", e)))?
    };

    let model = BertModel::load(vb, &config)
        .map_err(|e| SearchError::Embedding(format!("Failed to create model: {}", e)))?;

    info!("Embedding model loaded (dim={})", EMBEDDING_DIM);
    Ok(LoadedModel { model, tokenizer })
}

/// L2 normalize each row
fn normalize_l2(v: &Tensor) -> Result<Tensor> {
    v.broadcast_div(&v.sqr()?.sum_keepdim(1)?.sqrt()?)
        .map_err(|e| SearchError::Embedding(format!("L2 normalization failed: {}", e)))
}

/// Mean of token embeddings, ignoring padding
fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let mask = attention_mask.to_dtype(DTYPE)?.unsqueeze(2)?;
    let summed = embeddings.broadcast_mul(&mask)?.sum(1)?;
    summed
        .broadcast_div(&mask.sum(1)?)
        .map_err(|e| SearchError::Embedding(format!("Mean pooling failed: {}", e)))
}

fn encode(
    model: &BertModel,
    tokenizer: &Tokenizer,
    device: &Device,
    texts: &[&str],
) -> Result<Vec<Vec<f32>>> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| SearchError::Embedding(format!("Tokenization failed: {}", e)))?;

    let ids = encodings
        .iter()
        .map(|enc| Tensor::new(enc.get_ids(), device))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let masks = encodings
        .iter()
        .map(|enc| Tensor::new(enc.get_attention_mask(), device))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let token_ids = Tensor::stack(&ids, 0)?;
    let attention_mask = Tensor::stack(&masks, 0)?;
    let token_type_ids = token_ids.zeros_like()?;

    let hidden = model
        .forward(&token_ids, &token_type_ids, Some(&attention_mask))
        .map_err(|e| SearchError::Embedding(format!("Forward pass failed: {}", e)))?;

    let pooled = mean_pool(&hidden, &attention_mask)?;
    let normalized = normalize_l2(&pooled)?;

    let rows = (0..normalized.dim(0)?)
        .map(|i| normalized.get(i)?.to_vec1::<f32>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
