//! Concrete collaborators behind the ports, and the factories that pick them
//! from configuration.

pub mod cached;
pub mod extractive;
#[cfg(feature = "fastembed")]
pub mod fastembed;
pub mod hashing;
pub mod json_index;
pub mod openai;
pub mod openai_chat;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

pub use cached::CachedEmbedder;
pub use extractive::ExtractiveGenerator;
#[cfg(feature = "fastembed")]
pub use fastembed::FastEmbedder;
pub use hashing::HashingEmbedder;
pub use json_index::JsonIndexRepository;
pub use openai::OpenAiEmbedder;
pub use openai_chat::OpenAiGenerator;

use crate::config::{Config, EmbeddingProvider, GenerationProvider};
use crate::error::{MineRagError, Result};
use crate::ports::{AnswerGenerator, EmbeddingGenerator};

pub fn build_embedder(config: &Config) -> Result<Arc<dyn EmbeddingGenerator>> {
    let settings = &config.embedding;
    match settings.provider {
        EmbeddingProvider::Hashing => Ok(with_cache(
            HashingEmbedder::new(settings.dimensions)?,
            settings.cache_size,
        )),
        EmbeddingProvider::OpenAi => {
            let key = api_key(config)?;
            let embedder = OpenAiEmbedder::new(
                key,
                &settings.base_url,
                settings.model.clone(),
                settings.dimensions,
                Duration::from_secs(settings.timeout_secs),
                settings.max_retries,
            )?;
            Ok(with_cache(embedder, settings.cache_size))
        }
        #[cfg(feature = "fastembed")]
        EmbeddingProvider::FastEmbed => Ok(with_cache(
            FastEmbedder::new(settings.batch_size)?,
            settings.cache_size,
        )),
        #[cfg(not(feature = "fastembed"))]
        EmbeddingProvider::FastEmbed => Err(MineRagError::Config(
            "embedding.provider = \"fastembed\" needs a build with the `fastembed` feature"
                .to_string(),
        )),
    }
}

pub fn build_generator(config: &Config) -> Result<Arc<dyn AnswerGenerator>> {
    let settings = &config.generation;
    match settings.provider {
        GenerationProvider::Extractive => Ok(Arc::new(ExtractiveGenerator::new())),
        GenerationProvider::OpenAi => Ok(Arc::new(OpenAiGenerator::new(
            api_key(config)?,
            &settings.base_url,
            settings.model.clone(),
            settings.temperature,
            settings.max_tokens,
            Duration::from_secs(settings.timeout_secs),
            settings.max_retries,
        )?)),
    }
}

fn with_cache<E>(embedder: E, cache_size: usize) -> Arc<dyn EmbeddingGenerator>
where
    E: EmbeddingGenerator + 'static,
{
    match NonZeroUsize::new(cache_size) {
        Some(capacity) => Arc::new(CachedEmbedder::new(embedder, capacity)),
        None => Arc::new(embedder),
    }
}

fn api_key(config: &Config) -> Result<&str> {
    config
        .openai_api_key
        .as_deref()
        .ok_or_else(|| MineRagError::Config("OPENAI_API_KEY is not set".to_string()))
}
