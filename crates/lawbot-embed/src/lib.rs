#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

mod hash;
mod remote;

pub use hash::HashEmbedder;
pub use remote::RemoteEmbedder;

use std::sync::Arc;
use tracing::info;

use lawbot_core::config::{ApiKey, EmbeddingSettings};
use lawbot_core::traits::Embedder;
use lawbot_core::{Error, Result};

/// True when `APP_USE_FAKE_EMBEDDINGS` asks for the offline embedder.
pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Offline hash embedder when `use_fake_embeddings` holds, otherwise the
/// remote embedder, which needs `key`.
pub fn get_default_embedder(settings: &EmbeddingSettings, key: Option<ApiKey>) -> Result<Arc<dyn Embedder>> {
    if use_fake_embeddings() {
        info!(dim = settings.dim, "using offline hash embedder");
        return Ok(Arc::new(HashEmbedder::new(settings.dim)));
    }
    let key = key.ok_or_else(|| Error::Configuration(format!("{} is required for remote embeddings", settings.api_key_env)))?;
    info!(model = %settings.model, dim = settings.dim, "using remote embedder");
    Ok(Arc::new(RemoteEmbedder::new(settings, key)?))
}
