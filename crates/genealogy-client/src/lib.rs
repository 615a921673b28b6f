pub mod cached;
pub mod http;
pub mod request;
pub mod source_client;

pub use cached::*;
pub use http::*;
pub use request::*;
pub use source_client::*;

use genealogy_core::{GenealogyConfig, Result};
use std::time::Duration;

/// The production backend stack: HTTP with the response memo in front.
pub type DefaultBackend = CachedTreeBackend<HttpTreeBackend>;

pub fn build_backend(config: &GenealogyConfig) -> Result<DefaultBackend> {
    let http = HttpTreeBackend::new(config.api.clone())?;
    Ok(CachedTreeBackend::new(
        http,
        Duration::from_secs(config.cache.response_ttl_secs),
    ))
}
