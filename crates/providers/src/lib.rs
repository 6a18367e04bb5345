//! Synthesis providers and the provider registry
//!
//! Providers implement the `SynthesisProvider` trait from the core crate:
//! they list voices and produce a lazy, finite chunk sequence for one
//! utterance. The registry resolves provider ids and aggregates catalogs.

mod http;
mod mock;
mod registry;

pub use http::HttpSynthesisProvider;
pub use mock::MockToneProvider;
pub use registry::ProviderRegistry;

use std::sync::Arc;

use tts_gateway_config::ProvidersConfig;
use tts_gateway_core::{GatewayError, SynthesisProvider};

/// Build the registry from configuration, instantiating every enabled
/// provider.
pub fn build_registry(config: &ProvidersConfig) -> Result<ProviderRegistry, GatewayError> {
    let mut providers: Vec<Arc<dyn SynthesisProvider>> = Vec::new();

    if config.mock_tone.enabled {
        providers.push(Arc::new(MockToneProvider::new(config.mock_tone.clone())));
    }

    if config.http.enabled {
        providers.push(Arc::new(HttpSynthesisProvider::new(config.http.clone())?));
    }

    let registry = ProviderRegistry::new(providers);
    tracing::info!(
        providers = registry.provider_count(),
        voices = registry.all_voices().len(),
        "Provider registry initialized"
    );

    Ok(registry)
}
