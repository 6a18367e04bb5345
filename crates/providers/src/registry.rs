//! Provider registry

use std::collections::HashMap;
use std::sync::Arc;

use tts_gateway_core::{GatewayError, SynthesisProvider, Voice};

/// Resolves provider identifiers and aggregates voice catalogs.
///
/// Built once at startup; read-only afterwards.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SynthesisProvider>>,
    voices: Vec<Voice>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn SynthesisProvider>>) -> Self {
        let mut map = HashMap::new();
        let mut voices = Vec::new();

        for provider in providers {
            voices.extend(provider.voices().iter().cloned());
            map.insert(provider.id().to_string(), provider);
        }

        Self {
            providers: map,
            voices,
        }
    }

    /// Resolve a provider id.
    pub fn resolve(&self, provider_id: &str) -> Result<Arc<dyn SynthesisProvider>, GatewayError> {
        self.providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownProvider(provider_id.to_string()))
    }

    /// Look up a voice across all catalogs.
    pub fn find_voice(&self, voice_id: &str) -> Option<&Voice> {
        self.voices.iter().find(|v| v.id == voice_id)
    }

    /// The aggregated voice catalog.
    pub fn all_voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockToneProvider;
    use tts_gateway_config::MockToneConfig;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(vec![Arc::new(MockToneProvider::new(
            MockToneConfig::default(),
        ))])
    }

    #[test]
    fn test_resolve_known_provider() {
        let registry = registry();
        assert!(registry.resolve("mock_tone").is_ok());
    }

    #[test]
    fn test_resolve_unknown_provider() {
        let registry = registry();
        let err = registry.resolve("nope").unwrap_err();
        assert!(matches!(err, GatewayError::UnknownProvider(_)));
    }

    #[test]
    fn test_voice_catalog_aggregation() {
        let registry = registry();
        assert!(!registry.all_voices().is_empty());
        let voice = registry.find_voice("en-US-mock-1").unwrap();
        assert_eq!(voice.provider_id, "mock_tone");
        assert!(registry.find_voice("missing").is_none());
    }
}
