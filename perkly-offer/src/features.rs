use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use perkly_store::app_config::FeaturesConfig;

pub const CACHE_ENABLED: &str = "cache_enabled";
pub const EVENT_HOOKS_ENABLED: &str = "event_hooks_enabled";

/// Runtime toggles. Flags nobody registered read as disabled.
#[derive(Debug, Default)]
pub struct FeatureFlags {
    flags: RwLock<BTreeMap<String, bool>>,
}

impl FeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a flag with its initial state; an already registered flag keeps its state.
    pub fn register(&self, name: &str, enabled: bool) {
        self.flags
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert(enabled);
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.flags
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .unwrap_or(false)
    }

    pub fn enable(&self, name: &str) {
        self.set(name, true);
    }

    pub fn disable(&self, name: &str) {
        self.set(name, false);
    }

    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.flags.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, name: &str, enabled: bool) {
        self.flags
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), enabled);
    }
}

impl From<&FeaturesConfig> for FeatureFlags {
    fn from(config: &FeaturesConfig) -> Self {
        let flags = FeatureFlags::new();
        flags.register(CACHE_ENABLED, config.cache_enabled);
        flags.register(EVENT_HOOKS_ENABLED, config.event_hooks_enabled);
        flags
    }
}
