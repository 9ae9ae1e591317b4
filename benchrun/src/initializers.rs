//! Resolution of the configured initializer selector.
//!
//! The embedding application registers its deterministic initializers under
//! fully-qualified names (e.g. `heuristics::savings`); the configuration then
//! picks one by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};

use crate::core::solver::Initializer;
use crate::init_cache::SelectedInitializer;

#[derive(Default, Clone)]
pub struct InitializerRegistry {
    entries: BTreeMap<String, Arc<dyn Initializer>>,
}

impl InitializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `initializer` under `selector`. Names must be unique.
    pub fn register(
        &mut self,
        selector: impl Into<String>,
        initializer: Arc<dyn Initializer>,
    ) -> Result<()> {
        let selector = selector.into();
        if selector.trim().is_empty() {
            bail!("initializer selector must be non-empty");
        }
        if self.entries.contains_key(&selector) {
            bail!("initializer {selector} registered twice");
        }
        self.entries.insert(selector, initializer);
        Ok(())
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resolve an optional selector. `None` means runs start cold; an unknown
    /// name is an error.
    pub fn resolve(&self, selector: Option<&str>) -> Result<Option<SelectedInitializer>> {
        let Some(selector) = selector else {
            return Ok(None);
        };
        let initializer = self.entries.get(selector).ok_or_else(|| {
            let known = self.selectors().collect::<Vec<_>>().join(", ");
            anyhow!("unknown initializer {selector} (registered: [{known}])")
        })?;
        Ok(Some(SelectedInitializer {
            selector: selector.to_string(),
            initializer: Arc::clone(initializer),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::RunHandle;
    use crate::core::types::BenchmarkCase;

    struct Identity;

    impl Initializer for Identity {
        fn initialize(&self, case: &BenchmarkCase, run: &mut RunHandle<'_>) -> Result<()> {
            let tour: Vec<u32> = (0..case.nodes).collect();
            run.register_evaluation(0.0, &tour);
            Ok(())
        }
    }

    #[test]
    fn resolves_registered_selector() {
        let mut registry = InitializerRegistry::new();
        registry
            .register("heuristics::identity", Arc::new(Identity))
            .expect("register");

        assert!(registry.resolve(None).expect("none").is_none());
        let selected = registry
            .resolve(Some("heuristics::identity"))
            .expect("resolve")
            .expect("some");
        assert_eq!(selected.selector, "heuristics::identity");
    }

    #[test]
    fn unknown_selector_lists_known_names() {
        let mut registry = InitializerRegistry::new();
        registry
            .register("heuristics::identity", Arc::new(Identity))
            .expect("register");
        let err = registry
            .resolve(Some("heuristics::missing"))
            .err()
            .expect("unknown");
        let message = err.to_string();
        assert!(message.contains("heuristics::missing"));
        assert!(message.contains("heuristics::identity"));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = InitializerRegistry::new();
        registry
            .register("a", Arc::new(Identity))
            .expect("register");
        assert!(registry.register("a", Arc::new(Identity)).is_err());
        assert!(registry.register(" ", Arc::new(Identity)).is_err());
    }
}
