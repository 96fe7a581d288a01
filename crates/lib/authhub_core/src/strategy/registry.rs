//! Strategy registry.
//!
//! Built once at startup and passed into the orchestrator; read-only after
//! construction. Placeholder methods are declared as pure metadata so the
//! registry can advertise them for UI discovery while refusing to execute
//! them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::AuthMethodInfo;
use crate::strategy::{AuthStrategy, anonymous::AnonymousStrategy, password::PasswordStrategy};

pub struct StrategyRegistry {
    strategies: HashMap<&'static str, Arc<dyn AuthStrategy>>,
    /// Declared but unimplemented methods: (id, label).
    placeholders: Vec<(&'static str, &'static str)>,
}

/// Methods advertised for UI purposes without an executable strategy.
const PLACEHOLDERS: &[(&str, &str)] = &[
    ("google", "Google OAuth"),
    ("github", "GitHub OAuth"),
    ("magic_link", "Email magic link"),
];

impl StrategyRegistry {
    /// Registry with every built-in strategy and the declared placeholders.
    pub fn with_defaults() -> Self {
        let mut strategies: HashMap<&'static str, Arc<dyn AuthStrategy>> = HashMap::new();
        for strategy in [
            Arc::new(AnonymousStrategy) as Arc<dyn AuthStrategy>,
            Arc::new(PasswordStrategy) as Arc<dyn AuthStrategy>,
        ] {
            strategies.insert(strategy.method_id(), strategy);
        }
        Self {
            strategies,
            placeholders: PLACEHOLDERS.to_vec(),
        }
    }

    pub fn get(&self, method_id: &str) -> Option<Arc<dyn AuthStrategy>> {
        self.strategies.get(method_id).cloned()
    }

    pub fn is_implemented(&self, method_id: &str) -> bool {
        self.strategies.contains_key(method_id)
    }

    pub fn is_placeholder(&self, method_id: &str) -> bool {
        self.placeholders.iter().any(|(id, _)| *id == method_id)
    }

    /// Implemented and placeholder metadata merged, for discovery.
    pub fn list_metadata(&self) -> Vec<AuthMethodInfo> {
        let mut methods: Vec<AuthMethodInfo> = self
            .strategies
            .values()
            .map(|s| AuthMethodInfo {
                id: s.method_id().to_string(),
                label: s.label().to_string(),
                implemented: true,
            })
            .collect();
        methods.sort_by(|a, b| a.id.cmp(&b.id));
        methods.extend(self.placeholders.iter().map(|(id, label)| AuthMethodInfo {
            id: (*id).to_string(),
            label: (*label).to_string(),
            implemented: false,
        }));
        methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_ins_are_implemented() {
        let registry = StrategyRegistry::with_defaults();
        assert!(registry.is_implemented("anonymous"));
        assert!(registry.is_implemented("password"));
        assert!(registry.get("anonymous").is_some());
    }

    #[test]
    fn placeholders_are_metadata_only() {
        let registry = StrategyRegistry::with_defaults();
        assert!(registry.is_placeholder("google"));
        assert!(!registry.is_implemented("google"));
        assert!(registry.get("google").is_none());
    }

    #[test]
    fn metadata_merges_implemented_and_placeholders() {
        let registry = StrategyRegistry::with_defaults();
        let metadata = registry.list_metadata();
        assert_eq!(metadata.len(), 2 + PLACEHOLDERS.len());
        assert!(metadata.iter().any(|m| m.id == "password" && m.implemented));
        assert!(metadata.iter().any(|m| m.id == "google" && !m.implemented));
    }
}
