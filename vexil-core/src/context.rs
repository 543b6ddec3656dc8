//! Evaluation context (targeting key and attributes)

use crate::FlagValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Caller-supplied attributes passed to every resolution call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    targeting_key: Option<String>,
    attributes: HashMap<String, FlagValue>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targeting_key(mut self, key: impl Into<String>) -> Self {
        self.targeting_key = Some(key.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn targeting_key(&self) -> Option<&str> {
        self.targeting_key.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&FlagValue> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &HashMap<String, FlagValue> {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.targeting_key.is_none() && self.attributes.is_empty()
    }

    /// Merge `other` on top of `self`; values from `other` win.
    pub fn merge(&self, other: &EvaluationContext) -> EvaluationContext {
        let mut merged = self.clone();
        if other.targeting_key.is_some() {
            merged.targeting_key = other.targeting_key.clone();
        }
        for (key, value) in &other.attributes {
            merged.attributes.insert(key.clone(), value.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_right_hand_wins() {
        let base = EvaluationContext::new()
            .with_targeting_key("user-1")
            .with_attribute("plan", "free")
            .with_attribute("region", "eu");
        let overlay = EvaluationContext::new().with_attribute("plan", "pro");

        let merged = base.merge(&overlay);
        assert_eq!(merged.targeting_key(), Some("user-1"));
        assert_eq!(merged.get("plan"), Some(&FlagValue::string("pro")));
        assert_eq!(merged.get("region"), Some(&FlagValue::string("eu")));
    }

    #[test]
    fn test_merge_replaces_targeting_key() {
        let base = EvaluationContext::new().with_targeting_key("user-1");
        let overlay = EvaluationContext::new().with_targeting_key("user-2");
        assert_eq!(base.merge(&overlay).targeting_key(), Some("user-2"));
    }

    #[test]
    fn test_empty_context() {
        assert!(EvaluationContext::new().is_empty());
        assert!(!EvaluationContext::new().with_attribute("a", true).is_empty());
    }
}
