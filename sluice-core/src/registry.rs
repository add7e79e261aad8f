//! Resource registry
//!
//! Maps human-readable resource names to the identifiers a service hands
//! back when the resource is created or looked up (queue URLs, queue ARNs,
//! stream ARNs). The registry is an ordinary owned value: whoever needs
//! identifiers receives it explicitly.

use std::collections::BTreeMap;
use thiserror::Error;

/// Kind of identifier stored under a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    QueueUrl,
    QueueArn,
    StreamArn,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::QueueUrl => write!(f, "queue URL"),
            ResourceKind::QueueArn => write!(f, "queue ARN"),
            ResourceKind::StreamArn => write!(f, "stream ARN"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No {kind} registered for '{name}'")]
    Unknown { kind: ResourceKind, name: String },
}

/// Owned mapping of `(kind, name)` to identifier
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    entries: BTreeMap<ResourceKind, BTreeMap<String, String>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an identifier, returning the one it replaced
    pub fn insert(
        &mut self,
        kind: ResourceKind,
        name: impl Into<String>,
        id: impl Into<String>,
    ) -> Option<String> {
        self.entries
            .entry(kind)
            .or_default()
            .insert(name.into(), id.into())
    }

    pub fn get(&self, kind: ResourceKind, name: &str) -> Option<&str> {
        self.entries
            .get(&kind)
            .and_then(|names| names.get(name))
            .map(String::as_str)
    }

    /// Like [`ResourceRegistry::get`], but a missing entry is an error
    pub fn require(&self, kind: ResourceKind, name: &str) -> Result<&str, RegistryError> {
        self.get(kind, name).ok_or_else(|| RegistryError::Unknown {
            kind,
            name: name.to_string(),
        })
    }

    pub fn remove(&mut self, kind: ResourceKind, name: &str) -> Option<String> {
        let names = self.entries.get_mut(&kind)?;
        let removed = names.remove(name);
        if names.is_empty() {
            self.entries.remove(&kind);
        }
        removed
    }

    /// Drops every identifier recorded under `name`
    pub fn forget(&mut self, name: &str) {
        for names in self.entries.values_mut() {
            names.remove(name);
        }
        self.entries.retain(|_, names| !names.is_empty());
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by kind, then name
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, &str, &str)> {
        self.entries.iter().flat_map(|(kind, names)| {
            names
                .iter()
                .map(move |(name, id)| (*kind, name.as_str(), id.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = ResourceRegistry::new();
        assert!(registry.is_empty());

        let replaced = registry.insert(
            ResourceKind::QueueUrl,
            "First-Queue",
            "http://localhost:4566/000000000000/First-Queue",
        );
        assert_eq!(replaced, None);

        assert_eq!(
            registry.get(ResourceKind::QueueUrl, "First-Queue"),
            Some("http://localhost:4566/000000000000/First-Queue")
        );
        assert_eq!(registry.get(ResourceKind::QueueArn, "First-Queue"), None);
    }

    #[test]
    fn test_insert_replaces() {
        let mut registry = ResourceRegistry::new();
        registry.insert(ResourceKind::StreamArn, "new_stream", "arn:1");
        let old = registry.insert(ResourceKind::StreamArn, "new_stream", "arn:2");

        assert_eq!(old.as_deref(), Some("arn:1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_require_reports_missing_entry() {
        let registry = ResourceRegistry::new();
        let err = registry
            .require(ResourceKind::QueueArn, "Queue_and_dead")
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "No queue ARN registered for 'Queue_and_dead'"
        );
    }

    #[test]
    fn test_forget_and_iter_order() {
        let mut registry = ResourceRegistry::new();
        registry.insert(ResourceKind::QueueArn, "b", "arn:b");
        registry.insert(ResourceKind::QueueUrl, "b", "url:b");
        registry.insert(ResourceKind::QueueUrl, "a", "url:a");

        let names: Vec<_> = registry.iter().map(|(_, name, _)| name).collect();
        assert_eq!(names, vec!["a", "b", "b"]);

        registry.forget("b");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.remove(ResourceKind::QueueUrl, "a").as_deref(), Some("url:a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_removing_last_entry_empties_registry() {
        let mut registry = ResourceRegistry::new();
        registry.insert(ResourceKind::QueueUrl, "First-Queue", "url:1");
        registry.insert(ResourceKind::QueueArn, "First-Queue", "arn:1");

        assert_eq!(registry.remove(ResourceKind::StreamArn, "First-Queue"), None);
        assert_eq!(registry.remove(ResourceKind::QueueArn, "missing"), None);
        assert_eq!(registry.len(), 2);

        registry.remove(ResourceKind::QueueUrl, "First-Queue");
        registry.remove(ResourceKind::QueueArn, "First-Queue");
        assert!(registry.is_empty());
        assert_eq!(registry.iter().count(), 0);
    }
}
