//! The static set of endpoints probed every round.

use std::collections::HashSet;

use tracing::warn;

/// URL template used for the built-in jurisdictions; `{id}` is replaced by the code.
pub const DEFAULT_URL_TEMPLATE: &str = "https://api-{id}.metrc.com";

/// Jurisdiction codes probed when no configuration overrides them.
pub const DEFAULT_TARGET_IDS: [&str; 26] = [
    "ak", "al", "ca", "co", "dc", "gu", "il", "ky", "la", "ma", "md", "me", "mi", "mn", "mo", "ms",
    "mt", "nv", "ny", "oh", "ok", "or", "ri", "sd", "va", "wv",
];

/// A single probe target, identified by its jurisdiction code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    id: String,
    url: String,
}

impl Target {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self { id: id.into(), url: url.into() }
    }

    /// Build a target by substituting `{id}` in `template`.
    pub fn from_template(template: &str, id: &str) -> Self {
        Self::new(id, template.replace("{id}", id))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The URL as configured. It is not validated here; a malformed URL
    /// surfaces as an unreachable probe result.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Ordered, duplicate-free list of targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRegistry {
    targets: Vec<Target>,
}

impl TargetRegistry {
    /// Create a registry, keeping the first target for any repeated id.
    pub fn new(targets: impl IntoIterator<Item = Target>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for target in targets {
            if seen.insert(target.id.clone()) {
                kept.push(target);
            } else {
                warn!(target_id = %target.id, url = %target.url, "Ignoring duplicate target id");
            }
        }

        Self { targets: kept }
    }

    pub fn from_template<'a>(template: &str, ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(ids.into_iter().map(|id| Target::from_template(template, id)))
    }

    /// The built-in jurisdiction list.
    pub fn builtin() -> Self {
        Self::from_template(DEFAULT_URL_TEMPLATE, DEFAULT_TARGET_IDS)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Target> {
        self.targets.iter().find(|target| target.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(Target::id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<'a> IntoIterator for &'a TargetRegistry {
    type Item = &'a Target;
    type IntoIter = std::slice::Iter<'a, Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = TargetRegistry::builtin();
        assert_eq!(registry.len(), 26);
        assert_eq!(registry.get("ca").map(Target::url), Some("https://api-ca.metrc.com"));
        assert_eq!(registry.ids().next(), Some("ak"));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let registry = TargetRegistry::new([
            Target::new("ca", "https://first.example"),
            Target::new("ny", "https://ny.example"),
            Target::new("ca", "https://second.example"),
        ]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("ca").map(Target::url), Some("https://first.example"));
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["ca", "ny"]);
    }

    #[test]
    fn test_template_substitution() {
        let target = Target::from_template("http://{id}.internal:8080/ping", "mo");
        assert_eq!(target.id(), "mo");
        assert_eq!(target.url(), "http://mo.internal:8080/ping");
    }

    #[test]
    fn test_empty_registry() {
        let registry = TargetRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.get("ca").is_none());
    }
}
