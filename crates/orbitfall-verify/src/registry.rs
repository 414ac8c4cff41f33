//! Ruleset versions the verifier can replay.
//!
//! A log only replays faithfully under the exact constants it was recorded
//! with, so every version ever handed to clients stays loaded here.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;

use orbitfall_sim::ruleset::Ruleset;
use orbitfall_sim::SimError;

#[derive(Debug, Clone, Default)]
pub struct RulesetRegistry {
    rulesets: BTreeMap<String, Ruleset>,
}

impl RulesetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding only the built-in default ruleset.
    pub fn with_default() -> Self {
        let mut registry = Self::new();
        let ruleset = Ruleset::default();
        registry.rulesets.insert(ruleset.version.clone(), ruleset);
        registry
    }

    /// Load every `*.json` file in `dir` as a ruleset.
    ///
    /// # Errors
    ///
    /// Fails on an unreadable directory or file, a document that does not
    /// parse or validate, or two files declaring the same version.
    pub fn load_dir(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in
            fs::read_dir(dir).with_context(|| format!("reading ruleset directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        // Directory order is platform dependent.
        paths.sort();

        let mut registry = Self::new();
        for path in paths {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading ruleset {}", path.display()))?;
            let ruleset = Ruleset::from_json(&text)
                .with_context(|| format!("loading ruleset {}", path.display()))?;
            if registry.contains(&ruleset.version) {
                anyhow::bail!(
                    "ruleset {} redefines version '{}'",
                    path.display(),
                    ruleset.version
                );
            }
            tracing::info!(version = %ruleset.version, path = %path.display(), "loaded ruleset");
            registry.rulesets.insert(ruleset.version.clone(), ruleset);
        }
        Ok(registry)
    }

    /// Validate and register `ruleset`, replacing any ruleset with the same
    /// version.
    pub fn insert(&mut self, ruleset: Ruleset) -> Result<Option<Ruleset>, SimError> {
        ruleset.validate()?;
        Ok(self.rulesets.insert(ruleset.version.clone(), ruleset))
    }

    pub fn get(&self, version: &str) -> Option<&Ruleset> {
        self.rulesets.get(version)
    }

    pub fn contains(&self, version: &str) -> bool {
        self.rulesets.contains_key(version)
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.rulesets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rulesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rulesets.is_empty()
    }
}
