//! Include/exclude filtering of entities by category.
//!
//! Every category that should be recorded needs a rule. A rule rejects an entity
//! when any exclude pattern matches its name; otherwise it accepts the entity when
//! any include pattern matches. An empty include list behaves as `["*"]`.
//! Categories without a rule reject everything.
//!
//! Patterns use [`glob::Pattern`] syntax and are compiled once when the
//! [`EntityFilter`] is built.

use std::collections::{BTreeMap, HashMap};

use glob::Pattern;
use tracing::warn;

use crate::config::FilterConfig;

/// Compiled include/exclude patterns for one category.
#[derive(Debug, Clone)]
pub struct FilterRule {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
    reject_all: bool,
}

impl FilterRule {
    /// Compile a rule from configuration.
    ///
    /// Returns the first pattern that failed to compile on error.
    pub fn compile(config: &FilterConfig) -> std::result::Result<Self, glob::PatternError> {
        let includes = config
            .includes
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let excludes = config
            .excludes
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            includes,
            excludes,
            reject_all: false,
        })
    }

    /// A rule that rejects every entity.
    pub fn reject_all() -> Self {
        Self {
            includes: Vec::new(),
            excludes: Vec::new(),
            reject_all: true,
        }
    }

    /// Check whether an entity name passes this rule.
    pub fn accepts(&self, name: &str) -> bool {
        if self.reject_all {
            return false;
        }
        if self.excludes.iter().any(|p| p.matches(name)) {
            return false;
        }
        self.includes.is_empty() || self.includes.iter().any(|p| p.matches(name))
    }
}

/// Filter engine consulted before an entity recorder is created.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    rules: HashMap<String, FilterRule>,
}

impl EntityFilter {
    /// Build the engine from per-category configuration.
    ///
    /// A category whose rule contains a malformed pattern rejects every entity.
    pub fn from_config(filters: &BTreeMap<String, FilterConfig>) -> Self {
        let rules = filters
            .iter()
            .map(|(category, config)| {
                let rule = FilterRule::compile(config).unwrap_or_else(|e| {
                    warn!(%category, error = %e, "malformed filter pattern, rejecting category");
                    FilterRule::reject_all()
                });
                (category.clone(), rule)
            })
            .collect();
        Self { rules }
    }

    /// Check whether an entity of `category` named `name` should be recorded.
    pub fn accepts(&self, category: &str, name: &str) -> bool {
        self.rules
            .get(category)
            .is_some_and(|rule| rule.accepts(name))
    }

    /// Whether a rule exists for the category.
    pub fn has_rule(&self, category: &str) -> bool {
        self.rules.contains_key(category)
    }
}
