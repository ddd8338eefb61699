//! # Model catalog
//!
//! Named model profiles with their input budgets, and the rule that picks a
//! profile for a piece of content.

use std::collections::HashSet;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::CatalogError;

/// Words-to-tokens ratio used by [`estimate_tokens`].
const TOKENS_PER_WORD: f64 = 1.33;

/// Rough token count: `round(words × 1.33)`.
///
/// This is a heuristic that leans towards overestimating English prose; it is
/// not a tokenizer and will disagree with any real one. It is monotonic in the
/// number of whitespace-separated words.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words as f64 * TOKENS_PER_WORD).round() as usize
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub name: String,
    pub capacity_tokens: u32,
}

impl ModelProfile {
    pub fn new(name: impl Into<String>, capacity_tokens: u32) -> Self {
        Self {
            name: name.into(),
            capacity_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    default: String,
    profiles: Vec<ModelProfile>,
}

/// Immutable set of profiles, kept in ascending capacity order.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    profiles: Vec<ModelProfile>,
    default_idx: usize,
}

impl ModelCatalog {
    pub const BUILTIN_DEFAULT: &'static str = "gpt-4o";

    /// Validates and orders `profiles`. `default` must name one of them.
    pub fn new(profiles: Vec<ModelProfile>, default: &str) -> Result<Self, CatalogError> {
        if profiles.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for profile in &profiles {
            if profile.capacity_tokens == 0 {
                return Err(CatalogError::ZeroCapacity(profile.name.clone()));
            }
            if !seen.insert(profile.name.as_str()) {
                return Err(CatalogError::DuplicateProfile(profile.name.clone()));
            }
        }

        // stable: equal capacities keep their listed order
        let profiles = profiles
            .into_iter()
            .sorted_by_key(|p| p.capacity_tokens)
            .collect::<Vec<_>>();

        let default_idx = profiles
            .iter()
            .position(|p| p.name == default)
            .ok_or_else(|| CatalogError::UnknownDefault(default.to_string()))?;

        Ok(Self {
            profiles,
            default_idx,
        })
    }

    /// The models the tool ships with, defaulting to `gpt-4o`.
    pub fn builtin() -> Self {
        Self {
            profiles: vec![
                ModelProfile::new("gpt-4", 8_192),
                ModelProfile::new("gpt-3.5-turbo", 16_385),
                ModelProfile::new("gpt-4o", 128_000),
                ModelProfile::new("gpt-4.1", 1_047_576),
            ],
            default_idx: 2,
        }
    }

    /// Parses `{"default": "...", "profiles": [{"name": "...", "capacity_tokens": N}]}`.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file = serde_json::from_str::<CatalogFile>(json)?;
        Self::new(file.profiles, &file.default)
    }

    /// Profiles in ascending capacity order.
    pub fn profiles(&self) -> &[ModelProfile] {
        &self.profiles
    }

    pub fn default_profile(&self) -> &ModelProfile {
        &self.profiles[self.default_idx]
    }

    pub fn get(&self, name: &str) -> Option<&ModelProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, profile: &ModelProfile) -> bool {
        self.get(&profile.name) == Some(profile)
    }

    /// Smallest profile whose capacity covers `token_estimate`.
    ///
    /// Inputs larger than every profile fall back to the default profile
    /// rather than failing or jumping to the largest model.
    pub fn select(&self, token_estimate: usize) -> &ModelProfile {
        self.profiles
            .iter()
            .find(|p| p.capacity_tokens as usize >= token_estimate)
            .unwrap_or_else(|| {
                tracing::warn!(
                    token_estimate,
                    default = %self.default_profile().name,
                    "No profile large enough, using default"
                );
                self.default_profile()
            })
    }

    pub fn select_for(&self, text: &str) -> &ModelProfile {
        self.select(estimate_tokens(text))
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
