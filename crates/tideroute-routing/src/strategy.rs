//! Selection strategies for ordering eligible providers
//!
//! ## Policies
//!
//! ### Priority
//! Deterministic ordering by `(priority, -success_rate, id)`. Lower priority
//! values are attempted first; among equal priorities the provider with the
//! better track record goes first.
//!
//! ### Weighted Random
//! Sampling without replacement, weighted by `success_rate + 0.1` so that
//! providers with a poor (or no) record keep a non-zero chance of being
//! picked.
//!
//! ```rust
//! use std::collections::HashSet;
//! use std::sync::Arc;
//! use tideroute_routing::{Candidate, ProviderConfig, SelectionPolicy};
//!
//! let tags = vec!["analysis".to_string()];
//! let candidates = vec![
//!     Candidate::new(Arc::new(ProviderConfig::new("b", "sim-b", tags.clone(), 2)), 0.99),
//!     Candidate::new(Arc::new(ProviderConfig::new("a", "sim-a", tags, 1)), 0.90),
//! ];
//!
//! let ordered = SelectionPolicy::Priority.select(&candidates, &HashSet::new());
//! assert_eq!(ordered[0].id(), "a");
//! ```
//!
//! The policy is part of the router configuration and may be switched
//! between calls; a single route call always uses one policy.

use crate::provider_config::ProviderConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Added to every weight so unproven providers stay selectable
pub const WEIGHT_EPSILON: f64 = 0.1;

/// An eligible provider paired with its current success rate
#[derive(Debug, Clone)]
pub struct Candidate {
    pub provider: Arc<ProviderConfig>,
    pub success_rate: f64,
}

impl Candidate {
    pub fn new(provider: Arc<ProviderConfig>, success_rate: f64) -> Self {
        Self {
            provider,
            success_rate,
        }
    }

    pub fn id(&self) -> &str {
        &self.provider.id
    }

    fn weight(&self) -> f64 {
        self.success_rate.max(0.0) + WEIGHT_EPSILON
    }
}

/// Selection policy configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Ascending priority, then descending success rate, then id
    #[default]
    Priority,

    /// Success-rate-weighted sampling without replacement
    WeightedRandom,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::Priority => "priority",
            SelectionPolicy::WeightedRandom => "weighted-random",
        }
    }

    /// Order `candidates`, excluding providers in `already_tried`
    pub fn select(
        &self,
        candidates: &[Candidate],
        already_tried: &HashSet<String>,
    ) -> Vec<Candidate> {
        self.select_with_rng(candidates, already_tried, &mut rand::rng())
    }

    /// Same as `select` with a caller-supplied random source
    pub fn select_with_rng<R: Rng + ?Sized>(
        &self,
        candidates: &[Candidate],
        already_tried: &HashSet<String>,
        rng: &mut R,
    ) -> Vec<Candidate> {
        let remaining: Vec<Candidate> = candidates
            .iter()
            .filter(|c| !already_tried.contains(c.id()))
            .cloned()
            .collect();

        match self {
            SelectionPolicy::Priority => priority_order(remaining),
            SelectionPolicy::WeightedRandom => weighted_order(remaining, rng),
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "priority" => Ok(SelectionPolicy::Priority),
            "weighted-random" | "weighted_random" | "random" => {
                Ok(SelectionPolicy::WeightedRandom)
            }
            other => Err(format!(
                "unknown selection policy '{}', expected 'priority' or 'weighted-random'",
                other
            )),
        }
    }
}

fn priority_order(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        a.provider
            .priority
            .cmp(&b.provider.priority)
            .then_with(|| b.success_rate.total_cmp(&a.success_rate))
            .then_with(|| a.id().cmp(b.id()))
    });
    candidates
}

/// Weighted sampling without replacement (Efraimidis-Spirakis)
///
/// Each candidate draws `u^(1/w)` with `u` uniform in (0, 1]; sorting by
/// the draw, descending, yields a weighted permutation in one pass.
fn weighted_order<R: Rng + ?Sized>(candidates: Vec<Candidate>, rng: &mut R) -> Vec<Candidate> {
    let mut keyed: Vec<(f64, Candidate)> = candidates
        .into_iter()
        .map(|candidate| {
            let u = 1.0 - rng.random::<f64>();
            (u.powf(1.0 / candidate.weight()), candidate)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    keyed.into_iter().map(|(_, candidate)| candidate).collect()
}
