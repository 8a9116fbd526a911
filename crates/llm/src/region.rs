//! Region Planner (spec §4.2): turns a resolved model's catalog region hints
//! into an ordered attempt list, honoring a discovery-cache override when one
//! names a narrower or differently-ordered set.

use crate::catalog::{ModelSpec, PRIORITY_REGIONS};
use std::collections::HashMap;

/// An ordered list of regions to try, most-preferred first. Never empty for a
/// model with at least one catalog or discovery-cache region (spec §3
/// invariant on `RequestContext`/dispatch: "region plan is never empty for a
/// known model").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPlan(pub Vec<String>);

impl RegionPlan {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Optional per-model region override, keyed by canonical model id, loaded
/// once at startup from the path in `Config::discovery_cache_path` (spec §4.2
/// "discovery cache").
#[derive(Debug, Clone, Default)]
pub struct DiscoveryCache(pub HashMap<String, Vec<String>>);

impl DiscoveryCache {
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Parse a cache file: one `model = ["region", ...]` TOML table, tolerant
    /// of missing keys. Malformed input degrades to an empty cache with a
    /// warning rather than failing startup (spec §4.2: discovery is advisory,
    /// never load-bearing).
    pub fn from_toml_str(input: &str) -> Self {
        match toml::from_str::<HashMap<String, Vec<String>>>(input) {
            Ok(map) => Self(map),
            Err(e) => {
                log::warn!("ignoring malformed discovery cache: {e}");
                Self::empty()
            }
        }
    }
}

/// Build the ordered region plan for a resolved model (spec §4.2 algorithm):
/// 1. If the discovery cache names regions for this model, use those, in the
///    cache's own order.
/// 2. Otherwise use the catalog entry's `regions`, reordered so any region
///    that also appears in [`PRIORITY_REGIONS`] comes first, in
///    `PRIORITY_REGIONS` order, with the remainder appended in catalog order.
/// 3. A model whose only catalog region is `"global"` (cross-region Gemini
///    endpoints) is never reordered or overridden — `"global"` is returned
///    as-is.
/// 4. A model with no catalog entry (unresolved; spec §4.1 "unknown models
///    default to the Anthropic branch with a warning") falls back to
///    [`PRIORITY_REGIONS`] itself, so that default branch can still reach an
///    upstream region instead of dead-ending on an empty plan (spec §4.2
///    "otherwise fall back to the global priority list"). The returned plan
///    is never empty.
pub fn plan(spec: Option<&ModelSpec>, discovery: &DiscoveryCache, canonical: &str) -> RegionPlan {
    if let Some(cached) = discovery.0.get(canonical) {
        if !cached.is_empty() {
            return RegionPlan(cached.clone());
        }
    }

    let Some(spec) = spec else {
        return RegionPlan(PRIORITY_REGIONS.iter().map(|r| r.to_string()).collect());
    };

    if spec.regions == ["global"] {
        return RegionPlan(vec!["global".to_string()]);
    }

    let mut ordered: Vec<String> = Vec::with_capacity(spec.regions.len());
    for priority in PRIORITY_REGIONS {
        if spec.regions.contains(priority) {
            ordered.push(priority.to_string());
        }
    }
    for region in spec.regions {
        if !ordered.iter().any(|r| r == region) {
            ordered.push(region.to_string());
        }
    }

    RegionPlan(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Provider;

    const SPEC: ModelSpec = ModelSpec {
        canonical_id: "claude-sonnet-4-5@20250929",
        display_name: "Claude Sonnet 4.5",
        provider: Provider::Anthropic,
        context_window: 200_000,
        max_output: 64_000,
        regions: &["europe-west1", "us-east5", "us-central1"],
        capabilities: &["chat", "tools", "vision"],
        prices: crate::catalog::Prices::PerMillionTokens { input_usd: 3.0, output_usd: 15.0 },
    };

    #[test]
    fn catalog_regions_are_reordered_by_priority() {
        let discovery = DiscoveryCache::empty();
        let plan = plan(Some(&SPEC), &discovery, SPEC.canonical_id);
        assert_eq!(plan.0, vec!["us-east5", "us-central1", "europe-west1"]);
    }

    #[test]
    fn discovery_cache_overrides_catalog_order() {
        let mut discovery = DiscoveryCache::empty();
        discovery.0.insert(SPEC.canonical_id.to_string(), vec!["europe-west1".to_string()]);
        let plan = plan(Some(&SPEC), &discovery, SPEC.canonical_id);
        assert_eq!(plan.0, vec!["europe-west1"]);
    }

    #[test]
    fn global_region_models_are_never_reordered() {
        const GEMINI: ModelSpec = ModelSpec {
            canonical_id: "gemini-2.5-pro",
            display_name: "Gemini 2.5 Pro",
            provider: Provider::Google,
            context_window: 1_048_576,
            max_output: 65_536,
            regions: &["global"],
            capabilities: &["chat", "tools", "vision"],
            prices: crate::catalog::Prices::PerMillionTokens { input_usd: 1.25, output_usd: 10.0 },
        };
        let discovery = DiscoveryCache::empty();
        let plan = plan(Some(&GEMINI), &discovery, GEMINI.canonical_id);
        assert_eq!(plan.0, vec!["global"]);
    }

    #[test]
    fn unknown_model_falls_back_to_the_priority_list() {
        let discovery = DiscoveryCache::empty();
        let plan = plan(None, &discovery, "unknown-model");
        assert!(!plan.is_empty());
        assert_eq!(plan.0, PRIORITY_REGIONS.iter().map(|r| r.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn unknown_model_discovery_cache_override_still_applies() {
        let mut discovery = DiscoveryCache::empty();
        discovery.0.insert("unknown-model".to_string(), vec!["us-east5".to_string()]);
        let plan = plan(None, &discovery, "unknown-model");
        assert_eq!(plan.0, vec!["us-east5"]);
    }

    #[test]
    fn malformed_discovery_cache_degrades_to_empty() {
        let discovery = DiscoveryCache::from_toml_str("not valid toml {{{");
        assert!(discovery.0.is_empty());
    }
}
