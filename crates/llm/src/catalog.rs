//! Model Catalog & Resolver (spec §4.1). A static, compiled-in table of known
//! publisher models plus the alias/prefix resolution algorithm.

use config::Config;
use serde::Serialize;

/// One of the three upstream wire formats a canonical model maps to (spec §GLOSSARY
/// "Provider").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Google,
    Imagen,
}

/// Published list price for a catalog entry, surfaced in the `GET /v1/models`
/// vendor-extension block (spec §6). Token-priced models quote per million
/// tokens; Imagen quotes per generated image.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum Prices {
    PerMillionTokens { input_usd: f64, output_usd: f64 },
    PerImage { usd: f64 },
}

/// An immutable catalog entry (spec §3 `ModelSpec`). Never mutated after process start.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub canonical_id: &'static str,
    pub display_name: &'static str,
    pub provider: Provider,
    pub context_window: u32,
    pub max_output: u32,
    /// Ordered region hint; `["global"]` means the cross-region endpoint (spec §4.4 Gemini).
    pub regions: &'static [&'static str],
    pub capabilities: &'static [&'static str],
    pub prices: Prices,
}

/// Regions tried first, in this order, whenever a model lists them (spec §4.2).
pub const PRIORITY_REGIONS: &[&str] = &["us-east5", "us-central1", "europe-west1"];

/// The compiled-in registry (spec §3 `ModelSpec` "Lifecycle: created at process start
/// from a compiled-in table; never mutated").
pub const CATALOG: &[ModelSpec] = &[
    ModelSpec {
        canonical_id: "claude-opus-4-1@20250805",
        display_name: "Claude Opus 4.1",
        provider: Provider::Anthropic,
        context_window: 200_000,
        max_output: 32_000,
        regions: &["us-east5", "europe-west1"],
        capabilities: &["chat", "tools", "vision"],
        prices: Prices::PerMillionTokens { input_usd: 15.0, output_usd: 75.0 },
    },
    ModelSpec {
        canonical_id: "claude-sonnet-4-5@20250929",
        display_name: "Claude Sonnet 4.5",
        provider: Provider::Anthropic,
        context_window: 200_000,
        max_output: 64_000,
        regions: &["us-east5", "us-central1", "europe-west1"],
        capabilities: &["chat", "tools", "vision"],
        prices: Prices::PerMillionTokens { input_usd: 3.0, output_usd: 15.0 },
    },
    ModelSpec {
        canonical_id: "claude-sonnet-4@20250514",
        display_name: "Claude Sonnet 4",
        provider: Provider::Anthropic,
        context_window: 200_000,
        max_output: 64_000,
        regions: &["us-east5", "us-central1", "europe-west1"],
        capabilities: &["chat", "tools", "vision"],
        prices: Prices::PerMillionTokens { input_usd: 3.0, output_usd: 15.0 },
    },
    ModelSpec {
        canonical_id: "claude-haiku-4-5@20251001",
        display_name: "Claude Haiku 4.5",
        provider: Provider::Anthropic,
        context_window: 200_000,
        max_output: 64_000,
        regions: &["us-east5", "us-central1"],
        capabilities: &["chat", "tools", "vision"],
        prices: Prices::PerMillionTokens { input_usd: 1.0, output_usd: 5.0 },
    },
    ModelSpec {
        canonical_id: "claude-3-5-haiku@20241022",
        display_name: "Claude 3.5 Haiku",
        provider: Provider::Anthropic,
        context_window: 200_000,
        max_output: 8_192,
        regions: &["us-east5"],
        capabilities: &["chat", "tools"],
        prices: Prices::PerMillionTokens { input_usd: 0.8, output_usd: 4.0 },
    },
    ModelSpec {
        canonical_id: "gemini-2.5-pro",
        display_name: "Gemini 2.5 Pro",
        provider: Provider::Google,
        context_window: 1_048_576,
        max_output: 65_536,
        regions: &["global"],
        capabilities: &["chat", "tools", "vision"],
        prices: Prices::PerMillionTokens { input_usd: 1.25, output_usd: 10.0 },
    },
    ModelSpec {
        canonical_id: "gemini-2.5-flash",
        display_name: "Gemini 2.5 Flash",
        provider: Provider::Google,
        context_window: 1_048_576,
        max_output: 65_536,
        regions: &["global"],
        capabilities: &["chat", "tools", "vision"],
        prices: Prices::PerMillionTokens { input_usd: 0.3, output_usd: 2.5 },
    },
    ModelSpec {
        canonical_id: "gemini-2.0-flash",
        display_name: "Gemini 2.0 Flash",
        provider: Provider::Google,
        context_window: 1_048_576,
        max_output: 8_192,
        regions: &["us-central1", "europe-west1"],
        capabilities: &["chat", "tools", "vision"],
        prices: Prices::PerMillionTokens { input_usd: 0.1, output_usd: 0.4 },
    },
    ModelSpec {
        canonical_id: "imagen-4.0-generate-001",
        display_name: "Imagen 4",
        provider: Provider::Imagen,
        context_window: 0,
        max_output: 0,
        regions: &["us-central1"],
        capabilities: &["image_generation"],
        prices: Prices::PerImage { usd: 0.04 },
    },
    ModelSpec {
        canonical_id: "imagen-3.0-generate-002",
        display_name: "Imagen 3",
        provider: Provider::Imagen,
        context_window: 0,
        max_output: 0,
        regions: &["us-central1"],
        capabilities: &["image_generation"],
        prices: Prices::PerImage { usd: 0.04 },
    },
];

fn find(canonical: &str) -> Option<&'static ModelSpec> {
    CATALOG.iter().find(|spec| spec.canonical_id == canonical)
}

/// Answers whether `canonical` names a catalog entry; used by
/// [`config::Config::validate_against_catalog`].
pub fn is_known(canonical: &str) -> bool {
    find(canonical).is_some()
}

/// The result of [`resolve`] (spec §4.1 `resolve(input) -> {canonical, provider, spec?}`).
#[derive(Debug, Clone)]
pub struct Resolved {
    pub canonical: String,
    pub provider: Provider,
    pub spec: Option<&'static ModelSpec>,
}

/// Resolve an inbound `model` string through the alias table, then the catalog,
/// then Claude-prefix matching, finally defaulting to the Anthropic branch
/// (spec §4.1). Pure and side-effect free save for the warning log on the
/// unknown-model fallback (spec §3 invariant: `resolved_model ∈ catalog ∨
/// provider=anthropic`).
pub fn resolve(input: &str, config: &Config) -> Resolved {
    // Step 1: alias substitution.
    let after_alias = config.model_aliases.get(input).map(String::as_str).unwrap_or(input);

    // Step 2: direct catalog hit.
    if let Some(spec) = find(after_alias) {
        return Resolved {
            canonical: spec.canonical_id.to_string(),
            provider: spec.provider,
            spec: Some(spec),
        };
    }

    // Step 3: Claude-prefix matching, tie-broken by catalog insertion order.
    if after_alias.starts_with("claude-") && !after_alias.contains('@') {
        if let Some(spec) = CATALOG
            .iter()
            .find(|spec| spec.provider == Provider::Anthropic && spec.canonical_id.starts_with(after_alias))
        {
            return Resolved {
                canonical: spec.canonical_id.to_string(),
                provider: spec.provider,
                spec: Some(spec),
            };
        }
    }

    // Step 4: unknown model, default to Anthropic with a warning.
    log::warn!("model '{input}' is not a known alias or catalog entry; defaulting to the anthropic provider");
    Resolved {
        canonical: after_alias.to_string(),
        provider: Provider::Anthropic,
        spec: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn config_with_alias(alias: &str, target: &str) -> Config {
        let mut aliases = IndexMap::new();
        aliases.insert(alias.to_string(), target.to_string());
        Config {
            model_aliases: aliases,
            ..Default::default()
        }
    }

    #[test]
    fn sonnet_alias_resolves_to_the_chosen_canonical_date() {
        // Open question in spec §9: "sonnet" resolved inconsistently upstream between
        // two Claude dates. We pick @20250929 (SPEC_FULL.md §12).
        let config = config_with_alias("sonnet", "claude-sonnet-4-5@20250929");
        let resolved = resolve("sonnet", &config);
        assert_eq!(resolved.canonical, "claude-sonnet-4-5@20250929");
        assert_eq!(resolved.provider, Provider::Anthropic);
        assert!(resolved.spec.is_some());
    }

    #[test]
    fn unaliased_claude_prefix_matches_first_catalog_entry() {
        let config = Config::default();
        let resolved = resolve("claude-sonnet-4", &config);
        assert_eq!(resolved.canonical, "claude-sonnet-4@20250514");
    }

    #[test]
    fn unknown_model_defaults_to_anthropic_without_spec() {
        let config = Config::default();
        let resolved = resolve("some-made-up-model", &config);
        assert_eq!(resolved.canonical, "some-made-up-model");
        assert_eq!(resolved.provider, Provider::Anthropic);
        assert!(resolved.spec.is_none());
    }

    #[test]
    fn alias_and_direct_canonical_produce_identical_resolution() {
        // Testable property P6 (spec §8): alias and direct canonical id agree.
        let config = config_with_alias("sonnet", "claude-sonnet-4-5@20250929");
        let via_alias = resolve("sonnet", &config);
        let via_canonical = resolve("claude-sonnet-4-5@20250929", &config);
        assert_eq!(via_alias.canonical, via_canonical.canonical);
        assert_eq!(via_alias.provider, via_canonical.provider);
    }

    #[test]
    fn gemini_model_resolves_to_google_provider() {
        let config = Config::default();
        let resolved = resolve("gemini-2.5-flash", &config);
        assert_eq!(resolved.provider, Provider::Google);
    }
}
