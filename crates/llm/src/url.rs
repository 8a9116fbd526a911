//! Upstream Vertex AI URL construction (spec §4.4, §GLOSSARY "publisher
//! endpoint"). Every URL is of the shape
//! `https://{region}-aiplatform.googleapis.com/v1/projects/{project}/locations/{region}/publishers/{publisher}/models/{model}:{method}`,
//! except Gemini's cross-region models which drop the region prefix from the
//! host and use `locations/global`.

use crate::catalog::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    RawPredict,
    StreamRawPredict,
    GenerateContent,
    StreamGenerateContent,
    Predict,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Self::RawPredict => "rawPredict",
            Self::StreamRawPredict => "streamRawPredict",
            Self::GenerateContent => "generateContent",
            Self::StreamGenerateContent => "streamGenerateContent",
            Self::Predict => "predict",
        }
    }
}

/// Build the full upstream URL for one region attempt (spec §4.5 step 4:
/// "the dispatcher builds one URL per attempted region").
pub fn build(project_id: &str, region: &str, provider: Provider, canonical_model: &str, method: Method) -> String {
    let host_region = if region == "global" { "us-central1" } else { region };
    let publisher = match provider {
        Provider::Anthropic => "anthropic",
        Provider::Google | Provider::Imagen => "google",
    };

    let mut url = format!(
        "https://{host_region}-aiplatform.googleapis.com/v1/projects/{project_id}/locations/{region}/publishers/{publisher}/models/{canonical_model}:{method}",
        method = method.as_str(),
    );

    // Gemini's generateContent endpoint only emits newline-delimited JSON by
    // default; `alt=sse` asks it to frame each fragment as SSE so both
    // providers' streams can be consumed through the same eventsource
    // pipeline (spec §4.4 "Gemini streaming").
    if matches!(method, Method::StreamGenerateContent) {
        url.push_str("?alt=sse");
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_url_uses_the_anthropic_publisher() {
        let url = build("demo-project", "us-east5", Provider::Anthropic, "claude-sonnet-4-5@20250929", Method::RawPredict);
        assert_eq!(
            url,
            "https://us-east5-aiplatform.googleapis.com/v1/projects/demo-project/locations/us-east5/publishers/anthropic/models/claude-sonnet-4-5@20250929:rawPredict"
        );
    }

    #[test]
    fn global_region_still_binds_a_concrete_host() {
        let url = build("demo-project", "global", Provider::Google, "gemini-2.5-pro", Method::GenerateContent);
        assert!(url.starts_with("https://us-central1-aiplatform.googleapis.com/"));
        assert!(url.contains("/locations/global/"));
    }

    #[test]
    fn imagen_uses_the_google_publisher_and_predict_method() {
        let url = build("demo-project", "us-central1", Provider::Imagen, "imagen-4.0-generate-001", Method::Predict);
        assert!(url.ends_with(":predict"));
        assert!(url.contains("/publishers/google/"));
    }
}
