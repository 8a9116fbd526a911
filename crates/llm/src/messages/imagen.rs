//! Imagen `predict` wire types (spec §4.4 "OpenAI images.generations → Imagen").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest {
    pub instances: Vec<Instance>,
    pub parameters: Parameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Parameters {
    pub sample_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<&'static str>,
    /// Always sent at the most permissive documented level Vertex still
    /// honors (spec §4.4 "OpenAI images.generations → Imagen"); this proxy
    /// exposes no control over it.
    #[serde(rename = "safetySetting")]
    pub safety_setting: &'static str,
}

pub const DEFAULT_SAFETY_SETTING: &str = "block_medium_and_above";

#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub bytes_base64_encoded: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Map an OpenAI `size` string (e.g. `"1024x1792"`) onto the closest Imagen
/// aspect ratio (spec §4.4 "size → aspect_ratio derivation"). Unrecognized or
/// absent sizes fall back to square, matching Imagen's own default.
pub fn aspect_ratio_from_size(size: Option<&str>) -> &'static str {
    let Some(size) = size else { return "1:1" };
    let Some((w, h)) = size.split_once('x') else { return "1:1" };
    let (Ok(w), Ok(h)) = (w.parse::<u32>(), h.parse::<u32>()) else {
        return "1:1";
    };

    if w == h {
        "1:1"
    } else if w * 3 == h * 4 {
        "3:4"
    } else if h * 3 == w * 4 {
        "4:3"
    } else if w * 9 == h * 16 {
        "9:16"
    } else if h * 9 == w * 16 {
        "16:9"
    } else if w > h {
        "16:9"
    } else {
        "9:16"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_size_maps_to_1_1() {
        assert_eq!(aspect_ratio_from_size(Some("1024x1024")), "1:1");
    }

    #[test]
    fn portrait_size_maps_to_9_16() {
        assert_eq!(aspect_ratio_from_size(Some("1024x1792")), "9:16");
    }

    #[test]
    fn landscape_size_maps_to_16_9() {
        assert_eq!(aspect_ratio_from_size(Some("1792x1024")), "16:9");
    }

    #[test]
    fn missing_size_defaults_to_square() {
        assert_eq!(aspect_ratio_from_size(None), "1:1");
    }
}
