//! Vertex AI express-mode endpoints. Every URL carries the API key as the
//! `key` query parameter.

pub const GLOBAL_LOCATION: &str = "global";
pub const DISCOVERY_MODEL: &str = "gemini-1.0-pro";
pub const DISCOVERY_BODY: &str = r#"{"contents":[]}"#;

fn regional_host(location: &str) -> String {
    if location == GLOBAL_LOCATION {
        "aiplatform.googleapis.com".to_string()
    } else {
        format!("{location}-aiplatform.googleapis.com")
    }
}

/// `generateContent` or `streamGenerateContent` on the regional v1beta1 API.
pub fn generate_content_url(
    project: &str,
    location: &str,
    model: &str,
    api_key: &str,
    stream: bool,
) -> String {
    let action = if stream {
        "streamGenerateContent"
    } else {
        "generateContent"
    };
    let mut url = format!(
        "https://{}/v1beta1/projects/{project}/locations/{location}/publishers/google/models/{model}:{action}?key={}",
        regional_host(location),
        urlencoding::encode(api_key)
    );
    if stream {
        url.push_str("&alt=sse");
    }
    url
}

/// The OpenAI-compatible chat completions endpoint.
pub fn openai_chat_completions_url(project: &str, location: &str, api_key: &str) -> String {
    format!(
        "https://aiplatform.googleapis.com/v1beta1/projects/{project}/locations/{location}/endpoints/openapi/chat/completions?key={}",
        urlencoding::encode(api_key)
    )
}

/// Location used for native passthrough. Newer model families are only
/// served from the global endpoint.
pub fn passthrough_location<'a>(model: &str, configured: &'a str) -> &'a str {
    if model.contains("gemini-2.5") || model.contains("gemini-3") {
        GLOBAL_LOCATION
    } else {
        configured
    }
}

/// Native Gemini passthrough on the v1 API.
pub fn gemini_passthrough_url(
    project: &str,
    location: &str,
    model: &str,
    action: &str,
    api_key: &str,
) -> String {
    let location = passthrough_location(model, location);
    let mut url = format!(
        "https://aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:{action}?key={}",
        urlencoding::encode(api_key)
    );
    if action == "streamGenerateContent" {
        url.push_str("&alt=sse");
    }
    url
}

/// Deliberately invalid request whose error message names the key's project.
pub fn discovery_url(location: &str, api_key: &str) -> String {
    format!(
        "https://{}/v1beta1/projects/unknown/locations/{location}/publishers/google/models/{DISCOVERY_MODEL}:generateContent?key={}",
        regional_host(location),
        urlencoding::encode(api_key)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_generate_url_requests_sse() {
        assert_eq!(
            generate_content_url("p1", "us-central1", "gemini-2.0-flash", "k", true),
            "https://us-central1-aiplatform.googleapis.com/v1beta1/projects/p1/locations/us-central1/publishers/google/models/gemini-2.0-flash:streamGenerateContent?key=k&alt=sse"
        );
        assert!(
            generate_content_url("p1", "global", "m", "k", false)
                .starts_with("https://aiplatform.googleapis.com/v1beta1/projects/p1/locations/global/")
        );
    }

    #[test]
    fn passthrough_forces_global_for_new_models() {
        assert_eq!(passthrough_location("gemini-2.5-pro", "us-east5"), "global");
        assert_eq!(passthrough_location("gemini-3-pro-preview", "us-east5"), "global");
        assert_eq!(passthrough_location("gemini-2.0-flash", "us-east5"), "us-east5");
        let url = gemini_passthrough_url("p", "europe-west4", "gemini-2.5-flash", "streamGenerateContent", "k");
        assert!(url.contains("/locations/global/"));
        assert!(url.ends_with("?key=k&alt=sse"));
    }

    #[test]
    fn keys_are_query_encoded() {
        let url = openai_chat_completions_url("p", "global", "a+b/c");
        assert!(url.ends_with("?key=a%2Bb%2Fc"));
        assert!(discovery_url("us-central1", "k").contains("/projects/unknown/"));
    }
}
