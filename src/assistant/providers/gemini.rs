//! Gemini `generateContent` provider
//!
//! Non-streaming; one POST per request. HTTP failures are mapped onto the
//! `AssistError` classes by `classify_api_error`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::assistant::prompts::{system_prompt, user_prompt};
use crate::assistant::provider::{AnswerProvider, AnswerRequest, AssistError};
use crate::config::AssistantConfig;

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Map an HTTP error response onto an error class
pub fn classify_api_error(status: u16, body: &str) -> AssistError {
    let (message, api_status) = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => (parsed.error.message, parsed.error.status),
        Err(_) => (body.trim().to_string(), String::new()),
    };
    let lowered = message.to_lowercase();

    match status {
        401 | 403 => AssistError::InvalidCredential,
        400 if lowered.contains("api key") => AssistError::InvalidCredential,
        429 if lowered.contains("quota") => AssistError::QuotaExceeded,
        429 => AssistError::RateLimited,
        _ if api_status == "RESOURCE_EXHAUSTED" => AssistError::QuotaExceeded,
        _ if message.is_empty() => AssistError::Unknown(format!("HTTP {}", status)),
        _ => AssistError::Unknown(message),
    }
}

/// Extract the generated text from a successful response body
fn parse_response(body: &str) -> Result<String, AssistError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| AssistError::Unknown(format!("Invalid response: {}", e)))?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        log::warn!("Prompt blocked by the service: {}", reason);
        return Err(AssistError::ContentFiltered);
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AssistError::Unknown("Response contained no candidates".to_string()))?;

    let text = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason.as_deref() {
            Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") => {
                Err(AssistError::ContentFiltered)
            }
            _ => Err(AssistError::Unknown("Empty response".to_string())),
        };
    }
    Ok(text.trim().to_string())
}

pub struct GeminiProvider {
    config: AssistantConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: AssistantConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_body(&self, request: &AnswerRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: system_prompt(request.kind, &request.context) }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: user_prompt(request) }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }

    async fn call(&self, api_key: &str, request: &AnswerRequest) -> Result<String, AssistError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| AssistError::Unknown(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AssistError::Unknown(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(classify_api_error(status.as_u16(), &body));
        }
        parse_response(&body)
    }
}

#[async_trait]
impl AnswerProvider for GeminiProvider {
    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(
        &self,
        request: &AnswerRequest,
        cancel: CancellationToken,
    ) -> Result<String, AssistError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AssistError::InvalidCredential)?;

        tokio::select! {
            _ = cancel.cancelled() => Err(AssistError::Cancelled),
            result = self.call(api_key, request) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::{AssistKind, MeetingContext};
    use crate::speech::TranscriptEntry;

    #[test]
    fn test_classify_credential_errors() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(classify_api_error(400, body), AssistError::InvalidCredential);
        assert_eq!(classify_api_error(403, "forbidden"), AssistError::InvalidCredential);
    }

    #[test]
    fn test_classify_quota_vs_rate_limit() {
        let quota = r#"{"error":{"code":429,"message":"You exceeded your current quota","status":"RESOURCE_EXHAUSTED"}}"#;
        let rate = r#"{"error":{"code":429,"message":"Too many requests","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(classify_api_error(429, quota), AssistError::QuotaExceeded);
        assert_eq!(classify_api_error(429, rate), AssistError::RateLimited);
    }

    #[test]
    fn test_classify_unknown_keeps_message() {
        let body = r#"{"error":{"code":500,"message":"Internal error","status":"INTERNAL"}}"#;
        assert_eq!(classify_api_error(500, body), AssistError::Unknown("Internal error".to_string()));
        assert_eq!(classify_api_error(502, ""), AssistError::Unknown("HTTP 502".to_string()));
    }

    #[test]
    fn test_parse_joins_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello "},{"text":"world"}]},"finishReason":"STOP"}]}"#;
        assert_eq!(parse_response(body).unwrap(), "Hello world");
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert_eq!(parse_response(body).unwrap_err(), AssistError::ContentFiltered);

        let body = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        assert_eq!(parse_response(body).unwrap_err(), AssistError::ContentFiltered);
    }

    #[test]
    fn test_request_body_shape() {
        let provider = GeminiProvider::new(AssistantConfig::default()).unwrap();
        let request = AnswerRequest {
            kind: AssistKind::Answer,
            context: MeetingContext::default(),
            transcript: vec![TranscriptEntry::manual("Why Rust?")],
        };
        let body = serde_json::to_value(provider.build_body(&request)).unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Interviewer's question: Why Rust?");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert!(provider.endpoint().ends_with("/models/gemini-1.5-flash:generateContent"));
    }

    #[tokio::test]
    async fn test_missing_key_is_invalid_credential() {
        let provider = GeminiProvider::new(AssistantConfig::default()).unwrap();
        let request = AnswerRequest {
            kind: AssistKind::Answer,
            context: MeetingContext::default(),
            transcript: vec![TranscriptEntry::manual("q")],
        };
        let err = provider.generate(&request, CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, AssistError::InvalidCredential);
    }
}
