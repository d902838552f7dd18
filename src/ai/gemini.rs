use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{EditOutcome, EditService};
use crate::config::GeminiConfig;

pub struct GeminiService {
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiService {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: Client::new(),
        }
    }

    /// Build from config, resolving the API key (config value first, then the
    /// `GEMINI_API_KEY` environment variable).
    pub fn from_config(config: &GeminiConfig) -> Result<Self> {
        let api_key = config.resolved_api_key().context(
            "no Gemini API key configured; set gemini.api_key in config.json \
             or the GEMINI_API_KEY environment variable",
        )?;
        Ok(Self::new(api_key, config.model.clone()))
    }
}

#[async_trait::async_trait]
impl EditService for GeminiService {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn edit(
        &self,
        image_base64: &str,
        mime_type: &str,
        prompt: &str,
    ) -> Result<EditOutcome> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        let body = GenerateRequest::for_edit(image_base64, mime_type, prompt);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("failed to read Gemini response")?;

        if !status.is_success() {
            anyhow::bail!("Gemini API error ({status}): {text}");
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).context("failed to parse Gemini response JSON")?;

        parsed.into_outcome()
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    InlineData { inline_data: InlineData },
    Text { text: String },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

impl GenerateRequest {
    fn for_edit(image_base64: &str, mime_type: &str, prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: image_base64.to_string(),
                        },
                    },
                    RequestPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    inline_data: Option<InlineData>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

impl GenerateResponse {
    /// Unpack the first candidate into an [`EditOutcome`].
    ///
    /// A blocked prompt or a safety finish reason is an error; a candidate
    /// without an image part is not — the caller decides what an absent image
    /// means.
    fn into_outcome(self) -> Result<EditOutcome> {
        if let Some(feedback) = self.prompt_feedback {
            if let Some(reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .unwrap_or_else(|| format!("prompt blocked: {reason}"));
                anyhow::bail!("{msg}");
            }
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .context("no candidates in Gemini response")?;

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if matches!(
                reason,
                "SAFETY"
                    | "IMAGE_SAFETY"
                    | "IMAGE_PROHIBITED_CONTENT"
                    | "RECITATION"
                    | "PROHIBITED_CONTENT"
                    | "BLOCKLIST"
            ) {
                anyhow::bail!("content blocked by safety filter: {reason}");
            }
        }

        let mut outcome = EditOutcome::default();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if outcome.image.is_none() {
                if let Some(inline) = part.inline_data {
                    outcome.image = Some(inline.data);
                    continue;
                }
            }
            if outcome.text.is_none() {
                if let Some(text) = part.text {
                    outcome.text = Some(text);
                }
            }
        }

        Ok(outcome)
    }
}
