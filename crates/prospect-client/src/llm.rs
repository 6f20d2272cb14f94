use std::time::Duration;

use prospect_core::error::AppError;
use prospect_core::models::QualityAssessment;
use prospect_core::scoring::{HeuristicScorer, assessment_schema, parse_assessment};
use prospect_core::traits::QualityScorer;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_SCORER_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SYSTEM_PROMPT: &str = "You are a B2B lead qualification analyst. Given a business name, an excerpt of its website and its contact email, rate how promising it is as a sales lead. Respond ONLY with JSON matching the requested schema: lead_score (0-100), wealth_signal (High, Medium or Low) and estimated_revenue (an annual revenue bucket such as \"$250k-$1M\", or \"Unknown\").";

/// OpenAI-compatible quality scorer.
///
/// Works with any OpenAI-compatible API, including:
/// - OpenAI directly (`https://api.openai.com/v1`)
/// - Gemini via compatibility layer (`https://generativelanguage.googleapis.com/v1beta/openai`)
///
/// The response is untrusted: it is validated and clamped by
/// [`parse_assessment`] before use.
#[derive(Clone)]
pub struct OpenAiScorer {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    system_prompt: String,
}

impl OpenAiScorer {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(api_key, model, base_url, DEFAULT_SCORER_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        let prompt = self.system_prompt.clone();
        Ok(Self::build(&self.api_key, &self.model, &self.base_url, timeout)?
            .with_system_prompt(prompt))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: timeout.as_secs(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }
}

// ---- OpenAI API types ----

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaWrapper,
}

#[derive(Serialize)]
struct JsonSchemaWrapper {
    name: &'static str,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn user_prompt(name: &str, excerpt: &str, email: Option<&str>) -> String {
    format!(
        "Business name: {name}\nContact email: {}\n\nWebsite excerpt:\n{}",
        email.unwrap_or("none found"),
        if excerpt.trim().is_empty() {
            "(no website text available)"
        } else {
            excerpt
        }
    )
}

impl QualityScorer for OpenAiScorer {
    async fn assess(
        &self,
        name: &str,
        excerpt: &str,
        email: Option<&str>,
    ) -> Result<QualityAssessment, AppError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: self.system_prompt.clone(),
                },
                Message {
                    role: "user",
                    content: user_prompt(name, excerpt, email),
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaWrapper {
                    name: "lead_assessment",
                    strict: true,
                    schema: assessment_schema().clone(),
                },
            },
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            if status_code == 429 {
                return Err(AppError::RateLimitExceeded);
            }

            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status_code}: {body}"));

            return Err(AppError::ScorerError {
                message,
                status_code,
                retryable: status_code >= 500,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::ParseError(format!("Failed to parse scorer response: {e}")))?;

        let content = chat_response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| AppError::ScorerError {
                message: "Empty response from scorer".into(),
                status_code: 200,
                retryable: false,
            })?;

        let value: serde_json::Value = serde_json::from_str(content).map_err(|e| {
            AppError::ParseError(format!("Scorer returned invalid JSON: {e}. Raw: {content}"))
        })?;
        parse_assessment(&value)
    }
}

/// The scorer chosen at configuration time.
#[derive(Clone)]
pub enum LeadScorer {
    OpenAi(OpenAiScorer),
    Heuristic(HeuristicScorer),
}

impl LeadScorer {
    /// The remote scorer when an API key is configured, else the offline one.
    pub fn from_options(
        api_key: Option<&str>,
        model: &str,
        base_url: Option<&str>,
    ) -> Result<Self, AppError> {
        match api_key.map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => Ok(Self::OpenAi(OpenAiScorer::with_base_url(
                key,
                model,
                base_url.unwrap_or(DEFAULT_BASE_URL),
            )?)),
            None => Ok(Self::Heuristic(HeuristicScorer)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            LeadScorer::OpenAi(scorer) => format!("openai ({})", scorer.model()),
            LeadScorer::Heuristic(_) => "heuristic".to_string(),
        }
    }
}

impl QualityScorer for LeadScorer {
    async fn assess(
        &self,
        name: &str,
        excerpt: &str,
        email: Option<&str>,
    ) -> Result<QualityAssessment, AppError> {
        match self {
            LeadScorer::OpenAi(scorer) => scorer.assess(name, excerpt, email).await,
            LeadScorer::Heuristic(scorer) => scorer.assess(name, excerpt, email).await,
        }
    }
}
