//! Photo grading through an OpenAI-compatible vision model.
//!
//! We call chat.completions once per photo and request a strict JSON object
//! `{"isCorrect": bool, "feedback": string}`. Calls are instrumented and log the
//! model, latency and response sizes (never the image or the feedback text).
//!
//! NOTE: the API key is never logged.

use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::error::GradingError;
use crate::util::{fill_template, trunc_for_log};

const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;
const ACCEPTED_MIME: &[&str] = &["image/png", "image/jpeg", "image/webp", "image/gif"];

/// A validated, still base64-encoded image.
#[derive(Clone, Debug)]
pub struct PhotoPayload {
  pub mime: String,
  pub base64: String,
  pub decoded_len: usize,
}

impl PhotoPayload {
  /// Accepts raw base64 or a `data:<mime>;base64,` URI.
  pub fn from_base64(data: &str, mime: &str) -> Result<Self, GradingError> {
    let mime = mime.trim().to_ascii_lowercase();
    if !ACCEPTED_MIME.contains(&mime.as_str()) {
      return Err(GradingError::InvalidImage(format!("unsupported type '{}'", mime)));
    }
    let data = data.trim();
    let data = match data.split_once(";base64,") {
      Some((prefix, rest)) if prefix.starts_with("data:") => rest,
      _ => data,
    };
    let bytes = STANDARD
      .decode(data)
      .map_err(|e| GradingError::InvalidImage(format!("not base64: {}", e)))?;
    if bytes.is_empty() {
      return Err(GradingError::InvalidImage("empty image".into()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
      return Err(GradingError::InvalidImage(format!("{} bytes exceeds the limit", bytes.len())));
    }
    Ok(Self { mime, base64: data.to_string(), decoded_len: bytes.len() })
  }

  fn data_uri(&self) -> String {
    format!("data:{};base64,{}", self.mime, self.base64)
  }
}

/// The oracle's judgment. Accepted as-is.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
  pub is_correct: bool,
  pub feedback: String,
  #[serde(default)]
  pub correct_answer: Option<String>,
}

#[derive(Clone)]
pub struct Grader {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub vision_model: String,
}

impl Grader {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let vision_model =
      std::env::var("OPENAI_VISION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(45))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, vision_model })
  }

  /// Ask the model whether the handwritten solution in `photo` solves `question`.
  #[instrument(level = "info", skip(self, prompts, question, photo),
               fields(model = %self.vision_model, question_len = question.len(), image_bytes = photo.decoded_len))]
  pub async fn grade_photo(
    &self,
    prompts: &Prompts,
    question: &str,
    photo: &PhotoPayload,
  ) -> Result<Verdict, GradingError> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let user_text = fill_template(&prompts.grading_user_template, &[("question", question)]);
    let req = ChatCompletionRequest {
      model: self.vision_model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: MessageContent::Text(prompts.grading_system.clone()) },
        ChatMessageReq {
          role: "user".into(),
          content: MessageContent::Parts(vec![
            ContentPart::Text { text: user_text },
            ContentPart::ImageUrl { image_url: ImageUrl { url: photo.data_uri() } },
          ]),
        },
      ],
      temperature: 0.2,
      response_format: ResponseFormat { r#type: "json_object".into() },
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "mathe-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| GradingError::Transport(e.to_string()))?;

    let status = res.status();
    let body = res.text().await.map_err(|e| GradingError::Transport(e.to_string()))?;
    let elapsed = start.elapsed();

    if !status.is_success() {
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      error!(?elapsed, status = status.as_u16(), "Grading call failed");
      return Err(GradingError::Http { status: status.as_u16(), message });
    }

    let verdict = parse_completion(&body);
    match &verdict {
      Ok(v) => info!(?elapsed, is_correct = v.is_correct, body_len = body.len(), "Grading response received"),
      Err(e) => error!(?elapsed, error = %e, body_len = body.len(), "Grading response unusable"),
    }
    verdict
  }
}

/// Interpret a chat.completions body. Blocked and truncated generations are
/// reported as such rather than as a wrong answer.
pub fn parse_completion(body: &str) -> Result<Verdict, GradingError> {
  let body: ChatCompletionResponse = serde_json::from_str(body)
    .map_err(|e| GradingError::Malformed(format!("completion body: {}", e)))?;
  if let Some(usage) = &body.usage {
    info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
  }

  let choice = body.choices.into_iter().next()
    .ok_or_else(|| GradingError::Malformed("'choices' array is missing or empty".into()))?;

  if let Some(refusal) = choice.message.refusal.filter(|r| !r.trim().is_empty()) {
    return Err(GradingError::Blocked(trunc_for_log(&refusal, 120)));
  }
  match choice.finish_reason.as_deref() {
    None | Some("stop") => {}
    Some("content_filter") => return Err(GradingError::Blocked("content_filter".into())),
    Some(other) => return Err(GradingError::Incomplete(other.to_string())),
  }

  let text = choice.message.content.unwrap_or_default();
  if text.trim().is_empty() {
    return Err(GradingError::EmptyResponse);
  }
  serde_json::from_str::<Verdict>(text.trim())
    .map_err(|e| GradingError::Malformed(format!("verdict JSON: {}", e)))
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  response_format: ResponseFormat,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: MessageContent }
#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
  Text(String),
  Parts(Vec<ContentPart>),
}
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
  Text { text: String },
  ImageUrl { image_url: ImageUrl },
}
#[derive(Serialize)]
struct ImageUrl { url: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)] choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessageResp,
  #[serde(default)] finish_reason: Option<String>,
}
#[derive(Deserialize)]
struct ChatMessageResp {
  #[serde(default)] content: Option<String>,
  #[serde(default)] refusal: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
