//! Vision providers — pluggable trait + factory.
//!
//! Both backends receive a PNG screenshot and the fixed instruction prompt,
//! and must come back with the same JSON shape. Everything past the HTTP
//! call is shared here: fence stripping, parsing, validation.

pub mod bedrock;
pub mod gemini;
pub mod sigv4;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::credentials::CredentialStore;

/// The external AI service used to analyze a captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Bedrock,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Bedrock => "bedrock",
        }
    }

    /// The one you'd toggle to.
    pub fn other(&self) -> Provider {
        match self {
            Provider::Gemini => Provider::Bedrock,
            Provider::Bedrock => Provider::Gemini,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Analysis result ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    /// Question number as printed in the image ("13", "14", ...).
    pub number: String,
    pub question: String,
    /// The selected answer ("A", "B", "True", ...).
    pub answer: String,
}

#[derive(Debug, Clone)]
pub struct QuizResult {
    pub questions: Vec<QuizQuestion>,
    /// Question count the provider claims to have seen in the image.
    pub total_questions: usize,
    pub timestamp: DateTime<Utc>,
}

impl QuizResult {
    /// Compact popup text: question number, first few words, the answer.
    pub fn format_display(&self) -> String {
        let mut lines = Vec::new();
        for q in &self.questions {
            let words: Vec<&str> = q.question.split_whitespace().collect();
            let short = if words.len() > 7 {
                format!("{}...", words[..7].join(" "))
            } else {
                words.join(" ")
            };
            lines.push(format!("Question {}: {}", q.number, short));
            lines.push(format!("-> {}", q.answer));
        }
        lines.join("\n").trim().to_string()
    }
}

// ── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// The image held no recognizable quiz questions. Informational, not a failure.
    #[error("no quiz questions found in the image")]
    NoQuestions,
    #[error("provider request failed: {0}")]
    Api(String),
    #[error("provider response not in the expected format: {0}")]
    Parse(String),
}

/// Fold a ureq error into the Api variant, keeping the response body when
/// the server sent one (quota and auth errors live there).
pub(crate) fn api_error(err: ureq::Error) -> AnalyzeError {
    match err {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            let body = body.trim();
            if body.is_empty() {
                AnalyzeError::Api(format!("HTTP {code}"))
            } else {
                AnalyzeError::Api(format!("HTTP {code}: {body}"))
            }
        }
        ureq::Error::Transport(t) => AnalyzeError::Api(t.to_string()),
    }
}

// ── Trait + factory ────────────────────────────────────────────────────────

/// A backend that turns a screenshot into quiz answers.
pub trait QuizAnalyzer: Send + Sync {
    /// Analyze PNG image bytes with the fixed instruction prompt.
    fn analyze(&self, png: &[u8]) -> Result<QuizResult, AnalyzeError>;

    /// One minimal text-only request to confirm the credentials work.
    fn test_connection(&self) -> anyhow::Result<()>;

    /// Lowercase provider name for logs and history records.
    fn name(&self) -> &str;
}

/// Create the analyzer for `provider` from config + stored credentials.
pub fn create_analyzer(
    provider: Provider,
    cfg: &ProviderConfig,
    creds: &CredentialStore,
) -> anyhow::Result<Box<dyn QuizAnalyzer>> {
    let timeout = std::time::Duration::from_secs(cfg.timeout_secs);
    match provider {
        Provider::Gemini => {
            let key = creds
                .gemini_key()
                .ok_or_else(|| anyhow::anyhow!("no Gemini API key configured"))?;
            Ok(Box::new(gemini::GeminiClient::new(
                key,
                cfg.gemini_model.clone(),
                timeout,
            )))
        }
        Provider::Bedrock => {
            let bedrock_creds = creds
                .bedrock()
                .ok_or_else(|| anyhow::anyhow!("no AWS Bedrock credentials configured"))?;
            Ok(Box::new(bedrock::BedrockClient::new(
                bedrock_creds,
                cfg.bedrock_model.clone(),
                timeout,
            )))
        }
    }
}

// ── Shared prompt + parsing ────────────────────────────────────────────────

/// The fixed instruction prompt sent with every capture, for both providers.
pub const ANALYSIS_PROMPT: &str = r#"You are an assistant that answers multiple-choice questions. Analyze this image and:

IMPORTANT: ONLY identify REAL multiple-choice questions:
- Clear format: "Question 1:", "Question 2:", "Q1:", "13.", etc.
- Have answer choices: A, B, C, D or True/False
- Are knowledge-testing questions, exams, quizzes

DO NOT identify:
- Code, programming commands
- Text editor, terminal, console
- Task lists, notes
- Regular text that is not quiz questions

Keep the question numbers exactly as printed in the image. If there is no
clear numbering, number from 1.

If NO real quiz questions found, return:
{
  "questions": []
}

If questions found, return JSON:
{
  "questions": [
    {
      "number": "1",
      "question": "Question content",
      "answer": "A"
    }
  ]
}

Return only JSON, no other text."#;

/// Strip a leading/trailing markdown code fence from a model reply.
fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// Parse a model reply into a QuizResult.
///
/// Accepts the canonical `number`/`question`/`answer` keys and the older
/// `question_number`/`correct_answer` spelling some models echo back.
/// Entries missing a field are skipped with a warning; an empty list is
/// `NoQuestions`, not a parse error.
pub fn parse_questions(text: &str) -> Result<QuizResult, AnalyzeError> {
    let cleaned = strip_code_fences(text);
    log::debug!("Provider reply (first 500 chars): {:.500}", cleaned);

    let data: serde_json::Value = serde_json::from_str(cleaned)
        .map_err(|e| AnalyzeError::Parse(format!("response is not valid JSON: {e}")))?;

    let raw = data
        .get("questions")
        .ok_or_else(|| AnalyzeError::Parse("response missing 'questions' field".into()))?
        .as_array()
        .ok_or_else(|| AnalyzeError::Parse("'questions' field must be an array".into()))?;

    let mut questions = Vec::new();
    for (idx, entry) in raw.iter().enumerate() {
        let number = entry
            .get("number")
            .or_else(|| entry.get("question_number"))
            .map(json_value_to_string)
            .unwrap_or_else(|| (idx + 1).to_string());
        let question = entry.get("question").and_then(|v| v.as_str());
        let answer = entry
            .get("answer")
            .or_else(|| entry.get("correct_answer"))
            .and_then(|v| v.as_str());

        match (question, answer) {
            (Some(q), Some(a)) if !a.trim().is_empty() => questions.push(QuizQuestion {
                number,
                question: q.to_string(),
                answer: a.trim().to_string(),
            }),
            _ => log::warn!("Skipping question entry missing fields: {entry}"),
        }
    }

    if questions.is_empty() {
        return Err(AnalyzeError::NoQuestions);
    }

    let total_questions = data
        .get("total_questions")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(questions.len());

    log::info!("Parsed {} questions from provider reply", questions.len());
    Ok(QuizResult {
        questions,
        total_questions,
        timestamp: Utc::now(),
    })
}

/// Numbers arrive as JSON strings or integers depending on the model's mood.
fn json_value_to_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
