//! Google Gemini backend — generateContent with an inline PNG part.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::{api_error, parse_questions, AnalyzeError, QuizAnalyzer, QuizResult, ANALYSIS_PROMPT};
use crate::credentials::Secret;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    api_key: Secret,
    model: String,
    agent: ureq::Agent,
}

impl GeminiClient {
    pub fn new(api_key: Secret, model: String, timeout: Duration) -> Self {
        log::info!("GeminiClient: model {model}");
        Self {
            api_key,
            model,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn generate(&self, body: &serde_json::Value) -> Result<serde_json::Value, AnalyzeError> {
        let url = format!(
            "{API_BASE}/{}:generateContent?key={}",
            self.model,
            self.api_key.as_str()
        );
        self.agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(body)
            .map_err(api_error)?
            .into_json()
            .map_err(|e| AnalyzeError::Parse(format!("invalid JSON from Gemini: {e}")))
    }
}

/// Pull the first candidate's text out of a generateContent response.
fn response_text(resp: &serde_json::Value) -> Result<&str, AnalyzeError> {
    resp["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .ok_or_else(|| AnalyzeError::Parse("Gemini response has no text part".into()))
}

impl QuizAnalyzer for GeminiClient {
    fn analyze(&self, png: &[u8]) -> Result<QuizResult, AnalyzeError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [
                { "text": ANALYSIS_PROMPT },
                { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(png) } }
            ]}]
        });

        log::info!("Sending {} byte screenshot to Gemini", png.len());
        let started = std::time::Instant::now();
        let resp = self.generate(&body)?;
        log::info!("Gemini replied in {:.1}s", started.elapsed().as_secs_f64());

        parse_questions(response_text(&resp)?)
    }

    fn test_connection(&self) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": "Reply with the single word OK." }] }],
            "generationConfig": { "maxOutputTokens": 10 }
        });
        let resp = self
            .generate(&body)
            .map_err(|e| anyhow::anyhow!("Gemini connectivity test failed: {e}"))?;
        let text = response_text(&resp)
            .map_err(|e| anyhow::anyhow!("Gemini connectivity test failed: {e}"))?;
        if text.trim().is_empty() {
            anyhow::bail!("Gemini returned an empty response");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
