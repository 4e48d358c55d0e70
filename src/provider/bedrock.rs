//! AWS Bedrock backend — Claude via InvokeModel, SigV4-signed.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::sigv4::{self, SigningParams};
use super::{api_error, parse_questions, AnalyzeError, QuizAnalyzer, QuizResult, ANALYSIS_PROMPT};
use crate::credentials::BedrockCredentials;

pub struct BedrockClient {
    creds: BedrockCredentials,
    model_id: String,
    agent: ureq::Agent,
}

impl BedrockClient {
    pub fn new(creds: BedrockCredentials, model_id: String, timeout: Duration) -> Self {
        log::info!(
            "BedrockClient: model {model_id} (region {})",
            creds.region
        );
        Self {
            creds,
            model_id,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn host(&self) -> String {
        format!("bedrock-runtime.{}.amazonaws.com", self.creds.region)
    }

    fn invoke(&self, body: &serde_json::Value) -> Result<serde_json::Value, AnalyzeError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| AnalyzeError::Api(format!("failed to encode request body: {e}")))?;

        let host = self.host();
        let path = format!("/model/{}/invoke", sigv4::uri_encode_segment(&self.model_id));
        let params = SigningParams {
            access_key_id: self.creds.access_key_id.as_str(),
            secret_access_key: self.creds.secret_access_key.as_str(),
            session_token: self.creds.session_token.as_ref().map(|t| t.as_str()),
            region: &self.creds.region,
            service: "bedrock",
        };
        let signed = sigv4::sign_request(&params, &host, &path, &payload);

        let mut request = self
            .agent
            .post(&format!("https://{host}{path}"))
            .set("Content-Type", sigv4::CONTENT_TYPE)
            .set("X-Amz-Date", &signed.amz_date)
            .set("Authorization", &signed.authorization);
        if let Some(token) = &self.creds.session_token {
            request = request.set("X-Amz-Security-Token", token.as_str());
        }

        request
            .send_bytes(&payload)
            .map_err(api_error)?
            .into_json()
            .map_err(|e| AnalyzeError::Parse(format!("invalid JSON from Bedrock: {e}")))
    }
}

/// Build the Anthropic messages body for one user turn.
fn messages_body(model_max_tokens: u32, content: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "anthropic_version": "bedrock-2023-05-31",
        "max_tokens": model_max_tokens,
        "temperature": 0.1,
        "messages": [{ "role": "user", "content": content }]
    })
}

/// Pull the first text block out of a Claude response.
fn response_text(resp: &serde_json::Value) -> Result<&str, AnalyzeError> {
    resp["content"][0]["text"]
        .as_str()
        .ok_or_else(|| AnalyzeError::Parse("Bedrock response has no text content".into()))
}

impl QuizAnalyzer for BedrockClient {
    fn analyze(&self, png: &[u8]) -> Result<QuizResult, AnalyzeError> {
        let body = messages_body(
            4096,
            serde_json::json!([
                {
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": "image/png",
                        "data": BASE64.encode(png)
                    }
                },
                { "type": "text", "text": ANALYSIS_PROMPT }
            ]),
        );

        log::info!("Sending {} byte screenshot to Bedrock", png.len());
        let started = std::time::Instant::now();
        let resp = self.invoke(&body)?;
        log::info!("Bedrock replied in {:.1}s", started.elapsed().as_secs_f64());

        parse_questions(response_text(&resp)?)
    }

    fn test_connection(&self) -> anyhow::Result<()> {
        let body = messages_body(
            10,
            serde_json::json!([{ "type": "text", "text": "Reply with the single word OK." }]),
        );
        let resp = self
            .invoke(&body)
            .map_err(|e| anyhow::anyhow!("Bedrock connectivity test failed: {e}"))?;
        let text = response_text(&resp)
            .map_err(|e| anyhow::anyhow!("Bedrock connectivity test failed: {e}"))?;
        if text.trim().is_empty() {
            anyhow::bail!("Bedrock returned an empty response");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "bedrock"
    }
}
