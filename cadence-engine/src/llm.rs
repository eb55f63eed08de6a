//! Chat-completion client for the generative selector.
//!
//! The capability is a narrow trait so tests can script replies and the
//! selector never knows which provider is behind it. Absence of a client is
//! a policy state, not an error, until the module-scoped path asks.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};

/// One conversation turn sent to the capability.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A request/response text-generation capability that must return a single
/// JSON object. Each call is one blocking attempt with no partial side
/// effects; implementations impose their own timeout.
pub trait ChatCapability: Send + Sync {
    fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String>;
}

/// OpenAI-style chat-completions client in JSON-object mode.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    async fn complete_async(&self, system: &str, turns: &[ChatTurn]) -> Result<String> {
        #[derive(Serialize)]
        struct Msg {
            role: String,
            content: String,
        }

        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            t: &'static str,
        }

        #[derive(Serialize)]
        struct Req {
            model: String,
            messages: Vec<Msg>,
            temperature: f32,
            response_format: ResponseFormat,
        }

        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }

        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
        }

        let mut messages = vec![Msg {
            role: "system".to_string(),
            content: system.to_string(),
        }];
        for t in turns {
            messages.push(Msg {
                role: t.role.clone(),
                content: t.content.clone(),
            });
        }

        let body = Req {
            model: self.model.clone(),
            messages,
            temperature: 0.4,
            response_format: ResponseFormat { t: "json_object" },
        };

        // A hung call must surface as a retryable failure, so the client
        // carries an explicit overall timeout.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .context("build http client")?;

        let resp = client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("chat completion request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("chat completion error: {status} {txt}");
        }

        let out: Resp = resp.json().await.context("parse chat completion response")?;
        let content = out
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content.trim().to_string())
    }
}

impl ChatCapability for OpenAiClient {
    fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String> {
        // Callers are often already inside a tokio runtime; a nested
        // Runtime::block_on would panic there.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(self.complete_async(system, turns)))
        } else {
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(self.complete_async(system, turns))
        }
    }
}
