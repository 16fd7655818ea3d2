//! Outbound text adapters: webhook notifier and diff explainer.
//!
//! Both are black-box text-in/text-out services; the core never depends on
//! their internals. Endpoints and keys are injected at construction, scoped
//! to a single run.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::NotifyError;
use crate::report::ConfigChanges;

/// Sends a rendered report's text to a destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text`. Failures never abort a run; callers log and move on.
    async fn notify(&self, text: &str) -> Result<(), NotifyError>;
}

/// Feishu bot webhook notifier.
pub struct FeishuNotifier {
    webhook_url: String,
    client: Client,
}

impl FeishuNotifier {
    /// Create a notifier posting to the given bot webhook URL.
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for FeishuNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let payload = json!({
            "msg_type": "text",
            "content": { "text": text },
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
            });
        }

        debug!("webhook message delivered");
        Ok(())
    }
}

/// Explains configuration changes via an OpenAI-compatible
/// chat-completions endpoint.
pub struct ChatExplainer {
    base_url: String,
    api_key: SecretString,
    model: String,
    client: Client,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl ChatExplainer {
    /// Create an explainer against `base_url` (e.g. an OpenRouter or OpenAI
    /// endpoint, without the trailing `/chat/completions`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            client: Client::new(),
        }
    }

    /// Ask the model to explain the extracted changes, returning free-form
    /// explanatory text.
    pub async fn explain(&self, changes: &ConfigChanges) -> Result<String, NotifyError> {
        let mut prompt = String::from("仅仅解释以下网络设备配置变化的含义,不需要其他：\n\n");
        if !changes.running_changes.is_empty() {
            prompt.push_str("运行配置变化:\n");
            prompt.push_str(&changes.running_changes);
            prompt.push_str("\n\n");
        }
        if !changes.startup_changes.is_empty() {
            prompt.push_str("启动配置变化:\n");
            prompt.push_str(&changes.startup_changes);
        }

        let payload = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| NotifyError::UnexpectedResponse {
                message: "empty choices array".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_response_deserializes() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"新增了 NTP 服务器。"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "新增了 NTP 服务器。");
    }

    #[test]
    fn test_chat_response_empty_choices() {
        let body = r#"{"choices":[]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices.is_empty());
    }
}
