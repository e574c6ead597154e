//! OpenAI-compatible chat completion backend

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{parse_intent, Assistant, Intent};
use crate::config::AssistantConfig;
use crate::error::{AppError, AppResult};

const CLASSIFY_PROMPT: &str = r#"You route requests for an office assistant.
Answer with one JSON object {"intent": <name>, "args": <object>} where <name> is one of:
- "todo_add": args {"title", "deadlineAt" (unix seconds), "desc", "executeIds" (user ids)}
- "todo_find": args {"id", "startTime", "endTime"}, all optional
- "approval_add": args {"type", "reason", "payload"}
- "approval_find": args {"id", "type" (1 submitted, 2 to audit)}, all optional
- "chat_log": no args
- "reply": args is the plain text answer
Current unix time: "#;

const SUMMARIZE_PROMPT: &str =
    "Summarize the following chat log. Each line is `name(id): message`.";

pub struct OpenAiAssistant {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiAssistant {
    pub fn new(config: &AssistantConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, system: &str, user: &str) -> AppResult<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
                "temperature": 0,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "assistant returned {}: {}",
                status, body
            )));
        }

        let result: Value = response.json().await?;
        completion_text(&result)
    }
}

/// Content of the first choice
fn completion_text(result: &Value) -> AppResult<String> {
    result["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AppError::Upstream("assistant response has no content".to_string()))
}

#[async_trait]
impl Assistant for OpenAiAssistant {
    async fn classify(&self, prompt: &str, now: i64) -> AppResult<Intent> {
        let system = format!("{}{}", CLASSIFY_PROMPT, now);
        let output = self.complete(&system, prompt).await?;
        Ok(parse_intent(&output))
    }

    async fn summarize(&self, transcript: &str) -> AppResult<String> {
        self.complete(SUMMARIZE_PROMPT, transcript).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_text() {
        let ok = json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]});
        assert_eq!(completion_text(&ok).unwrap(), "hi");

        let empty = json!({"choices": []});
        assert!(matches!(completion_text(&empty), Err(AppError::Upstream(_))));
    }

    #[test]
    fn test_base_url_normalized() {
        let assistant = OpenAiAssistant::new(&AssistantConfig {
            url: "http://localhost:8000/v1/".to_string(),
            api_key: String::new(),
            model: "m".to_string(),
        });
        assert_eq!(assistant.base_url, "http://localhost:8000/v1");
    }
}
