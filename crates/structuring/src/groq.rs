//! Groq chat-completions structurer.

use async_trait::async_trait;
use serde_json::json;
use storyreel_core::story::StructuredStory;

use crate::error::StructuringError;
use crate::parse::{parse_structured_story, ChatCompletion};
use crate::StoryStructurer;

pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 2_000;

/// Instructions sent as the system message. The JSON shape here must match
/// [`StructuredStory`].
pub const SYSTEM_PROMPT: &str = r#"You are a creative director planning a short visual story for an image generator.
The user gives a general idea. Invent a narrative with clear progression and design up to the
requested number of scenes, keeping every primary character present and visually consistent in
each scene.

Celebrity handling:
- If the user names a real person, put the name ONLY in "character_reference".
- Never describe that person's face, body, hair, age or signature look.
- Describe composition, environment, lighting and mood instead.

Each scene's "action" must be a verb phrase with a target, e.g. "chases the cat across the lawn".
Each scene's "negative_prompt" must be specific to that scene: missing characters, cropped
subjects, background-only frames, low quality.

Respond with a single JSON object of this exact shape:
{
  "story_title": "title of the invented story",
  "visual_style": "overall aesthetic, e.g. cinematic realism",
  "character_concept": "summary of the characters",
  "character_name": "optional main character name",
  "scenes": [
    {
      "subject": "who or what is shown",
      "action": "what the subject does",
      "environment": "where it happens",
      "style": "shot type and composition",
      "lighting": "lighting and atmosphere",
      "mood": "emotional tone",
      "character_reference": null,
      "consistency_keywords": ["keyword", "keyword"],
      "negative_prompt": "things to avoid in this scene"
    }
  ]
}"#;

/// Settings for [`GroqStructurer`].
#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GroqConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var         | Default                          |
    /// |-----------------|----------------------------------|
    /// | `GROQ_API_KEY`  | (required)                       |
    /// | `GROQ_MODEL`    | `llama-3.1-8b-instant`           |
    /// | `GROQ_BASE_URL` | `https://api.groq.com/openai/v1` |
    pub fn from_env() -> Result<Self, StructuringError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StructuringError> {
        let api_key = lookup("GROQ_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| StructuringError::Configuration("GROQ_API_KEY must be set".into()))?;

        Ok(Self {
            api_key,
            model: lookup("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            base_url: lookup("GROQ_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
        })
    }
}

/// Structures prompts with a Groq-hosted chat model in JSON mode.
pub struct GroqStructurer {
    client: reqwest::Client,
    config: GroqConfig,
}

impl GroqStructurer {
    pub fn new(config: GroqConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Chat completion request body for one idea.
    pub fn request_body(&self, prompt: &str, max_scenes: u32) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_message(prompt, max_scenes) },
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            "response_format": { "type": "json_object" },
        })
    }
}

fn user_message(prompt: &str, max_scenes: u32) -> String {
    format!(
        "User idea:\n\"{prompt}\"\n\nMaximum number of scenes: {max_scenes}\n\n\
         Create a visual story inspired by this idea."
    )
}

#[async_trait]
impl StoryStructurer for GroqStructurer {
    async fn structure(
        &self,
        prompt: &str,
        max_scenes: u32,
    ) -> Result<StructuredStory, StructuringError> {
        tracing::debug!(model = %self.config.model, max_scenes, "Requesting story structure");

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(prompt, max_scenes))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StructuringError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| StructuringError::Malformed(e.to_string()))?;
        let story = parse_structured_story(&completion.into_content()?)?;

        tracing::debug!(
            title = %story.story_title,
            scenes = story.scenes.len(),
            "Story structured",
        );
        Ok(story)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use assert_matches::assert_matches;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_requires_api_key() {
        assert_matches!(
            GroqConfig::from_lookup(lookup(&[])),
            Err(StructuringError::Configuration(_))
        );
        assert_matches!(
            GroqConfig::from_lookup(lookup(&[("GROQ_API_KEY", " ")])),
            Err(StructuringError::Configuration(_))
        );
    }

    #[test]
    fn config_defaults() {
        let config = GroqConfig::from_lookup(lookup(&[("GROQ_API_KEY", "gsk_test")])).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn request_body_uses_json_mode() {
        let structurer = GroqStructurer::new(GroqConfig {
            api_key: "gsk_test".into(),
            model: DEFAULT_MODEL.into(),
            base_url: format!("{DEFAULT_BASE_URL}/"),
        });
        let body = structurer.request_body("a dog chasing a cat", 4);

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["messages"][0]["role"], "system");
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("\"a dog chasing a cat\""));
        assert!(user.contains("Maximum number of scenes: 4"));
        assert_eq!(
            structurer.completions_url(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }
}
