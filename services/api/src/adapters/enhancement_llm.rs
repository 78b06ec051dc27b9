//! services/api/src/adapters/enhancement_llm.rs
//!
//! This module contains the chat-completion adapters for story text. It implements
//! the `TextEnhancementService` and `SectionOrganizerService` ports from the `core`
//! crate. Each call is made with the credential the rotation manager picked, so
//! the adapter builds its client per call instead of holding one.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use festival_stories_core::{
    key_rotation::ApiCredential,
    ports::{
        EnhancedText, EnhancementRequest, OrganizeRequest, OrganizedStory, PortError, PortResult,
        SectionOrganizerService, TextEnhancementService,
    },
};
use serde::de::DeserializeOwned;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct OpenAiStoryAdapter {
    model: String,
}

impl OpenAiStoryAdapter {
    pub fn new(model: String) -> Self {
        Self { model }
    }

    fn client(credential: &ApiCredential) -> Client<OpenAIConfig> {
        Client::with_config(OpenAIConfig::new().with_api_key(credential.key.clone()))
    }

    /// Builds the single-answer system + user request.
    fn chat_request(
        &self,
        system: String,
        user: String,
        max_tokens: u32,
    ) -> PortResult<CreateChatCompletionRequest> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(max_tokens)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    /// Sends one system + user exchange and parses the JSON object in the reply.
    async fn chat_json<T: DeserializeOwned>(
        &self,
        credential: &ApiCredential,
        system: String,
        user: String,
        max_tokens: u32,
    ) -> PortResult<T> {
        let request = self.chat_request(system, user, max_tokens)?;

        let response = Self::client(credential)
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PortError::Unexpected("Model response contained no text content.".to_string()))?;
        debug!(key = %credential.name, chars = content.len(), "Received model response");
        parse_json_reply(&content)
    }
}

/// Rate-limit rejections must be told apart so the gateway can rotate keys.
fn map_openai_error(e: OpenAIError) -> PortError {
    classify_failure(e.to_string())
}

fn classify_failure(message: String) -> PortError {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("429") || lowered.contains("rate_limit") || lowered.contains("rate limit") {
        PortError::RateLimited(message)
    } else {
        PortError::Unexpected(message)
    }
}

/// Parses the outermost JSON object in `content`, tolerating code fences or
/// prose around it.
fn parse_json_reply<T: DeserializeOwned>(content: &str) -> PortResult<T> {
    let json = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => {
            return Err(PortError::Unexpected(
                "Model response did not contain a JSON object.".to_string(),
            ))
        }
    };
    serde_json::from_str(json)
        .map_err(|e| PortError::Unexpected(format!("Model response was not valid JSON: {}", e)))
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl TextEnhancementService for OpenAiStoryAdapter {
    async fn enhance_text(
        &self,
        credential: &ApiCredential,
        request: &EnhancementRequest,
    ) -> PortResult<EnhancedText> {
        let system = format!(
            r#"You are an expert in {language} language and Indian cultural stories.
Your task is to clean and correct the following text while:
1. Preserving the original meaning and cultural authenticity
2. Correcting grammar, spelling, and sentence structure
3. Maintaining the storytelling tone and emotional essence
4. Adding appropriate punctuation and formatting

Context: {context}

Respond with JSON in exactly this format:
{{
    "cleaned_text": "the corrected and cleaned text",
    "improvements_made": ["list of improvements made"],
    "confidence_score": 0.95,
    "cultural_notes": "any important cultural context preserved"
}}"#,
            language = request.language,
            context = request.context,
        );
        let user = format!(
            "Please clean and correct this {} text:\n\n{}",
            request.language, request.text
        );
        self.chat_json(credential, system, user, 2000).await
    }
}

#[async_trait]
impl SectionOrganizerService for OpenAiStoryAdapter {
    async fn organize_sections(
        &self,
        credential: &ApiCredential,
        request: &OrganizeRequest,
    ) -> PortResult<OrganizedStory> {
        let system = format!(
            r#"You are an expert storyteller and editor.
Organize the following {language} story into {count} sections for a virtual book.
Each section should have a natural flow, end at a good stopping point, be roughly
equal in length, have a descriptive title and include a brief description for an
illustration.

Respond with JSON in exactly this format:
{{
    "sections": [
        {{
            "title": "Section title",
            "content": "Section content text",
            "image_description": "Description for a relevant illustration",
            "page_number": 1
        }}
    ],
    "story_title": "Overall story title",
    "story_summary": "Brief summary of the complete story"
}}"#,
            language = request.language,
            count = request.num_sections,
        );
        let user = format!(
            "Please organize this {} story into {} sections:\n\n{}",
            request.language, request.num_sections, request.text
        );
        self.chat_json(credential, system, user, 3000).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_extracted_from_fenced_replies() {
        let reply = "```json\n{\"cleaned_text\": \"दीये जले\", \"improvements_made\": [\"spelling\"]}\n```";
        let parsed: EnhancedText = parse_json_reply(reply).unwrap();
        assert_eq!(parsed.cleaned_text, "दीये जले");
        assert_eq!(parsed.improvements_made, vec!["spelling".to_string()]);
        assert_eq!(parsed.confidence_score, 0.0);
    }

    #[test]
    fn rate_limit_failures_are_recognised() {
        assert!(matches!(
            classify_failure("status 429: Too Many Requests".into()),
            PortError::RateLimited(_)
        ));
        assert!(matches!(
            classify_failure("rate_limit_exceeded: slow down".into()),
            PortError::RateLimited(_)
        ));
        assert!(matches!(
            classify_failure("invalid_api_key".into()),
            PortError::Unexpected(_)
        ));
    }

    #[test]
    fn replies_without_json_are_unexpected() {
        let result: PortResult<EnhancedText> = parse_json_reply("Sorry, I can't help.");
        assert!(matches!(result, Err(PortError::Unexpected(_))));
    }

    #[test]
    fn organizer_reply_parses_with_missing_fields() {
        let reply = r#"{"sections": [{"title": "Dawn", "content": "a", "page_number": 1}]}"#;
        let parsed: OrganizedStory = parse_json_reply(reply).unwrap();
        assert_eq!(parsed.sections[0].title, "Dawn");
        assert!(parsed.story_title.is_empty());
    }

    #[test]
    fn requests_carry_the_model_and_both_messages() {
        let adapter = OpenAiStoryAdapter::new("gpt-4o".into());
        let request = adapter
            .chat_request("Reply in JSON.".into(), "Diwali story".into(), 800)
            .unwrap();
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.max_completion_tokens, Some(800));
        assert_eq!(request.n, Some(1));
    }
}
