use anyhow::Result;
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_openai::types::responses::{
    CreateResponseArgs, EasyInputContent, EasyInputMessage, InputItem, InputParam, MessageType,
    Role,
};
use async_trait::async_trait;

use crate::config::ApiMode;
use crate::responder::Responder;

/// Sends each prompt as a single user message to an OpenAI-compatible
/// endpoint (OpenAI itself, vLLM, LM Studio, ...).
pub struct OpenAIResponder {
    client: Client<OpenAIConfig>,
    model: String,
    api_mode: ApiMode,
    max_output_tokens: u32,
    temperature: Option<f32>,
}

impl OpenAIResponder {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        api_mode: ApiMode,
    ) -> Self {
        let mut openai_config = OpenAIConfig::default().with_api_key(api_key);
        if let Some(url) = base_url {
            openai_config = openai_config.with_api_base(url);
        }
        Self {
            client: Client::with_config(openai_config),
            model,
            api_mode,
            max_output_tokens: 2048,
            temperature: None,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    async fn respond_chat(&self, prompt: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestUserMessage::from(prompt).into()];

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .max_completion_tokens(self.max_output_tokens);
        if let Some(temperature) = self.temperature {
            args.temperature(temperature);
        }
        let request = args.build()?;

        let response_message = self
            .client
            .chat()
            .create(request)
            .await?
            .choices
            .first()
            .ok_or_else(|| anyhow::anyhow!("No choices in response"))?
            .message
            .clone();

        response_message
            .content
            .ok_or_else(|| anyhow::anyhow!("No content in response"))
    }

    async fn respond_responses(&self, prompt: &str) -> Result<String> {
        let input_items: Vec<InputItem> = vec![InputItem::EasyMessage(EasyInputMessage {
            r#type: MessageType::Message,
            role: Role::User,
            content: EasyInputContent::Text(prompt.to_string()),
        })];

        let mut args = CreateResponseArgs::default();
        args.max_output_tokens(self.max_output_tokens)
            .model(&self.model)
            .input(InputParam::Items(input_items))
            .store(false);
        if let Some(temperature) = self.temperature {
            args.temperature(temperature);
        }
        let request = args.build()?;

        let response = self.client.responses().create(request).await?;

        response
            .output_text()
            .ok_or_else(|| anyhow::anyhow!("No output text in response"))
    }
}

#[async_trait]
impl Responder for OpenAIResponder {
    async fn respond(&self, prompt: &str) -> Result<String> {
        match self.api_mode {
            ApiMode::Chat => self.respond_chat(prompt).await,
            ApiMode::Responses => self.respond_responses(prompt).await,
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}
