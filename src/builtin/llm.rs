//! `llm`: registers the `LLM` operation and a shared `llm_client` handle.
//!
//! Only the echo backend lives in this crate. Real model adapters plug in
//! through [`Backend`]; a config naming an unavailable backend falls back to
//! echo.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::container::Container;
use crate::error::OpError;
use crate::operation::Message;

pub const CLIENT_KEY: &str = "llm_client";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

fn default_role() -> String {
    "user".to_string()
}

pub trait Backend: Send + Sync {
    fn complete(&self, prompt: &str, max_tokens: Option<u32>) -> Result<String, OpError>;
    fn chat(&self, messages: &[ChatMessage], max_tokens: Option<u32>) -> Result<String, OpError>;
}

/// Echoes the prompt (or the last chat message) back.
pub struct EchoBackend;

impl Backend for EchoBackend {
    fn complete(&self, prompt: &str, _max_tokens: Option<u32>) -> Result<String, OpError> {
        Ok(format!("ECHO: {prompt}"))
    }

    fn chat(&self, messages: &[ChatMessage], _max_tokens: Option<u32>) -> Result<String, OpError> {
        Ok(match messages.last() {
            Some(last) => format!("ECHO: {}", last.content),
            None => "ECHO:".to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: String,
    pub model: Option<String>,
    pub max_response_tokens: Option<u32>,
    pub forward_input_with_response: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: "echo".to_string(),
            model: None,
            max_response_tokens: Some(512),
            forward_input_with_response: false,
        }
    }
}

pub struct LlmClient {
    config: LlmConfig,
    backend_name: String,
    backend: Box<dyn Backend>,
}

impl LlmClient {
    /// Build a client for `config`, substituting echo when the requested
    /// backend is not available.
    pub fn from_config(config: LlmConfig) -> Self {
        match backend_for(&config) {
            Ok(backend) => Self {
                backend_name: config.backend.clone(),
                config,
                backend,
            },
            Err(reason) => {
                tracing::warn!(backend = %config.backend, "{reason}, falling back to echo");
                Self {
                    backend_name: "echo".to_string(),
                    config,
                    backend: Box::new(EchoBackend),
                }
            }
        }
    }

    pub fn with_backend(config: LlmConfig, name: impl Into<String>, backend: Box<dyn Backend>) -> Self {
        Self {
            config,
            backend_name: name.into(),
            backend,
        }
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn complete(&self, prompt: &str) -> Result<String, OpError> {
        self.backend.complete(prompt, self.config.max_response_tokens)
    }

    pub fn chat(&self, messages: &[ChatMessage]) -> Result<String, OpError> {
        self.backend.chat(messages, self.config.max_response_tokens)
    }
}

fn backend_for(config: &LlmConfig) -> Result<Box<dyn Backend>, String> {
    match config.backend.as_str() {
        "echo" => Ok(Box::new(EchoBackend)),
        "openai" | "llama_cpp" => Err(format!("backend '{}' is not built in", config.backend)),
        other => Err(format!("unknown backend '{other}'")),
    }
}

pub fn build(container: &mut Container, settings: &Message) -> anyhow::Result<()> {
    let config: LlmConfig = serde_json::from_value(Value::Object(settings.clone()))?;
    container.insert_handle(CLIENT_KEY, Arc::new(LlmClient::from_config(config)))?;
    container.ops_mut().register_fn("LLM", op_llm);
    Ok(())
}

/// With an empty node config the shared client is used; otherwise the node
/// config describes its own client.
fn op_llm(message: Message, config: &Message, container: &Container) -> Result<Value, OpError> {
    let shared = if config.is_empty() {
        container.handle::<LlmClient>(CLIENT_KEY)
    } else {
        None
    };
    let client = match shared {
        Some(client) => client,
        None => {
            let cfg: LlmConfig = serde_json::from_value(Value::Object(config.clone()))
                .map_err(|e| OpError::Config(e.to_string()))?;
            Arc::new(LlmClient::from_config(cfg))
        }
    };

    let text = if let Some(messages) = message.get("messages") {
        let messages: Vec<ChatMessage> = serde_json::from_value(messages.clone())
            .map_err(|e| OpError::Input(format!("messages: {e}")))?;
        client.chat(&messages)?
    } else if let Some(prompt) = message.get("prompt") {
        match prompt {
            Value::String(s) => client.complete(s)?,
            other => client.complete(&other.to_string())?,
        }
    } else {
        client.complete(&Value::Object(message.clone()).to_string())?
    };

    let mut out = Message::new();
    out.insert("completion".into(), json!(text));
    if client.config().forward_input_with_response {
        out.insert("input".into(), Value::Object(message));
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::object;
    use pretty_assertions::assert_eq;

    fn container() -> Container {
        let mut c = Container::new(Message::new());
        build(&mut c, &Message::new()).unwrap();
        c
    }

    fn call(c: &Container, message: Value, config: Value) -> Value {
        c.ops()
            .get("LLM")
            .unwrap()
            .call(object(message), &object(config), c)
            .unwrap()
    }

    #[test]
    fn registers_shared_echo_client() {
        let c = container();
        let client = c.handle::<LlmClient>(CLIENT_KEY).unwrap();
        assert_eq!(client.backend_name(), "echo");
    }

    #[test]
    fn prompt_is_completed() {
        let c = container();
        assert_eq!(
            call(&c, json!({"prompt": "hello"}), json!({})),
            json!({"completion": "ECHO: hello"})
        );
    }

    #[test]
    fn messages_use_chat() {
        let c = container();
        let out = call(
            &c,
            json!({"messages": [{"role": "user", "content": "a"}, {"role": "user", "content": "b"}]}),
            json!({}),
        );
        assert_eq!(out, json!({"completion": "ECHO: b"}));
    }

    #[test]
    fn forwards_input_when_configured() {
        let c = container();
        let out = call(
            &c,
            json!({"prompt": "x"}),
            json!({"forward_input_with_response": true}),
        );
        assert_eq!(out, json!({"completion": "ECHO: x", "input": {"prompt": "x"}}));
    }

    struct Shout;

    impl Backend for Shout {
        fn complete(&self, prompt: &str, _max_tokens: Option<u32>) -> Result<String, OpError> {
            Ok(prompt.to_uppercase())
        }

        fn chat(&self, messages: &[ChatMessage], max_tokens: Option<u32>) -> Result<String, OpError> {
            let joined: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
            self.complete(&joined.join(" "), max_tokens)
        }
    }

    #[test]
    fn custom_backend_plugs_in() {
        let client = LlmClient::with_backend(LlmConfig::default(), "shout", Box::new(Shout));
        assert_eq!(client.backend_name(), "shout");
        assert_eq!(client.complete("hi").unwrap(), "HI");
        let chat = [
            ChatMessage { role: "user".into(), content: "a".into() },
            ChatMessage { role: "user".into(), content: "b".into() },
        ];
        assert_eq!(client.chat(&chat).unwrap(), "A B");
    }

    #[test]
    fn unavailable_backend_falls_back_to_echo() {
        let client = LlmClient::from_config(LlmConfig {
            backend: "openai".into(),
            ..LlmConfig::default()
        });
        assert_eq!(client.backend_name(), "echo");
        assert_eq!(client.complete("p").unwrap(), "ECHO: p");
    }
}
