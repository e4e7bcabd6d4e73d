//! Chat prompt templates rendered with minijinja

use crate::config::PromptFormat;
use crate::error::{Error, Result};
use minijinja::{context, Environment, Value};
use serde::{Deserialize, Serialize};

/// ChatML serialization; the trailing assistant header opens the reply
const CHATML_TEMPLATE: &str = "{% for message in messages %}<|im_start|>{{ message.role }}\n{{ message.content }}<|im_end|>\n{% endfor %}{% if add_generation_prompt %}<|im_start|>assistant\n{% endif %}";

/// Role-tag serialization used by the dataset generation prompts
const TAGGED_TEMPLATE: &str = "{% for message in messages %}<|{{ message.role }}|>\n{{ message.content }}\n{% endfor %}{% if add_generation_prompt %}<|assistant|>\n{% endif %}";

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Template engine for rendering chat prompts
pub struct TemplateEngine {
    env: Environment<'static>,
    template: String,
}

impl TemplateEngine {
    /// Create an engine for the given format; `custom` is required for
    /// [`PromptFormat::Custom`]
    pub fn new(format: PromptFormat, custom: Option<&str>) -> Result<Self> {
        let template = match format {
            PromptFormat::Chatml => CHATML_TEMPLATE.to_string(),
            PromptFormat::Tagged => TAGGED_TEMPLATE.to_string(),
            PromptFormat::Custom => custom
                .map(str::to_string)
                .ok_or_else(|| Error::Template("prompt_format is custom but model.chat_template is empty".to_string()))?,
        };

        let mut env = Environment::new();
        env.add_filter("strip", strip_filter);
        env.add_function("raise_exception", raise_exception_fn);

        // Fail at construction rather than on the first request
        env.template_from_str(&template)?;

        Ok(Self { env, template })
    }

    /// Render messages into a prompt string
    pub fn render(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String> {
        let tmpl = self.env.template_from_str(&self.template)?;
        let rendered = tmpl.render(context! {
            messages => messages,
            add_generation_prompt => add_generation_prompt,
        })?;
        Ok(rendered)
    }
}

/// Tagged prompt for a single system/instruction pair
pub fn build_prompt(system: &str, instruction: &str) -> String {
    format!("<|system|>\n{system}\n<|user|>\n{instruction}\n<|assistant|>\n")
}

/// Python-style `.strip()` for custom templates
fn strip_filter(value: &Value, chars: Option<&str>) -> std::result::Result<Value, minijinja::Error> {
    if let Some(s) = value.as_str() {
        match chars {
            Some(c) => {
                let char_list: Vec<char> = c.chars().collect();
                Ok(Value::from(s.trim_matches(char_list.as_slice())))
            }
            None => Ok(Value::from(s.trim())),
        }
    } else {
        Ok(value.clone())
    }
}

fn raise_exception_fn(msg: String) -> std::result::Result<Value, minijinja::Error> {
    Err(minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Vec<ChatMessage> {
        vec![ChatMessage::system("Sei nett."), ChatMessage::user("Hallo!")]
    }

    #[test]
    fn test_chatml_rendering() {
        let engine = TemplateEngine::new(PromptFormat::Chatml, None).unwrap();
        let prompt = engine.render(&conversation(), true).unwrap();
        assert_eq!(
            prompt,
            "<|im_start|>system\nSei nett.<|im_end|>\n<|im_start|>user\nHallo!<|im_end|>\n<|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_tagged_matches_build_prompt() {
        let engine = TemplateEngine::new(PromptFormat::Tagged, None).unwrap();
        let prompt = engine.render(&conversation(), true).unwrap();
        assert_eq!(prompt, build_prompt("Sei nett.", "Hallo!"));
    }

    #[test]
    fn test_no_generation_prompt() {
        let engine = TemplateEngine::new(PromptFormat::Chatml, None).unwrap();
        let prompt = engine.render(&[ChatMessage::user("x")], false).unwrap();
        assert!(!prompt.ends_with("<|im_start|>assistant\n"));
    }

    #[test]
    fn test_custom_template() {
        let engine = TemplateEngine::new(
            PromptFormat::Custom,
            Some("{% for m in messages %}[{{ m.role }}] {{ m.content|strip }}\n{% endfor %}"),
        )
        .unwrap();
        let prompt = engine.render(&[ChatMessage::user("  hi  ")], true).unwrap();
        assert_eq!(prompt, "[user] hi\n");
    }

    #[test]
    fn test_custom_without_template_is_rejected() {
        assert!(TemplateEngine::new(PromptFormat::Custom, None).is_err());
        assert!(TemplateEngine::new(PromptFormat::Custom, Some("{% for %}")).is_err());
    }
}
