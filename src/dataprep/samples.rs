//! Instruction samples and chat-formatted training records

use crate::runtime::ChatMessage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// CEFR level used when `data.level` is not configured
pub const DEFAULT_LEVEL: &str = "A2";

/// Words that mark a block as a shop dialog
const DIALOG_MARKERS: [&str; 3] = ["Kunde", "Verkäufer", "Du"];

/// Exercise kind detected from the block text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Roleplay,
    Questions,
    Dialog,
}

impl TaskType {
    pub fn detect(text: &str) -> Self {
        if text.contains("Rollenspiel") {
            Self::Roleplay
        } else if text.contains("Fragen") {
            Self::Questions
        } else {
            Self::Dialog
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Roleplay => "roleplay",
            Self::Questions => "questions",
            Self::Dialog => "dialog",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMetadata {
    pub level: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
}

/// One line of the prepared dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub system: String,
    pub instruction: String,
    pub response: String,
    pub metadata: SampleMetadata,
}

/// Keep blocks with more than five words that mention a dialog participant
pub fn is_valid_block(text: &str) -> bool {
    text.split_whitespace().count() > 5 && DIALOG_MARKERS.iter().any(|m| text.contains(m))
}

/// Build an unanswered sample from a dialog block for a CEFR `level`
pub fn block_to_sample(text: &str, system: &str, level: &str) -> Sample {
    let task_type = TaskType::detect(text);
    let instruction = format!(
        "Разбери следующий {} между продавцом и покупателем. Уровень {}. \
         Ответь, были ли ошибки, и предложи похожее упражнение.\n\n{}",
        task_type,
        level,
        text.trim()
    );

    Sample {
        system: system.to_string(),
        instruction,
        response: String::new(),
        metadata: SampleMetadata {
            level: level.to_string(),
            task_type,
        },
    }
}

/// `{"messages": [...]}` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesRecord {
    pub messages: Vec<ChatMessage>,
}

/// System, user, and assistant turns of a sample
pub fn format_to_messages(sample: &Sample) -> MessagesRecord {
    MessagesRecord {
        messages: vec![
            ChatMessage::system(sample.system.clone()),
            ChatMessage::user(sample.instruction.clone()),
            ChatMessage::assistant(sample.response.clone()),
        ],
    }
}

/// ChatML text of a conversation followed by an open assistant turn
pub fn render_training_text(messages: &[ChatMessage]) -> String {
    let mut text = String::new();
    for message in messages {
        text.push_str("<|im_start|>");
        text.push_str(&message.role);
        text.push('\n');
        text.push_str(&message.content);
        text.push_str("<|im_end|>\n");
    }
    text.push_str("<|im_start|>assistant\n");
    text
}

/// One line of the exported training file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub messages: Vec<ChatMessage>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_tokens: Option<usize>,
}
