use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub tokens: u64,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            model_id: None,
            tokens: 0,
        }
    }

    pub fn assistant(content: impl Into<String>, model_id: impl Into<String>, tokens: u64) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            model_id: Some(model_id.into()),
            tokens,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            model_id: None,
            tokens: 0,
        }
    }
}
