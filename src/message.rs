use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::ImageAttachment;

/// Role in conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed fragment of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentPart {
    Text(String),
    Image(ImageAttachment),
}

/// A message in a conversation. Immutable once appended to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    parts: Vec<ContentPart>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A user turn: exactly one text part, then at most one image.
    pub fn user(text: impl Into<String>, image: Option<ImageAttachment>) -> Self {
        let mut parts = vec![ContentPart::Text(text.into())];
        if let Some(image) = image {
            parts.push(ContentPart::Image(image));
        }
        Self::with_parts(Role::User, parts)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_parts(Role::Assistant, vec![ContentPart::Text(text.into())])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::with_parts(Role::System, vec![ContentPart::Text(text.into())])
    }

    fn with_parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            parts,
            created_at: Utc::now(),
        }
    }

    pub fn parts(&self) -> &[ContentPart] {
        &self.parts
    }

    /// Text of the message (the concatenated text parts).
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::Image(_) => None,
            })
            .collect()
    }

    pub fn image(&self) -> Option<&ImageAttachment> {
        self.parts.iter().find_map(|part| match part {
            ContentPart::Image(image) => Some(image),
            ContentPart::Text(_) => None,
        })
    }

    pub fn has_image(&self) -> bool {
        self.image().is_some()
    }
}
