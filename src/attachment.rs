//! Image attachments sent inline with a user message.

use std::fs;
use std::path::Path;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Image encodings accepted by vision models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Match a file extension (`png`, `jpg`, `jpeg`, any case).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }

    /// Detect the format from the file's magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// A base64-encoded image ready to be embedded as a data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub name: String,
    pub format: ImageFormat,
    /// Standard, padded base64 of the raw file bytes.
    pub data: String,
}

impl ImageAttachment {
    /// Load and encode an image file.
    pub fn from_path(path: &Path) -> Result<Self, ChatError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let format = ImageFormat::from_extension(ext)
            .ok_or_else(|| ChatError::UnsupportedImage(path.display().to_string()))?;

        let bytes = fs::read(path).map_err(|source| ChatError::Attachment {
            path: path.to_path_buf(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        tracing::debug!("Loaded attachment {} ({} bytes)", name, bytes.len());
        Ok(Self::encode(name, format, &bytes))
    }

    /// Encode an in-memory image. The name's extension wins; otherwise the
    /// magic bytes decide.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self, ChatError> {
        let name = name.into();
        let format = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .or_else(|| ImageFormat::sniff(bytes))
            .ok_or_else(|| ChatError::UnsupportedImage(name.clone()))?;

        Ok(Self::encode(name, format, bytes))
    }

    fn encode(name: String, format: ImageFormat, bytes: &[u8]) -> Self {
        Self {
            name,
            format,
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// `data:image/<fmt>;base64,<payload>`
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.format.mime_type(), self.data)
    }

    /// Size of the decoded payload in bytes.
    pub fn byte_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        (self.data.len() / 4) * 3 - padding
    }

    /// Human readable size, e.g. `12.3 KB`.
    pub fn size_label(&self) -> String {
        let len = self.byte_len();
        if len < 1024 {
            format!("{} B", len)
        } else if len < 1024 * 1024 {
            format!("{:.1} KB", len as f64 / 1024.0)
        } else {
            format!("{:.1} MB", len as f64 / (1024.0 * 1024.0))
        }
    }
}
