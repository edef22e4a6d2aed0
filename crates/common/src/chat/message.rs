use serde::{Deserialize, Serialize};

/// Frame terminator on the wire
pub const FRAME_DELIMITER: u8 = b'\n';

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed chat frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("encoded chat frame contains a raw delimiter")]
    EmbeddedDelimiter,
}

/// A single chat line as it travels between peers:
///  `{"Username":"<sender>","Message":"<text>"}\n`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "Username")]
    pub sender: String,
    /// Kept exactly as captured, usually with its own trailing newline
    #[serde(rename = "Message")]
    pub text: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// An empty text is the end-of-conversation signal
    pub fn is_end_of_conversation(&self) -> bool {
        self.text.is_empty()
    }

    /// A bare newline (the operator just pressed enter) is not displayed
    pub fn is_blank_line(&self) -> bool {
        self.text == "\n"
    }

    /// Serialize into one delimited frame
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut frame = serde_json::to_vec(self)?;
        // JSON escapes control characters inside strings, so this only
        //  trips if the serializer misbehaves
        if frame.contains(&FRAME_DELIMITER) {
            return Err(CodecError::EmbeddedDelimiter);
        }
        frame.push(FRAME_DELIMITER);
        Ok(frame)
    }

    /// Parse one frame; `bytes` must not include the trailing delimiter
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
