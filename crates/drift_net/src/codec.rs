//! Exit message wire format
//!
//! Messages are JSON text. With compression on they are LZ4-compressed and
//! base64-wrapped behind a `lz4:` marker so the value stays valid UTF-8.
//! Decoding accepts both forms regardless of the local setting.

use crate::edge::Edge;
use crate::error::MessageError;
use crate::{WindowId, EXIT_PREFIX};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub const COMPRESSED_MARKER: &str = "lz4:";

/// State of a particle leaving a viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitMessage {
    pub position: [f32; 3],
    pub velocity: f32,
    pub edge: Edge,
    /// Publishing window.
    pub source: WindowId,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec {
    compress: bool,
}

impl MessageCodec {
    pub fn new(compress: bool) -> Self {
        Self { compress }
    }

    pub fn encode(&self, message: &ExitMessage) -> Result<String, MessageError> {
        let json = serde_json::to_string(message)?;
        if !self.compress {
            return Ok(json);
        }
        let packed = lz4_flex::compress_prepend_size(json.as_bytes());
        Ok(format!("{COMPRESSED_MARKER}{}", STANDARD.encode(packed)))
    }

    pub fn decode(&self, payload: &str) -> Result<ExitMessage, MessageError> {
        match payload.strip_prefix(COMPRESSED_MARKER) {
            Some(wrapped) => {
                let packed = STANDARD.decode(wrapped)?;
                let json = String::from_utf8(lz4_flex::decompress_size_prepended(&packed)?)?;
                Ok(serde_json::from_str(&json)?)
            }
            None => Ok(serde_json::from_str(payload)?),
        }
    }
}

/// Generates exit keys that are unique across windows and increase within
/// one window: `particleExit<millis>-<window>-<seq>`.
pub struct ExitKeys {
    window: WindowId,
    seq: u64,
}

impl ExitKeys {
    pub fn new(window: WindowId) -> Self {
        Self { window, seq: 0 }
    }

    pub fn next_key(&mut self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        self.seq += 1;
        format!("{EXIT_PREFIX}{millis:013}-{}-{:08}", self.window, self.seq)
    }
}
