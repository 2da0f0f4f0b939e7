//! Inline `data:` URL decoding for media offload.

use crate::model::memory::MediaKind;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

static DATA_URL_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:(?P<mime>[A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+)?(?P<params>(?:;[^;,]*)*)$")
        .expect("valid data url regex")
});

/// Decoded inline media payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMedia {
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl InlineMedia {
    /// Decodes a base64 `data:` URL. Returns `None` for remote URLs,
    /// non-base64 payloads and undecodable input.
    pub fn parse(content: &str) -> Option<Self> {
        let (header, payload) = content.split_once(',')?;
        let captures = DATA_URL_HEADER_RE.captures(header)?;
        let is_base64 = captures
            .name("params")
            .map(|params| params.as_str().split(';').any(|param| param == "base64"))
            .unwrap_or(false);
        if !is_base64 {
            return None;
        }

        let bytes = STANDARD.decode(payload.trim()).ok()?;
        Some(Self {
            mime: captures
                .name("mime")
                .map(|mime| mime.as_str().to_ascii_lowercase()),
            bytes,
        })
    }

    pub fn extension(&self, kind: MediaKind) -> &'static str {
        extension_for(self.mime.as_deref(), kind)
    }

    pub fn content_type(&self, kind: MediaKind) -> &str {
        match self.mime.as_deref() {
            Some(mime) => mime,
            None => match kind {
                MediaKind::Image => "image/jpeg",
                MediaKind::Video => "video/mp4",
            },
        }
    }
}

/// Maps a declared MIME type to a file extension.
pub fn extension_for(mime: Option<&str>, kind: MediaKind) -> &'static str {
    match mime {
        Some(mime) if mime.contains("jpeg") => "jpg",
        Some(mime) if mime.contains("png") => "png",
        Some(mime) if mime.contains("gif") => "gif",
        _ => kind.default_extension(),
    }
}
