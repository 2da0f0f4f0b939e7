//! Memory (photo/video) model.
//!
//! # Invariants
//! - `content` is either inline-encoded (`data:` URL) or a remote URL.
//!   Which one a given store holds is not guaranteed: the local copy may stay
//!   inline while the remote copy points at offloaded media.
//! - `date` is an ISO-8601 string; lexical order matches chronological order
//!   for the formats produced by this crate.

use super::{new_record_id, Collection, Record};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const INLINE_PREFIX: &str = "data:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    /// File extension used when the inline MIME type is not recognised.
    pub fn default_extension(self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Video => "mp4",
        }
    }
}

/// One shared memory: a photo or video with an optional caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Inline `data:` URL or remote media URL.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// ISO-8601 creation/display date.
    pub date: String,
}

impl Memory {
    /// Creates a memory with a freshly generated identifier.
    pub fn new(
        kind: MediaKind,
        content: impl Into<String>,
        caption: Option<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            id: new_record_id(),
            kind,
            content: content.into(),
            caption,
            date: date.into(),
        }
    }

    /// Returns whether `content` carries the media bytes inline.
    pub fn is_inline(&self) -> bool {
        is_inline_content(&self.content)
    }
}

impl Record for Memory {
    const COLLECTION: Collection = Collection::Memories;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Returns whether a content reference is an inline `data:` URL.
pub fn is_inline_content(content: &str) -> bool {
    content.starts_with(INLINE_PREFIX)
}

/// Orders memories newest first; ties fall back to `id` so the order is
/// deterministic across devices.
pub fn sort_memories(memories: &mut [Memory]) {
    memories.sort_by(|left, right| match right.date.cmp(&left.date) {
        Ordering::Equal => left.id.cmp(&right.id),
        other => other,
    });
}
