//! Firebase Storage adapter for media offload.
//!
//! # Invariants
//! - Objects live under `<namespace>/media/<id>.<ext>`; re-uploading the same
//!   memory overwrites its object.
//! - Any failure yields `RemoteOutcome::Err`; callers then skip the remote
//!   write instead of publishing a broken reference.

use super::firebase::{check_status, FirebaseSession};
use super::inline::InlineMedia;
use super::{BlobStore, RemoteError, RemoteOutcome};
use crate::model::memory::MediaKind;
use log::{info, warn};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

const STORAGE_BASE_URL: &str = "https://firebasestorage.googleapis.com/v0/b";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    name: String,
    download_tokens: Option<String>,
}

pub struct FirebaseBlobStore {
    client: Client,
    bucket: String,
    namespace: String,
    session: Arc<FirebaseSession>,
}

impl FirebaseBlobStore {
    pub fn new(
        client: Client,
        bucket: &str,
        namespace: &str,
        session: Arc<FirebaseSession>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            namespace: namespace.to_string(),
            session,
        }
    }

    fn upload_bytes(
        &self,
        object_name: &str,
        media: &InlineMedia,
        kind: MediaKind,
    ) -> Result<String, RemoteError> {
        let response = self
            .client
            .post(format!("{STORAGE_BASE_URL}/{}/o", self.bucket))
            .query(&[("uploadType", "media"), ("name", object_name)])
            .header(AUTHORIZATION, format!("Firebase {}", self.session.id_token()))
            .header(CONTENT_TYPE, media.content_type(kind))
            .body(media.bytes.clone())
            .send()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;
        let uploaded: UploadResponse = check_status(response)?
            .json()
            .map_err(|err| RemoteError::Decode(err.to_string()))?;
        let token = uploaded
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                RemoteError::Decode("upload response has no download token".to_string())
            })?;

        Ok(download_url(&self.bucket, &uploaded.name, token))
    }
}

impl BlobStore for FirebaseBlobStore {
    fn upload(&self, inline: &str, id: &str, kind: MediaKind) -> RemoteOutcome<String> {
        let started_at = Instant::now();
        let Some(media) = InlineMedia::parse(inline) else {
            warn!("event=blob_upload module=remote status=error id={id} error_code=not_inline");
            return RemoteOutcome::Err(RemoteError::Decode(
                "content is not base64 inline media".to_string(),
            ));
        };

        let object_name = format!("{}/media/{id}.{}", self.namespace, media.extension(kind));
        match self.upload_bytes(&object_name, &media, kind) {
            Ok(url) => {
                info!(
                    "event=blob_upload module=remote status=ok id={id} bytes={} duration_ms={}",
                    media.bytes.len(),
                    started_at.elapsed().as_millis()
                );
                RemoteOutcome::Ok(url)
            }
            Err(err) => {
                warn!(
                    "event=blob_upload module=remote status=error id={id} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                RemoteOutcome::Err(err)
            }
        }
    }
}

fn download_url(bucket: &str, object_name: &str, token: &str) -> String {
    format!(
        "{STORAGE_BASE_URL}/{bucket}/o/{}?alt=media&token={token}",
        encode_object_name(object_name)
    )
}

/// Percent-encodes an object name for use as one URL path segment.
fn encode_object_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}
