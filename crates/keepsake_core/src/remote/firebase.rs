//! Firebase Realtime Database REST adapter with anonymous sign-in.
//!
//! # Responsibility
//! - Acquire one anonymous credential per session.
//! - Map `get`/`set`/`remove` onto `GET`/`PUT`/`DELETE <db>/<ns>/<path>.json`.
//! - Follow server-sent events for `listen`, re-reading the listened path on
//!   every `put`/`patch` so consumers always receive a full snapshot.
//!
//! # Invariants
//! - Every failure is logged here and returned as `RemoteOutcome::Err`.
//! - Paths are always prefixed by the shared namespace.
//! - The credential is never refreshed; an expired token degrades the
//!   session to failed remote calls until restart.

use super::storage::FirebaseBlobStore;
use super::subscription::{subscription_pair, ListenerGuard};
use super::{RemoteError, RemoteOutcome, RemotePath, RemoteSnapshot, RemoteStore, Subscription};
use crate::config::SyncConfig;
use crate::logging::sanitize_message;
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SIGN_UP_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:signUp";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Anonymous credential shared by the database and storage adapters.
#[derive(Debug)]
pub struct FirebaseSession {
    id_token: String,
    local_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: String,
    local_id: String,
}

impl FirebaseSession {
    pub fn sign_in_anonymously(client: &Client, api_key: &str) -> Result<Self, RemoteError> {
        let response = client
            .post(SIGN_UP_URL)
            .query(&[("key", api_key)])
            .json(&json!({ "returnSecureToken": true }))
            .send()
            .map_err(|err| RemoteError::Auth(err.to_string()))?;
        let response = check_status(response).map_err(|err| RemoteError::Auth(err.to_string()))?;
        let body: SignUpResponse = response
            .json()
            .map_err(|err| RemoteError::Auth(format!("unexpected sign-in response: {err}")))?;
        Ok(Self {
            id_token: body.id_token,
            local_id: body.local_id,
        })
    }

    /// Credential identity (`localId`). Only logged; paths are shared.
    pub fn identity(&self) -> &str {
        &self.local_id
    }

    pub(crate) fn id_token(&self) -> &str {
        &self.id_token
    }
}

/// Realtime database adapter bound to one signed-in session.
pub struct FirebaseRemoteStore {
    client: Client,
    stream_client: Client,
    database_url: String,
    namespace: String,
    session: Arc<FirebaseSession>,
}

impl FirebaseRemoteStore {
    /// Signs in anonymously and returns a ready adapter.
    pub fn connect(config: &SyncConfig) -> Result<Self, RemoteError> {
        let (Some(api_key), Some(database_url)) =
            (config.api_key.as_deref(), config.database_url.as_deref())
        else {
            return Err(RemoteError::NotConfigured);
        };

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;
        // Event streams stay open indefinitely.
        let stream_client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;

        let session = FirebaseSession::sign_in_anonymously(&client, api_key)?;
        info!(
            "event=sync_init module=remote status=ok identity={} namespace={}",
            session.identity(),
            config.namespace
        );

        Ok(Self {
            client,
            stream_client,
            database_url: database_url.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            session: Arc::new(session),
        })
    }

    /// Storage adapter sharing this session, when a bucket is configured.
    pub fn blob_store(&self, config: &SyncConfig) -> Option<FirebaseBlobStore> {
        let bucket = config.storage_bucket.as_deref()?;
        Some(FirebaseBlobStore::new(
            self.client.clone(),
            bucket,
            &self.namespace,
            Arc::clone(&self.session),
        ))
    }

    fn url_for(&self, path: &RemotePath) -> String {
        format!("{}/{}/{}.json", self.database_url, self.namespace, path)
    }

    fn execute(
        &self,
        event: &'static str,
        path: &RemotePath,
        request: RequestBuilder,
    ) -> RemoteOutcome<Response> {
        let started_at = Instant::now();
        let result = request
            .query(&[("auth", self.session.id_token())])
            .send()
            .map_err(|err| RemoteError::Transport(err.to_string()))
            .and_then(check_status);

        match result {
            Ok(response) => {
                debug!(
                    "event={event} module=remote status=ok path={path} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                RemoteOutcome::Ok(response)
            }
            Err(err) => {
                warn!(
                    "event={event} module=remote status=error path={path} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                RemoteOutcome::Err(err)
            }
        }
    }
}

impl RemoteStore for FirebaseRemoteStore {
    fn is_ready(&self) -> bool {
        true
    }

    fn get(&self, path: &RemotePath) -> RemoteOutcome<RemoteSnapshot> {
        match self.execute("remote_get", path, self.client.get(self.url_for(path))) {
            RemoteOutcome::Ok(response) => match decode_snapshot(response) {
                Ok(snapshot) => RemoteOutcome::Ok(snapshot),
                Err(err) => {
                    warn!("event=remote_get module=remote status=error path={path} error={err}");
                    RemoteOutcome::Err(err)
                }
            },
            RemoteOutcome::Degraded => RemoteOutcome::Degraded,
            RemoteOutcome::Err(err) => RemoteOutcome::Err(err),
        }
    }

    fn set(&self, path: &RemotePath, value: &Value) -> RemoteOutcome<()> {
        self.execute(
            "remote_set",
            path,
            self.client.put(self.url_for(path)).json(value),
        )
        .map(|_| ())
    }

    fn remove(&self, path: &RemotePath) -> RemoteOutcome<()> {
        self.execute(
            "remote_remove",
            path,
            self.client.delete(self.url_for(path)),
        )
        .map(|_| ())
    }

    fn listen(
        &self,
        path: &RemotePath,
        sink: Sender<RemoteSnapshot>,
    ) -> RemoteOutcome<Subscription> {
        let url = self.url_for(path);
        let request = self
            .stream_client
            .get(&url)
            .header(ACCEPT, "text/event-stream");
        let response = match self.execute("remote_listen", path, request) {
            RemoteOutcome::Ok(response) => response,
            RemoteOutcome::Degraded => return RemoteOutcome::Degraded,
            RemoteOutcome::Err(err) => return RemoteOutcome::Err(err),
        };

        let (subscription, guard) = subscription_pair(path.clone());
        let fetcher = SnapshotFetcher {
            client: self.client.clone(),
            url,
            session: Arc::clone(&self.session),
        };
        let listened = path.clone();
        let spawned = thread::Builder::new()
            .name(format!("keepsake-listen-{}", path.as_str().replace('/', "-")))
            .spawn(move || {
                run_event_stream(
                    BufReader::new(response),
                    || fetcher.fetch(),
                    &sink,
                    &guard,
                    &listened,
                )
            });

        match spawned {
            Ok(_) => {
                info!("event=remote_listen module=remote status=ok path={path}");
                RemoteOutcome::Ok(subscription)
            }
            Err(err) => {
                warn!("event=remote_listen module=remote status=error path={path} error={err}");
                RemoteOutcome::Err(RemoteError::Transport(err.to_string()))
            }
        }
    }
}

struct SnapshotFetcher {
    client: Client,
    url: String,
    session: Arc<FirebaseSession>,
}

impl SnapshotFetcher {
    fn fetch(&self) -> Result<RemoteSnapshot, RemoteError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("auth", self.session.id_token())])
            .send()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;
        decode_snapshot(check_status(response)?)
    }
}

/// Server-sent event kinds emitted by the realtime database stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEvent {
    Changed,
    KeepAlive,
    Closed,
    Unknown,
}

fn classify_event(name: &str) -> StreamEvent {
    match name {
        "put" | "patch" => StreamEvent::Changed,
        "keep-alive" => StreamEvent::KeepAlive,
        "cancel" | "auth_revoked" => StreamEvent::Closed,
        _ => StreamEvent::Unknown,
    }
}

/// Follows an event stream until it closes, the subscription is dropped or
/// the consumer goes away. Each `put`/`patch` sends one fresh snapshot.
fn run_event_stream(
    reader: impl BufRead,
    mut fetch: impl FnMut() -> Result<RemoteSnapshot, RemoteError>,
    sink: &Sender<RemoteSnapshot>,
    guard: &ListenerGuard,
    path: &RemotePath,
) {
    let mut pending: Option<StreamEvent> = None;

    for line in reader.lines() {
        if !guard.is_active() {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("event=remote_listen module=remote status=error path={path} error={err}");
                break;
            }
        };

        if let Some(name) = line.strip_prefix("event:") {
            pending = Some(classify_event(name.trim()));
            continue;
        }
        if !line.is_empty() {
            continue;
        }

        match pending.take() {
            Some(StreamEvent::Changed) => match fetch() {
                Ok(snapshot) => {
                    if !guard.is_active() || sink.send(snapshot).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(
                        "event=remote_listen module=remote status=degraded path={path} error={err}"
                    );
                }
            },
            Some(StreamEvent::Closed) => {
                warn!("event=remote_listen module=remote status=closed path={path}");
                break;
            }
            Some(StreamEvent::KeepAlive) | Some(StreamEvent::Unknown) | None => {}
        }
    }

    debug!("event=remote_listen module=remote status=stopped path={path}");
}

fn decode_snapshot(response: Response) -> Result<RemoteSnapshot, RemoteError> {
    let value: Value = response
        .json()
        .map_err(|err| RemoteError::Decode(err.to_string()))?;
    Ok(match value {
        Value::Null => None,
        other => Some(other),
    })
}

pub(crate) fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body: sanitize_message(&body, MAX_ERROR_BODY_CHARS),
    })
}
