//! The in-process session table: the single source of truth for token
//! custody.
//!
//! Sessions are inserted at `/session/start`, finalized at the OAuth
//! callback, and consulted (never mutated) by tool handlers, which work on
//! cloned snapshots. Finalization and token-clearing happen under the
//! table's write lock, so a tool handler observes either a not-yet-ready
//! session or a fully consistent `(access_token, expires_at, obligations)`
//! triple.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

use waygate_core::api::Obligations;
use waygate_core::metadata::{AuthorizationServerMetadata, ProtectedResourceMetadata};

/// PKCE material for one session. The verifier is erased once the code has
/// been exchanged.
#[derive(Clone, Debug)]
pub struct SessionPkce {
    pub verifier: Option<String>,
    pub challenge: String,
}

/// One user-authorized capability grant, keyed by `sid`.
#[derive(Clone, Debug)]
pub struct Session {
    pub sid: String,
    pub nonce: String,
    pub tool_id: String,
    /// The scopes this session was granted (policy's answer, not the raw ask)
    pub requested_scopes: Vec<String>,
    /// Space-joined form of `requested_scopes`
    pub scope_string: String,
    pub context: Map<String, Value>,
    /// Resource identifier from the discovered PRM document
    pub audience: String,
    /// Where tool calls are forwarded
    pub upstream: Url,
    /// Discovery documents, immutable for the session's lifetime
    pub rs_metadata: ProtectedResourceMetadata,
    pub as_metadata: AuthorizationServerMetadata,
    /// The public client this gateway registered at the session's AS
    pub client_id: String,
    pub pkce: SessionPkce,
    /// The signed state envelope bound into the authorize URL
    pub state_token: String,
    /// Obligations decided at start; immutable once written
    pub obligations: Obligations,
    pub obligations_issued_at: u64,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: u64,
    /// When the token was obtained; newest wins at selection time
    pub obtained_at: u64,
    /// Set once the authorization code has been exchanged
    pub used: bool,
}

impl Session {
    /// A session serves traffic iff it holds a token, its code has been
    /// exchanged, and the token has not expired.
    pub fn is_ready(&self, now: u64) -> bool {
        self.access_token.is_some() && self.used && now < self.expires_at
    }
}

/// Why a callback could not finalize a session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FinalizeError {
    #[error("unknown session")]
    UnknownSession,
    #[error("session already used")]
    AlreadyUsed,
}

/// Concurrency-safe map of `sid` to [Session].
#[derive(Clone, Default)]
pub struct SessionTable {
    inner: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Session) {
        self.inner.write().await.insert(session.sid.clone(), session);
    }

    /// A point-in-time copy of one session.
    pub async fn snapshot(&self, sid: &str) -> Option<Session> {
        self.inner.read().await.get(sid).cloned()
    }

    /// The freshest ready session whose granted scopes include `scope`.
    /// Ties on `obtained_at` break deterministically by `sid`.
    pub async fn select_ready_for_scope(&self, scope: &str, now: u64) -> Option<Session> {
        self.inner
            .read()
            .await
            .values()
            .filter(|session| session.is_ready(now))
            .filter(|session| session.requested_scopes.iter().any(|held| held == scope))
            .max_by(|a, b| {
                a.obtained_at
                    .cmp(&b.obtained_at)
                    .then_with(|| a.sid.cmp(&b.sid))
            })
            .cloned()
    }

    /// Whether any ready session covers `scope`.
    pub async fn any_ready_for_scope(&self, scope: &str, now: u64) -> bool {
        self.select_ready_for_scope(scope, now).await.is_some()
    }

    /// Atomically store the token material for `sid` and mark it used.
    ///
    /// The used-check happens under the write lock, so a replayed callback
    /// cannot finalize the same session twice.
    pub async fn finalize(
        &self,
        sid: &str,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: u64,
        now: u64,
    ) -> Result<(), FinalizeError> {
        let mut sessions = self.inner.write().await;
        let session = sessions.get_mut(sid).ok_or(FinalizeError::UnknownSession)?;

        if session.used {
            return Err(FinalizeError::AlreadyUsed);
        }

        session.access_token = Some(access_token);
        session.refresh_token = refresh_token;
        session.expires_at = expires_at;
        session.obtained_at = now;
        session.used = true;
        session.pkce.verifier = None;

        Ok(())
    }

    /// Drop a session's token (local revocation). The session stays in the
    /// table but stops serving traffic.
    pub async fn clear_token(&self, sid: &str) {
        if let Some(session) = self.inner.write().await.get_mut(sid) {
            session.access_token = None;
            session.refresh_token = None;
        }
    }

    /// Drop every session; returns how many were cleared.
    pub async fn reset(&self) -> usize {
        let mut sessions = self.inner.write().await;
        let count = sessions.len();
        sessions.clear();
        count
    }
}
