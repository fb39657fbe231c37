use crate::domain_model::{RecordIntegrityError, SessionMetadata, TokenId, TokenMetadata, UserId};
use crate::domain_port::{IdentityError, SessionGatewayError, TokenStoreError};

// region request context

pub const DEFAULT_COOKIE_NAME: &str = "persistent_session_cookie";

/// What the manager wants written on the response. Header encoding and
/// signing stay with the surrounding HTTP framework.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieDirective {
    pub name: String,
    pub value: String,
    pub max_age_secs: i64,
    pub path: &'static str,
}

impl CookieDirective {
    pub fn issue(name: &str, token: &TokenId, max_age_secs: i64) -> Self {
        CookieDirective {
            name: name.to_string(),
            value: token.0.clone(),
            max_age_secs,
            path: "/",
        }
    }

    /// Empty value, already-expired max-age: the browser drops it.
    pub fn expire(name: &str) -> Self {
        CookieDirective {
            name: name.to_string(),
            value: String::new(),
            max_age_secs: -1,
            path: "/",
        }
    }
}

/// Per-request state the manager reads and writes. The transport layer
/// seeds the presented cookie and the metadata bags, then applies the
/// response cookie directive on the way out.
#[derive(Debug, Default)]
pub struct RequestContext {
    presented_token: Option<TokenId>,
    response_cookie: Option<CookieDirective>,
    /// Metadata of the current primary session, e.g. a freshly
    /// captured fingerprint. Set upstream.
    pub incoming_session_metadata: SessionMetadata,
    /// Metadata staged for the next issued token. Set upstream or by
    /// redemption.
    pub outgoing_persistent_metadata: TokenMetadata,
}

impl RequestContext {
    pub fn new() -> Self {
        RequestContext::default()
    }

    pub fn with_cookie(token: TokenId) -> Self {
        RequestContext {
            presented_token: Some(token),
            ..Default::default()
        }
    }

    pub fn presented_token(&self) -> Option<&TokenId> {
        self.presented_token.as_ref()
    }

    pub fn response_cookie(&self) -> Option<&CookieDirective> {
        self.response_cookie.as_ref()
    }

    pub(crate) fn set_response_cookie(&mut self, cookie: CookieDirective) {
        self.response_cookie = Some(cookie);
    }
}

// endregion


// region persistent session service

#[derive(Debug, thiserror::Error)]
pub enum PersistentSessionError {
    /// Integrity fault: the stored record is not the recognized shape.
    /// Never swallowed; redemption aborts.
    #[error("corrupted token record: {0}")]
    CorruptRecord(String),
    #[error("identity error: {0}")]
    Identity(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("store error: {0}")]
    Store(String),
}

impl From<TokenStoreError> for PersistentSessionError {
    fn from(err: TokenStoreError) -> Self {
        PersistentSessionError::Store(err.to_string())
    }
}

impl From<IdentityError> for PersistentSessionError {
    fn from(err: IdentityError) -> Self {
        PersistentSessionError::Identity(err.to_string())
    }
}

impl From<SessionGatewayError> for PersistentSessionError {
    fn from(err: SessionGatewayError) -> Self {
        PersistentSessionError::Session(err.to_string())
    }
}

impl From<RecordIntegrityError> for PersistentSessionError {
    fn from(err: RecordIntegrityError) -> Self {
        PersistentSessionError::CorruptRecord(err.0)
    }
}

/// Persistent ("remember me") login continuity across primary-session
/// expiry. Tokens are single-use: every successful redemption rotates
/// to a fresh id.
#[async_trait::async_trait]
pub trait PersistentSession: Send + Sync {
    /// Issue a new token for an authenticated user and set the cookie.
    /// Any token already on the request is revoked first.
    async fn create(
        &self,
        ctx: &mut RequestContext,
        user: &UserId,
    ) -> Result<TokenId, PersistentSessionError>;

    /// Revoke the request's token, if any. Idempotent.
    async fn delete(&self, ctx: &mut RequestContext) -> Result<(), PersistentSessionError>;

    /// Attempt silent re-authentication from the presented token, then
    /// ensure the response cookie is fresh. Returns the re-established
    /// user, or `None` when the request proceeds unauthenticated or a
    /// primary session already exists.
    async fn authenticate(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<Option<UserId>, PersistentSessionError>;
}

// endregion
