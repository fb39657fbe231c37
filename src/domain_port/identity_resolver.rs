use crate::domain_model::{LookupClauses, UserId};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity backend error: {0}")]
    Backend(String),
}

/// Maps stored lookup clauses back to a live account.
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `None` means no matching account (deleted or disabled); the
    /// request then proceeds unauthenticated.
    async fn resolve(&self, clauses: &LookupClauses) -> Result<Option<UserId>, IdentityError>;
}
