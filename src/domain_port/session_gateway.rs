use crate::domain::RequestContext;
use crate::domain_model::UserId;

#[derive(Debug, thiserror::Error)]
pub enum SessionGatewayError {
    #[error("session error: {0}")]
    Session(String),
}

/// The primary session/authentication plug sitting in front of this
/// component in the pipeline.
#[async_trait::async_trait]
pub trait SessionGateway: Send + Sync {
    /// User already authenticated by the primary session, if any.
    async fn current_user(&self, ctx: &RequestContext) -> Option<UserId>;

    /// Establish a fresh primary session for `user` on this request.
    async fn establish(
        &self,
        ctx: &mut RequestContext,
        user: &UserId,
    ) -> Result<(), SessionGatewayError>;
}
