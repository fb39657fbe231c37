use crate::domain::{
    CookieDirective, DEFAULT_COOKIE_NAME, PersistentSession, PersistentSessionError,
    RequestContext,
};
use crate::domain_model::{SessionMetadata, TokenId, TokenMetadata, TokenRecord, UserId};
use crate::domain_port::{IdentityResolver, SessionGateway, TokenStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PersistentSessionConfig {
    pub cookie_name: String,
    /// Prefix for generated token ids when several applications share
    /// a cookie domain.
    pub namespace: Option<String>,
    /// Drives both the store TTL and the cookie max-age.
    pub ttl: Duration,
    /// Deprecated seconds override for the cookie max-age. Settings
    /// loading warns when this is set.
    pub cookie_max_age_override_secs: Option<i64>,
}

impl PersistentSessionConfig {
    pub fn new(ttl: Duration) -> Self {
        PersistentSessionConfig {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            namespace: None,
            ttl,
            cookie_max_age_override_secs: None,
        }
    }

    fn cookie_max_age_secs(&self) -> i64 {
        self.cookie_max_age_override_secs
            .unwrap_or(self.ttl.as_secs() as i64)
    }
}

// region decision steps

/// Metadata for the next issued token: the staged bag as-is, with the
/// current session's fingerprint filling a gap. First write wins; an
/// explicit staged fingerprint is never overwritten.
fn next_token_metadata(staged: TokenMetadata, incoming: &SessionMetadata) -> TokenMetadata {
    let mut metadata = staged;
    if let Some(fp) = &incoming.fingerprint {
        let session = metadata.session_metadata.get_or_insert_with(Default::default);
        if session.fingerprint.is_none() {
            session.fingerprint = Some(fp.clone());
        }
    }
    metadata
}

/// What a redeemed record contributes to the rest of the request.
struct RedemptionOutcome {
    /// Staged bag for the rotated token. The fingerprint is stripped
    /// from the merged bag: the new token only ever gets the
    /// fingerprint of the current request.
    next_outgoing: TokenMetadata,
    /// Session bag for the new primary session. Live values win;
    /// redeemed values only fill gaps.
    patched_incoming: SessionMetadata,
}

fn redemption_outcome(
    record: &TokenRecord,
    staged_outgoing: TokenMetadata,
    current_incoming: SessionMetadata,
) -> RedemptionOutcome {
    let mut next_outgoing = staged_outgoing;
    if let Some(redeemed) = record.metadata.session_metadata.clone() {
        let merged = match next_outgoing.session_metadata.take() {
            Some(staged) => staged.merged_over(&redeemed),
            None => redeemed,
        };
        next_outgoing.session_metadata = Some(merged.without_fingerprint());
    }

    let mut patched_incoming = current_incoming;
    if let Some(redeemed) = &record.metadata.session_metadata {
        patched_incoming.fill_gaps_from(redeemed);
    } else if let Some(fp) = &record.metadata.fingerprint {
        // pre-envelope tokens carried a single flat fingerprint
        if patched_incoming.fingerprint.is_none() {
            patched_incoming.fingerprint = Some(fp.clone());
        }
    }

    RedemptionOutcome {
        next_outgoing,
        patched_incoming,
    }
}

// endregion

pub struct PersistentSessionManager {
    store: Arc<dyn TokenStore>,
    identity: Arc<dyn IdentityResolver>,
    gateway: Arc<dyn SessionGateway>,
    config: PersistentSessionConfig,
}

impl PersistentSessionManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        identity: Arc<dyn IdentityResolver>,
        gateway: Arc<dyn SessionGateway>,
        config: PersistentSessionConfig,
    ) -> Self {
        Self {
            store,
            identity,
            gateway,
            config,
        }
    }

    async fn redeem(
        &self,
        ctx: &mut RequestContext,
        token: &TokenId,
    ) -> Result<Option<UserId>, PersistentSessionError> {
        // Single use: the presented token is consumed before anything
        // else can fail, closing the replay window.
        let record = self.store.take(token).await?;
        self.delete(ctx).await?;

        let Some(record) = record else {
            debug!(%token, "token not in store; proceeding unauthenticated");
            return Ok(None);
        };

        // Shape validation before resolution; a bad shape aborts.
        let claimed = record.lookup_clauses.user_id()?;
        debug!(user_id = %claimed, "redeeming persistent token");

        let Some(user) = self.identity.resolve(&record.lookup_clauses).await? else {
            debug!(user_id = %claimed, "no live account for redeemed token");
            return Ok(None);
        };

        let outcome = redemption_outcome(
            &record,
            std::mem::take(&mut ctx.outgoing_persistent_metadata),
            ctx.incoming_session_metadata.clone(),
        );

        // Rotate before the incoming bag is patched: the new token's
        // fingerprint must come from the live request, never from the
        // redeemed record.
        ctx.outgoing_persistent_metadata = outcome.next_outgoing;
        self.create(ctx, &user).await?;

        ctx.incoming_session_metadata = outcome.patched_incoming;
        self.gateway.establish(ctx, &user).await?;

        info!(%user, "persistent session re-established");
        Ok(Some(user))
    }

    fn renew_cookie(&self, ctx: &mut RequestContext) {
        if ctx.response_cookie().is_some() {
            return;
        }
        if let Some(token) = ctx.presented_token().cloned() {
            // same token, sliding expiry
            ctx.set_response_cookie(CookieDirective::issue(
                &self.config.cookie_name,
                &token,
                self.config.cookie_max_age_secs(),
            ));
        }
    }
}

#[async_trait::async_trait]
impl PersistentSession for PersistentSessionManager {
    async fn create(
        &self,
        ctx: &mut RequestContext,
        user: &UserId,
    ) -> Result<TokenId, PersistentSessionError> {
        let metadata = next_token_metadata(
            ctx.outgoing_persistent_metadata.clone(),
            &ctx.incoming_session_metadata,
        );
        let record = TokenRecord::for_user(user, metadata);

        // Revoke any token already on the request before the new
        // cookie is written, so the new cookie wins on the response.
        self.delete(ctx).await?;

        let token = TokenId::generate(self.config.namespace.as_deref());
        self.store.put(&token, &record, self.config.ttl).await?;
        ctx.set_response_cookie(CookieDirective::issue(
            &self.config.cookie_name,
            &token,
            self.config.cookie_max_age_secs(),
        ));

        debug!(%user, %token, "issued persistent token");
        Ok(token)
    }

    async fn delete(&self, ctx: &mut RequestContext) -> Result<(), PersistentSessionError> {
        let Some(token) = ctx.presented_token().cloned() else {
            return Ok(());
        };
        self.store.delete(&token).await?;
        ctx.set_response_cookie(CookieDirective::expire(&self.config.cookie_name));
        debug!(%token, "revoked persistent token");
        Ok(())
    }

    async fn authenticate(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<Option<UserId>, PersistentSessionError> {
        let authenticated = if self.gateway.current_user(ctx).await.is_some() {
            // Primary session already up; leave the token alone.
            None
        } else if let Some(token) = ctx.presented_token().cloned() {
            self.redeem(ctx, &token).await?
        } else {
            None
        };

        self.renew_cookie(ctx);
        Ok(authenticated)
    }
}
