/// Walks one persistent-session lifecycle against the configured
/// store: issue on login, silent re-authentication with rotation,
/// replay of the consumed token, renewal, logout.
///
/// The redis backend expects a reachable server:
/// `cargo run --bin rotation_demo -- --settings=settings/dev.toml`
use keepsake::domain::{
    PersistentSession, PersistentSessionManager, RequestContext,
};
use keepsake::domain_model::{LookupClauses, TokenId, UserId};
use keepsake::domain_port::{
    IdentityError, IdentityResolver, SessionGateway, SessionGatewayError, TokenStore,
};
use keepsake::infra_memory::MemoryTokenStore;
use keepsake::infra_redis::RedisTokenStore;
use keepsake::logger::*;
use keepsake::settings::*;
use std::sync::{Arc, Mutex};

/// Treats every well-formed id clause as a live account.
struct DirectoryResolver;

#[async_trait::async_trait]
impl IdentityResolver for DirectoryResolver {
    async fn resolve(&self, clauses: &LookupClauses) -> Result<Option<UserId>, IdentityError> {
        Ok(clauses.user_id().ok())
    }
}

#[derive(Default)]
struct DemoGateway {
    current: Mutex<Option<UserId>>,
}

#[async_trait::async_trait]
impl SessionGateway for DemoGateway {
    async fn current_user(&self, _ctx: &RequestContext) -> Option<UserId> {
        self.current.lock().unwrap().clone()
    }

    async fn establish(
        &self,
        ctx: &mut RequestContext,
        user: &UserId,
    ) -> Result<(), SessionGatewayError> {
        info!(%user, fingerprint = ?ctx.incoming_session_metadata.fingerprint, "primary session established");
        *self.current.lock().unwrap() = Some(user.clone());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();
    let settings = parse_settings(cli.settings.as_deref())?;
    let log = Log {
        filter: cli.log_filter.unwrap_or_else(|| settings.log.filter.clone()),
    };
    logger.reload_from_settings(&log)?;

    let store: Arc<dyn TokenStore> = match settings.store_backend() {
        "redis" => {
            let redis_settings = settings
                .redis
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("redis backend selected but [redis] missing"))?;
            let client = redis::Client::open(redis_settings.url.as_str())?;
            let conn = client.get_connection_manager().await?;
            Arc::new(RedisTokenStore::new(conn, redis_settings.key_prefix.clone()))
        }
        _ => Arc::new(MemoryTokenStore::new()),
    };

    let gateway = Arc::new(DemoGateway::default());
    let manager = PersistentSessionManager::new(
        store,
        Arc::new(DirectoryResolver),
        gateway.clone(),
        settings.persistent_session.to_config(),
    );

    // login: the surrounding login flow calls create
    let user = UserId::from("42");
    let mut login = RequestContext::new();
    login.incoming_session_metadata.fingerprint = Some("device-a".into());
    let issued = manager.create(&mut login, &user).await?;
    info!(%issued, "token issued on login");

    // primary session expired; the cookie comes back alone
    let mut revisit = RequestContext::with_cookie(issued.clone());
    revisit.incoming_session_metadata.fingerprint = Some("device-a".into());
    let who = manager.authenticate(&mut revisit).await?;
    let rotated = TokenId(revisit.response_cookie().unwrap().value.clone());
    info!(?who, %rotated, "silent re-authentication rotated the token");

    // replaying the consumed token gets nobody
    *gateway.current.lock().unwrap() = None;
    let mut replay = RequestContext::with_cookie(issued);
    let who = manager.authenticate(&mut replay).await?;
    info!(?who, cookie = ?replay.response_cookie(), "replay of consumed token");

    // ordinary request with a live primary session just renews
    *gateway.current.lock().unwrap() = Some(user.clone());
    let mut browse = RequestContext::with_cookie(rotated.clone());
    manager.authenticate(&mut browse).await?;
    info!(cookie = ?browse.response_cookie(), "cookie renewed in place");

    // logout
    let mut logout = RequestContext::with_cookie(rotated);
    manager.delete(&mut logout).await?;
    info!(cookie = ?logout.response_cookie(), "token revoked on logout");

    Ok(())
}
