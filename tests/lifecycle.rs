//! End-to-end persistent-session lifecycle against the memory store,
//! driving only the public crate surface.

use keepsake::domain::{
    PersistentSession, PersistentSessionConfig, PersistentSessionManager, RequestContext,
};
use keepsake::domain_model::{LookupClauses, TokenId, UserId};
use keepsake::domain_port::{
    IdentityError, IdentityResolver, SessionGateway, SessionGatewayError, TokenStore,
};
use keepsake::infra_memory::MemoryTokenStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Directory {
    users: Vec<UserId>,
}

#[async_trait::async_trait]
impl IdentityResolver for Directory {
    async fn resolve(&self, clauses: &LookupClauses) -> Result<Option<UserId>, IdentityError> {
        let id = clauses
            .user_id()
            .map_err(|e| IdentityError::Backend(e.to_string()))?;
        Ok(self.users.contains(&id).then_some(id))
    }
}

#[derive(Default)]
struct Gateway {
    current: Mutex<Option<UserId>>,
}

#[async_trait::async_trait]
impl SessionGateway for Gateway {
    async fn current_user(&self, _ctx: &RequestContext) -> Option<UserId> {
        self.current.lock().unwrap().clone()
    }

    async fn establish(
        &self,
        _ctx: &mut RequestContext,
        user: &UserId,
    ) -> Result<(), SessionGatewayError> {
        *self.current.lock().unwrap() = Some(user.clone());
        Ok(())
    }
}

fn pipeline() -> (Arc<MemoryTokenStore>, Arc<Gateway>, PersistentSessionManager) {
    let store = Arc::new(MemoryTokenStore::new());
    let gateway = Arc::new(Gateway::default());
    let manager = PersistentSessionManager::new(
        store.clone(),
        Arc::new(Directory {
            users: vec![UserId::from("42")],
        }),
        gateway.clone(),
        PersistentSessionConfig::new(Duration::from_millis(2_592_000_000)),
    );
    (store, gateway, manager)
}

fn cookie_token(ctx: &RequestContext) -> TokenId {
    TokenId(ctx.response_cookie().expect("cookie set").value.clone())
}

#[tokio::test]
async fn login_rotate_browse_logout() {
    let (store, gateway, manager) = pipeline();
    let user = UserId::from("42");

    // fresh login
    let mut login = RequestContext::new();
    login.incoming_session_metadata.fingerprint = Some("device-a".into());
    let issued = manager.create(&mut login, &user).await.unwrap();
    assert_eq!(login.response_cookie().unwrap().max_age_secs, 2_592_000);
    assert_eq!(store.len(), 1);

    // primary session gone, cookie comes back: silent re-auth + rotation
    let mut revisit = RequestContext::with_cookie(issued.clone());
    revisit.incoming_session_metadata.fingerprint = Some("device-a".into());
    let who = manager.authenticate(&mut revisit).await.unwrap();
    assert_eq!(who, Some(user.clone()));
    assert_eq!(*gateway.current.lock().unwrap(), Some(user.clone()));

    let rotated = cookie_token(&revisit);
    assert_ne!(rotated, issued);
    assert_eq!(store.len(), 1);
    assert!(store.get(&issued).await.unwrap().is_none());

    // browsing with the primary session alive only slides the expiry
    let mut browse = RequestContext::with_cookie(rotated.clone());
    let who = manager.authenticate(&mut browse).await.unwrap();
    assert_eq!(who, None);
    assert_eq!(cookie_token(&browse), rotated);
    assert!(store.get(&rotated).await.unwrap().is_some());

    // replaying the consumed login token authenticates nobody
    *gateway.current.lock().unwrap() = None;
    let mut replay = RequestContext::with_cookie(issued);
    let who = manager.authenticate(&mut replay).await.unwrap();
    assert_eq!(who, None);
    assert_eq!(*gateway.current.lock().unwrap(), None);

    // logout revokes record and cookie
    let mut logout = RequestContext::with_cookie(rotated.clone());
    manager.delete(&mut logout).await.unwrap();
    assert!(store.is_empty());
    let cleared = logout.response_cookie().unwrap();
    assert_eq!(cleared.value, "");
    assert_eq!(cleared.max_age_secs, -1);

    // and a later visit with the dead cookie stays unauthenticated
    let mut after = RequestContext::with_cookie(rotated);
    assert_eq!(manager.authenticate(&mut after).await.unwrap(), None);
}

#[tokio::test]
async fn fingerprint_follows_the_device_across_rotations() {
    let (store, _gateway, manager) = pipeline();
    let user = UserId::from("42");

    let mut login = RequestContext::new();
    login.incoming_session_metadata.fingerprint = Some("laptop".into());
    let issued = manager.create(&mut login, &user).await.unwrap();

    // cookie replayed from a different device fingerprint
    let mut revisit = RequestContext::with_cookie(issued);
    revisit.incoming_session_metadata.fingerprint = Some("phone".into());
    manager.authenticate(&mut revisit).await.unwrap();

    let rotated = cookie_token(&revisit);
    let record = store.get(&rotated).await.unwrap().unwrap();
    assert_eq!(
        record.metadata.session_metadata.unwrap().fingerprint,
        Some("phone".into())
    );

    // the session bag keeps its live fingerprint too
    assert_eq!(
        revisit.incoming_session_metadata.fingerprint,
        Some("phone".into())
    );
}
