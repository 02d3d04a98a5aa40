use domain::ScopeContext;
use domain::permissions::{DEVICE_CONNECTION_READ, DEVICE_CONNECTION_WRITE};
use kapua_auth::{
    AuthError, AuthorizationService, ContextAuthorizationService, StoreUserNameResolver,
    UserNameResolver,
};
use kapua_storage::{InMemoryUserStore, UserRecord};
use std::sync::Arc;

fn reader(scope_id: &str) -> ScopeContext {
    ScopeContext::new(
        scope_id,
        "u-1",
        vec!["operator".to_string()],
        vec![DEVICE_CONNECTION_READ.to_string()],
    )
}

#[test]
fn permission_granted_in_own_scope() {
    let auth = ContextAuthorizationService::new();
    let ctx = reader("1");
    auth.check_permission(&ctx, DEVICE_CONNECTION_READ, "1")
        .expect("granted");
    assert!(!auth.is_permitted(&ctx, DEVICE_CONNECTION_WRITE, "1"));
}

#[test]
fn other_scope_denied() {
    let auth = ContextAuthorizationService::new();
    let err = auth
        .check_permission(&reader("1"), DEVICE_CONNECTION_READ, "2")
        .expect_err("denied");
    assert!(matches!(err, AuthError::PermissionDenied { .. }));
}

#[test]
fn privileged_context_crosses_scopes() {
    let auth = ContextAuthorizationService::new();
    let ctx = ScopeContext::privileged("1", "broker");
    assert!(auth.is_permitted(&ctx, DEVICE_CONNECTION_WRITE, "42"));
}

#[tokio::test]
async fn resolves_user_names() {
    let users = InMemoryUserStore::with_users([UserRecord {
        scope_id: "1".to_string(),
        user_id: "u-1".to_string(),
        username: "kapua-sys".to_string(),
    }]);
    let resolver = StoreUserNameResolver::new(Arc::new(users));
    let name = resolver.resolve_name("1", "u-1").await.expect("resolve");
    assert_eq!(name.as_deref(), Some("kapua-sys"));
    assert!(
        resolver
            .resolve_name("1", "u-2")
            .await
            .expect("resolve")
            .is_none()
    );
}
