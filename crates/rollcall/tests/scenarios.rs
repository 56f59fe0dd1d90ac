//! End-to-end identity scenarios against the seeded cast.

use std::sync::Arc;

use rollcall::core::AuditKind;
use rollcall::store::SqliteStore;
use rollcall::{IdentityConfig, IdentityError, IdentityService, SessionIdentityState, StateError};
use rollcall_testkit::{cast, seed, FailingAuditStore, TestFixture, PASSWORD};

#[tokio::test]
async fn admin_impersonates_and_returns() {
    let fixture = TestFixture::new().await;
    let service = &fixture.service;
    let token = fixture.login("ada").await;

    service
        .start_impersonation(&token, cast::TARGET)
        .await
        .unwrap();
    let identity = service.current_identity(&token).await.unwrap();
    assert_eq!(identity.principal.id, cast::TARGET);
    assert!(identity.is_impersonating);
    assert_eq!(identity.original_principal_id, Some(cast::ADMIN));

    let restored = service.stop_impersonation(&token).await.unwrap();
    assert_eq!(restored.principal.id, cast::ADMIN);

    let identity = service.current_identity(&token).await.unwrap();
    assert_eq!(identity.principal.id, cast::ADMIN);
    assert!(!identity.is_impersonating);
    assert_eq!(identity.original_principal_id, None);
}

#[tokio::test]
async fn non_elevated_principal_is_refused() {
    let fixture = TestFixture::new().await;
    let token = fixture.login("carl").await;

    let err = fixture
        .service
        .start_impersonation(&token, cast::STAFF)
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::Authorization(_)));
    assert_eq!(
        fixture.state(&token).await,
        Some(SessionIdentityState::normal(cast::CLERK))
    );
}

#[tokio::test]
async fn second_start_without_stop_conflicts() {
    let fixture = TestFixture::new().await;
    let service = &fixture.service;
    let token = fixture.login("ada").await;

    service
        .start_impersonation(&token, cast::TARGET)
        .await
        .unwrap();
    let err = service
        .start_impersonation(&token, cast::MANAGER)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IdentityError::State(StateError::AlreadyImpersonating)
    ));

    let identity = service.current_identity(&token).await.unwrap();
    assert_eq!(identity.principal.id, cast::TARGET);
    assert_eq!(identity.original_principal_id, Some(cast::ADMIN));
}

#[tokio::test]
async fn logout_while_impersonating_tears_down_everything() {
    let fixture = TestFixture::new().await;
    let service = &fixture.service;
    let token = fixture.login("ada").await;

    service
        .start_impersonation(&token, cast::TARGET)
        .await
        .unwrap();
    service.logout(&token).await.unwrap();

    assert_eq!(fixture.state(&token).await, None);
    assert!(matches!(
        service.current_identity(&token).await,
        Err(IdentityError::Unauthenticated)
    ));
    assert!(matches!(
        service.stop_impersonation(&token).await,
        Err(IdentityError::Unauthenticated)
    ));

    service.flush_audit().await;
    let logout = service
        .recent_audit(20)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.kind == AuditKind::Logout)
        .unwrap();
    assert_eq!(logout.actor_principal_id, Some(cast::ADMIN));
    assert_eq!(logout.target_principal_id, Some(cast::TARGET));
}

#[tokio::test]
async fn inactive_principals_cannot_log_in_or_be_targeted() {
    let fixture = TestFixture::new().await;
    let service = &fixture.service;

    assert!(matches!(
        service.login("ivy", PASSWORD, None).await,
        Err(IdentityError::Authentication)
    ));

    let token = fixture.login("ada").await;
    assert!(matches!(
        service.start_impersonation(&token, cast::INACTIVE).await,
        Err(IdentityError::NotFound(_))
    ));
}

#[tokio::test]
async fn impersonating_a_facility_manager_uses_their_scope() {
    let fixture = TestFixture::new().await;
    let service = &fixture.service;
    let token = fixture.login("ada").await;

    let imp = service
        .start_impersonation(&token, cast::MANAGER)
        .await
        .unwrap();
    assert!(imp.impersonated.permissions.grants("shifts.manage"));
    assert!(!imp.impersonated.permissions.grants("invoices.manage"));
    assert!(
        service
            .has_permission_in(&token, "staff.manage", cast::FACILITY)
            .await
    );
    assert!(
        !service
            .has_permission_in(&token, "staff.manage", rollcall::core::FacilityId(1000))
            .await
    );
}

#[tokio::test]
async fn audit_outage_never_fails_identity_operations() {
    let service = IdentityService::new(FailingAuditStore::new(), IdentityConfig::default()).unwrap();
    seed(&service).await;

    assert!(service.login("ada", "wrong", None).await.is_err());
    let token = service.login("ada", PASSWORD, None).await.unwrap().token;
    service
        .start_impersonation(&token, cast::TARGET)
        .await
        .unwrap();
    service.stop_impersonation(&token).await.unwrap();
    service
        .switch_role(&token, &rollcall::Role::from("staff"))
        .await
        .unwrap();
    service.logout(&token).await.unwrap();

    service.flush_audit().await;
    assert!(service.recent_audit(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn every_transition_is_audited() {
    let fixture = TestFixture::new().await;
    let service = &fixture.service;

    let _ = service.login("ada", "wrong", None).await;
    let token = fixture.login("ada").await;
    service
        .start_impersonation(&token, cast::TARGET)
        .await
        .unwrap();
    service.stop_impersonation(&token).await.unwrap();
    service
        .switch_role(&token, &rollcall::Role::from("billing"))
        .await
        .unwrap();
    service.logout(&token).await.unwrap();

    service.flush_audit().await;
    let mut kinds: Vec<_> = service
        .recent_audit(20)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    kinds.sort_by_key(|k| k.as_str());

    let mut expected = vec![
        AuditKind::LoginFailed,
        AuditKind::Login,
        AuditKind::ImpersonationStarted,
        AuditKind::ImpersonationStopped,
        AuditKind::RoleSwitched,
        AuditKind::Logout,
    ];
    expected.sort_by_key(|k| k.as_str());
    assert_eq!(kinds, expected);

    let started = service
        .recent_audit(20)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.kind == AuditKind::ImpersonationStarted)
        .unwrap();
    assert_eq!(started.actor_principal_id, Some(cast::ADMIN));
    assert_eq!(started.target_principal_id, Some(cast::TARGET));
}

#[tokio::test]
async fn sqlite_sessions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identity.db");

    let token = {
        let store = SqliteStore::open(&path).unwrap();
        let service = IdentityService::new(store, IdentityConfig::default()).unwrap();
        seed(&service).await;
        let token = service.login("ada", PASSWORD, None).await.unwrap().token;
        service
            .start_impersonation(&token, cast::TARGET)
            .await
            .unwrap();
        service.flush_audit().await;
        token
    };

    let store = SqliteStore::open(&path).unwrap();
    let service = Arc::new(IdentityService::new(store, IdentityConfig::default()).unwrap());

    let identity = service.current_identity(&token).await.unwrap();
    assert_eq!(identity.principal.id, cast::TARGET);
    assert_eq!(identity.original_principal_id, Some(cast::ADMIN));

    let restored = service.stop_impersonation(&token).await.unwrap();
    assert_eq!(restored.principal.id, cast::ADMIN);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("race.db")).unwrap();
    let service = Arc::new(IdentityService::new(store, IdentityConfig::default()).unwrap());
    seed(&*service).await;
    let token = service.login("ada", PASSWORD, None).await.unwrap().token;

    let targets = [cast::TARGET, cast::MANAGER, cast::STAFF, cast::CLERK];
    let mut handles = Vec::new();
    for i in 0..12 {
        let service = service.clone();
        let target = targets[i % targets.len()];
        handles.push(tokio::spawn(async move {
            service.start_impersonation(&token, target).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(IdentityError::State(StateError::AlreadyImpersonating)) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!(wins, 1);

    let identity = service.current_identity(&token).await.unwrap();
    assert!(identity.is_impersonating);
    assert_eq!(identity.original_principal_id, Some(cast::ADMIN));
}
