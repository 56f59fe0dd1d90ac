//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a fixed cast of principals
//! seeded into a fresh store, and a store whose audit sink always fails.

use std::sync::Arc;

use async_trait::async_trait;

use rollcall::{IdentityConfig, IdentityService, IdentityStore};
use rollcall_core::{
    AuditEvent, FacilityId, PasswordHash, Principal, PrincipalId, Role, SessionIdentityState,
    SessionToken,
};
use rollcall_store::{
    AuditSink, Credential, CredentialStore, MemoryStore, SessionRecord, SessionStore,
    StoreError, SwapResult,
};

/// The password every cast member logs in with.
pub const PASSWORD: &str = "correct horse battery staple";

/// The seeded cast.
pub mod cast {
    use rollcall_core::{FacilityId, PrincipalId};

    /// `ada`, super_admin: may impersonate and switch roles.
    pub const ADMIN: PrincipalId = PrincipalId(1);
    /// `sam`, staff.
    pub const STAFF: PrincipalId = PrincipalId(5);
    /// `carl`, admin: broad access but not elevated.
    pub const CLERK: PrincipalId = PrincipalId(7);
    /// `ivy`, staff, deactivated.
    pub const INACTIVE: PrincipalId = PrincipalId(13);
    /// `nina`, staff: the usual impersonation target.
    pub const TARGET: PrincipalId = PrincipalId(42);
    /// `fred`, facility_manager at [`FACILITY`].
    pub const MANAGER: PrincipalId = PrincipalId(99);
    /// A facility that only `fred` is associated with.
    pub const FACILITY: FacilityId = FacilityId(3);
    /// An id no principal uses.
    pub const NOBODY: PrincipalId = PrincipalId(404);
}

/// Username, principal pairs for the whole cast.
pub fn cast_members() -> Vec<(&'static str, Principal)> {
    vec![
        (
            "ada",
            Principal::new(cast::ADMIN, "Ada Admin", Role::from("super_admin")),
        ),
        ("sam", Principal::new(cast::STAFF, "Sam Staff", Role::from("staff"))),
        ("carl", Principal::new(cast::CLERK, "Carl Clerk", Role::from("admin"))),
        (
            "ivy",
            Principal::new(cast::INACTIVE, "Ivy Inactive", Role::from("staff")).deactivated(),
        ),
        ("nina", Principal::new(cast::TARGET, "Nina Nurse", Role::from("staff"))),
        (
            "fred",
            Principal::new(cast::MANAGER, "Fred Manager", Role::from("facility_manager"))
                .with_facilities([cast::FACILITY, FacilityId(8)]),
        ),
    ]
}

/// Provision the whole cast into `service`.
pub async fn seed<S: IdentityStore>(service: &IdentityService<S>) {
    for (username, principal) in cast_members() {
        if let Err(e) = service.provision(username, PASSWORD, principal).await {
            panic!("seeding {} failed: {}", username, e);
        }
    }
}

/// A seeded identity service over a fresh in-memory store.
pub struct TestFixture {
    pub service: Arc<IdentityService<MemoryStore>>,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(IdentityConfig::default()).await
    }

    pub async fn with_config(config: IdentityConfig) -> Self {
        let service = match IdentityService::new(MemoryStore::new(), config) {
            Ok(service) => service,
            Err(e) => panic!("building test service failed: {}", e),
        };
        seed(&service).await;
        Self {
            service: Arc::new(service),
        }
    }

    /// Log a cast member in and return the session token.
    pub async fn login(&self, username: &str) -> SessionToken {
        match self.service.login(username, PASSWORD, None).await {
            Ok(outcome) => outcome.token,
            Err(e) => panic!("login as {} failed: {}", username, e),
        }
    }

    /// The raw session state, bypassing principal resolution.
    pub async fn state(&self, token: &SessionToken) -> Option<SessionIdentityState> {
        match self
            .service
            .store()
            .get_session(token, rollcall_core::now_millis())
            .await
        {
            Ok(record) => record.map(|r| r.state),
            Err(e) => panic!("reading session failed: {}", e),
        }
    }
}

/// A memory store whose audit sink refuses every write.
///
/// Identity operations over it must behave exactly as over a healthy store.
#[derive(Default)]
pub struct FailingAuditStore {
    inner: MemoryStore,
}

impl FailingAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for FailingAuditStore {
    async fn create_session(
        &self,
        token: &SessionToken,
        record: &SessionRecord,
    ) -> rollcall_store::Result<()> {
        self.inner.create_session(token, record).await
    }

    async fn get_session(
        &self,
        token: &SessionToken,
        now: i64,
    ) -> rollcall_store::Result<Option<SessionRecord>> {
        self.inner.get_session(token, now).await
    }

    async fn compare_and_swap(
        &self,
        token: &SessionToken,
        expected: &SessionIdentityState,
        new: &SessionIdentityState,
        now: i64,
    ) -> rollcall_store::Result<SwapResult> {
        self.inner.compare_and_swap(token, expected, new, now).await
    }

    async fn delete_session(
        &self,
        token: &SessionToken,
    ) -> rollcall_store::Result<Option<SessionRecord>> {
        self.inner.delete_session(token).await
    }

    async fn purge_expired(&self, now: i64) -> rollcall_store::Result<u64> {
        self.inner.purge_expired(now).await
    }
}

#[async_trait]
impl CredentialStore for FailingAuditStore {
    async fn insert_principal(
        &self,
        username: &str,
        password: &PasswordHash,
        principal: &Principal,
    ) -> rollcall_store::Result<()> {
        self.inner.insert_principal(username, password, principal).await
    }

    async fn find_credential(&self, username: &str) -> rollcall_store::Result<Option<Credential>> {
        self.inner.find_credential(username).await
    }

    async fn get_principal(&self, id: PrincipalId) -> rollcall_store::Result<Option<Principal>> {
        self.inner.get_principal(id).await
    }

    async fn set_role(
        &self,
        id: PrincipalId,
        role: &Role,
    ) -> rollcall_store::Result<Option<Principal>> {
        self.inner.set_role(id, role).await
    }

    async fn set_active(
        &self,
        id: PrincipalId,
        active: bool,
    ) -> rollcall_store::Result<Option<Principal>> {
        self.inner.set_active(id, active).await
    }

    async fn next_principal_id(&self) -> rollcall_store::Result<PrincipalId> {
        self.inner.next_principal_id().await
    }
}

#[async_trait]
impl AuditSink for FailingAuditStore {
    async fn append_audit(&self, _event: &AuditEvent) -> rollcall_store::Result<()> {
        Err(StoreError::Unavailable("audit sink offline".into()))
    }

    async fn recent_audit(&self, _limit: usize) -> rollcall_store::Result<Vec<AuditEvent>> {
        Ok(Vec::new())
    }
}
