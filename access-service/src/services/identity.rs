//! Turns a bearer token into a fully loaded identity.

use std::sync::Arc;
use std::time::Duration;

use super::metrics::record_access_decision;
use super::{JwtService, ServiceError, Store, TokenClaims, TokenDenylist};
use crate::models::UserWithPermissions;

/// The caller of a protected request, attached to request extensions by the
/// authenticate middleware.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: UserWithPermissions,
    pub claims: TokenClaims,
}

impl AuthenticatedUser {
    pub fn id(&self) -> i64 {
        self.identity.id()
    }
}

#[derive(Clone)]
pub struct IdentityResolver {
    jwt: JwtService,
    store: Arc<dyn Store>,
    denylist: Arc<dyn TokenDenylist>,
    store_timeout: Duration,
}

impl IdentityResolver {
    pub fn new(
        jwt: JwtService,
        store: Arc<dyn Store>,
        denylist: Arc<dyn TokenDenylist>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            jwt,
            store,
            denylist,
            store_timeout,
        }
    }

    /// Verify `token` and load its subject with groups and permissions.
    ///
    /// Any verification failure, a revoked `jti`, an unparsable subject, or a
    /// subject that no longer exists is `TokenInvalid`. A denylist or store
    /// that doesn't answer within the timeout is `StoreTimeout`.
    pub async fn resolve(&self, token: &str) -> Result<AuthenticatedUser, ServiceError> {
        let claims = self.jwt.validate(token).map_err(|e| {
            tracing::debug!(error = %e, "Token verification failed");
            record_access_decision("authentication", false);
            ServiceError::TokenInvalid
        })?;

        let revoked = tokio::time::timeout(self.store_timeout, self.denylist.is_denied(&claims.jti))
            .await
            .map_err(|_| {
                tracing::error!(jti = %claims.jti, "Token denylist lookup timed out");
                ServiceError::StoreTimeout
            })?
            .map_err(|e| {
                tracing::error!(error = %e, "Token denylist lookup failed");
                ServiceError::Internal(e)
            })?;
        if revoked {
            tracing::warn!(jti = %claims.jti, "Revoked token presented");
            record_access_decision("authentication", false);
            return Err(ServiceError::TokenInvalid);
        }

        let user_id: i64 = claims.sub.parse().map_err(|_| {
            tracing::warn!(sub = %claims.sub, "Token subject is not a user id");
            record_access_decision("authentication", false);
            ServiceError::TokenInvalid
        })?;

        let identity = tokio::time::timeout(
            self.store_timeout,
            self.store.find_user_with_permissions(user_id),
        )
        .await
        .map_err(|_| {
            tracing::error!(user_id, "Identity store lookup timed out");
            ServiceError::StoreTimeout
        })??;

        let Some(identity) = identity else {
            tracing::warn!(user_id, "Token subject no longer exists");
            record_access_decision("authentication", false);
            return Err(ServiceError::TokenInvalid);
        };

        record_access_decision("authentication", true);
        Ok(AuthenticatedUser { identity, claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JwtConfig, SigningKeyConfig};
    use crate::models::{
        AuthRecord, Group, GroupChanges, NewUser, Permission, PermissionChanges, UserChanges,
    };
    use crate::services::{AuthRecordStore, IdentityStore, MemoryDenylist, MemoryStore};
    use async_trait::async_trait;

    fn jwt() -> JwtService {
        JwtService::new(&JwtConfig {
            signing_key: SigningKeyConfig::Secret("k".repeat(32)),
            login_token_expiry_minutes: 1,
            refresh_token_expiry_minutes: 15,
        })
        .unwrap()
    }

    async fn seeded() -> (Arc<MemoryStore>, UserWithPermissions) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .insert_user(NewUser {
                email: "r@example.com".to_string(),
                name: "R".to_string(),
                password_hash: "hash".to_string(),
                group_ids: vec![],
                permission_ids: vec![],
            })
            .await
            .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn resolves_live_token_to_identity() {
        let (store, user) = seeded().await;
        let jwt = jwt();
        let resolver = IdentityResolver::new(
            jwt.clone(),
            store,
            Arc::new(MemoryDenylist::new()),
            Duration::from_secs(1),
        );

        let token = jwt.issue_login_token(&user.user).unwrap().token;
        let resolved = resolver.resolve(&token).await.unwrap();
        assert_eq!(resolved.id(), user.id());
    }

    #[tokio::test]
    async fn deleted_subject_is_token_invalid() {
        let (store, user) = seeded().await;
        let jwt = jwt();
        let token = jwt.issue_login_token(&user.user).unwrap().token;
        store.delete_user(user.id()).await.unwrap();

        let resolver =
            IdentityResolver::new(jwt, store, Arc::new(MemoryDenylist::new()), Duration::from_secs(1));
        assert!(matches!(
            resolver.resolve(&token).await,
            Err(ServiceError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn revoked_jti_is_token_invalid() {
        let (store, user) = seeded().await;
        let jwt = jwt();
        let denylist = Arc::new(MemoryDenylist::new());
        let token = jwt.issue_login_token(&user.user).unwrap().token;
        let jti = jwt.validate(&token).unwrap().jti;
        denylist.deny(&jti, 60).await.unwrap();

        let resolver = IdentityResolver::new(jwt, store, denylist, Duration::from_secs(1));
        assert!(matches!(
            resolver.resolve(&token).await,
            Err(ServiceError::TokenInvalid)
        ));
    }

    /// Identity store that never answers.
    struct StalledStore;

    #[async_trait]
    impl IdentityStore for StalledStore {
        async fn find_user_with_permissions(
            &self,
            _id: i64,
        ) -> Result<Option<UserWithPermissions>, ServiceError> {
            std::future::pending().await
        }
        async fn find_user_by_email(&self, _: &str) -> Result<Option<UserWithPermissions>, ServiceError> {
            Ok(None)
        }
        async fn list_users(&self) -> Result<Vec<UserWithPermissions>, ServiceError> {
            Ok(vec![])
        }
        async fn insert_user(&self, _: NewUser) -> Result<UserWithPermissions, ServiceError> {
            Err(ServiceError::StoreTimeout)
        }
        async fn update_user(
            &self,
            _: i64,
            _: UserChanges,
        ) -> Result<Option<UserWithPermissions>, ServiceError> {
            Ok(None)
        }
        async fn delete_user(&self, _: i64) -> Result<bool, ServiceError> {
            Ok(false)
        }
        async fn list_groups(&self) -> Result<Vec<Group>, ServiceError> {
            Ok(vec![])
        }
        async fn find_group(&self, _: i64) -> Result<Option<Group>, ServiceError> {
            Ok(None)
        }
        async fn find_group_by_code(&self, _: &str) -> Result<Option<Group>, ServiceError> {
            Ok(None)
        }
        async fn insert_group(&self, _: GroupChanges) -> Result<Group, ServiceError> {
            Err(ServiceError::StoreTimeout)
        }
        async fn update_group(&self, _: i64, _: GroupChanges) -> Result<Option<Group>, ServiceError> {
            Ok(None)
        }
        async fn delete_group(&self, _: i64) -> Result<bool, ServiceError> {
            Ok(false)
        }
        async fn list_permissions(&self) -> Result<Vec<Permission>, ServiceError> {
            Ok(vec![])
        }
        async fn find_permission(&self, _: i64) -> Result<Option<Permission>, ServiceError> {
            Ok(None)
        }
        async fn find_permission_by_code(&self, _: &str) -> Result<Option<Permission>, ServiceError> {
            Ok(None)
        }
        async fn insert_permission(&self, _: PermissionChanges) -> Result<Permission, ServiceError> {
            Err(ServiceError::StoreTimeout)
        }
        async fn update_permission(
            &self,
            _: i64,
            _: PermissionChanges,
        ) -> Result<Option<Permission>, ServiceError> {
            Ok(None)
        }
        async fn delete_permission(&self, _: i64) -> Result<bool, ServiceError> {
            Ok(false)
        }
        async fn health_check(&self) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    #[async_trait]
    impl AuthRecordStore for StalledStore {
        async fn find_auth_record(&self, _: i64) -> Result<Option<AuthRecord>, ServiceError> {
            Ok(None)
        }
        async fn list_auth_records_by_owner(
            &self,
            _: i64,
            _: i64,
            _: i64,
        ) -> Result<Vec<AuthRecord>, ServiceError> {
            Ok(vec![])
        }
        async fn insert_auth_record(&self, _: i64, _: &str) -> Result<AuthRecord, ServiceError> {
            Err(ServiceError::StoreTimeout)
        }
        async fn update_auth_record(
            &self,
            _: i64,
            _: i64,
            _: &str,
        ) -> Result<Option<AuthRecord>, ServiceError> {
            Ok(None)
        }
        async fn delete_auth_record(&self, _: i64, _: i64) -> Result<bool, ServiceError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn slow_store_is_a_timeout_not_a_denial() {
        let (_, user) = seeded().await;
        let jwt = jwt();
        let token = jwt.issue_login_token(&user.user).unwrap().token;

        let resolver = IdentityResolver::new(
            jwt,
            Arc::new(StalledStore),
            Arc::new(MemoryDenylist::new()),
            Duration::from_millis(20),
        );
        assert!(matches!(
            resolver.resolve(&token).await,
            Err(ServiceError::StoreTimeout)
        ));
    }

    /// Denylist that never answers.
    struct StalledDenylist;

    #[async_trait]
    impl TokenDenylist for StalledDenylist {
        async fn deny(&self, _: &str, _: i64) -> Result<(), anyhow::Error> {
            Ok(())
        }
        async fn is_denied(&self, _: &str) -> Result<bool, anyhow::Error> {
            std::future::pending().await
        }
        async fn health_check(&self) -> Result<(), anyhow::Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_denylist_is_a_timeout_not_a_hang() {
        let (store, user) = seeded().await;
        let jwt = jwt();
        let token = jwt.issue_login_token(&user.user).unwrap().token;

        let resolver =
            IdentityResolver::new(jwt, store, Arc::new(StalledDenylist), Duration::from_millis(20));

        let outcome = tokio::time::timeout(Duration::from_secs(1), resolver.resolve(&token))
            .await
            .expect("resolve must finish within the store timeout");
        assert!(matches!(outcome, Err(ServiceError::StoreTimeout)));
    }
}
