use chrono::Utc;
use std::sync::Arc;

use crate::{
    dtos::auth::{AuthResponse, LoginRequest, RegisterRequest},
    models::{NewUser, UserWithPermissions},
    services::{
        metrics::record_access_decision, JwtService, ServiceError, Store, TokenClaims,
        TokenDenylist,
    },
    utils::{hash_password, verify_against_dummy, verify_password, Password, PasswordHashString},
};

/// Group every self-registered user joins, when it exists.
pub const DEFAULT_GROUP_CODE: &str = "User";

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    jwt: JwtService,
    denylist: Arc<dyn TokenDenylist>,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, jwt: JwtService, denylist: Arc<dyn TokenDenylist>) -> Self {
        Self {
            store,
            jwt,
            denylist,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        if self.store.find_user_by_email(&req.email).await?.is_some() {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&Password::new(req.password))?;

        let group_ids = self
            .store
            .find_group_by_code(DEFAULT_GROUP_CODE)
            .await?
            .map(|g| vec![g.id])
            .unwrap_or_default();

        let user = self
            .store
            .insert_user(NewUser {
                email: req.email,
                name: req.name,
                password_hash: password_hash.into_string(),
                group_ids,
                permission_ids: vec![],
            })
            .await?;

        tracing::info!(user_id = user.id(), "User registered");

        self.token_response(user)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ServiceError> {
        let password = Password::new(req.password);

        let Some(user) = self.store.find_user_by_email(&req.email).await? else {
            verify_against_dummy(&password);
            record_access_decision("login", false);
            tracing::warn!("Login failed: unknown email");
            return Err(ServiceError::InvalidCredentials);
        };

        let stored = PasswordHashString::new(user.user.password_hash.clone());
        let valid = verify_password(&password, &stored).map_err(|e| {
            tracing::error!(user_id = user.id(), "Stored password hash is unreadable");
            ServiceError::from(e)
        })?;

        if !valid {
            record_access_decision("login", false);
            tracing::warn!(user_id = user.id(), "Login failed: wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        record_access_decision("login", true);
        tracing::info!(user_id = user.id(), "User logged in");

        self.token_response(user)
    }

    /// Revoke the presented token for the rest of its lifetime.
    pub async fn logout(&self, claims: &TokenClaims) -> Result<(), ServiceError> {
        let remaining = claims.exp - Utc::now().timestamp();
        if remaining > 0 {
            self.denylist
                .deny(&claims.jti, remaining)
                .await
                .map_err(ServiceError::Internal)?;
        }

        tracing::info!(user_id = claims.id, "User logged out");
        Ok(())
    }

    fn token_response(&self, user: UserWithPermissions) -> Result<AuthResponse, ServiceError> {
        let issued = self.jwt.issue_login_token(&user.user)?;

        Ok(AuthResponse {
            token: issued.token,
            expires_in: self.jwt.login_token_expiry_seconds(),
            user: user.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JwtConfig, SigningKeyConfig};
    use crate::models::{GroupChanges, User};
    use crate::services::{IdentityStore, MemoryDenylist, MemoryStore};

    fn service(store: Arc<MemoryStore>) -> AuthService {
        let jwt = JwtService::new(&JwtConfig {
            signing_key: SigningKeyConfig::Secret("a".repeat(32)),
            login_token_expiry_minutes: 1,
            refresh_token_expiry_minutes: 15,
        })
        .unwrap();
        AuthService::new(store, jwt, Arc::new(MemoryDenylist::new()))
    }

    fn register(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "correct horse".to_string(),
            name: "Reg".to_string(),
        }
    }

    #[tokio::test]
    async fn register_joins_default_group_when_present() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_group(GroupChanges {
                code_name: DEFAULT_GROUP_CODE.to_string(),
                name: "Users".to_string(),
                permission_ids: vec![],
            })
            .await
            .unwrap();

        let response = service(store).register(register("n@example.com")).await.unwrap();
        assert_eq!(response.user.groups.len(), 1);
        assert_eq!(response.expires_in, 60);
    }

    #[tokio::test]
    async fn register_without_default_group_has_no_groups() {
        let response = service(Arc::new(MemoryStore::new()))
            .register(register("n@example.com"))
            .await
            .unwrap();
        assert!(response.user.groups.is_empty());
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let service = service(Arc::new(MemoryStore::new()));
        service.register(register("n@example.com")).await.unwrap();

        assert!(matches!(
            service.register(register("n@example.com")).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_fail_identically() {
        let service = service(Arc::new(MemoryStore::new()));
        service.register(register("n@example.com")).await.unwrap();

        let wrong = service
            .login(LoginRequest {
                email: "n@example.com".to_string(),
                password: "nope".to_string(),
            })
            .await
            .unwrap_err();
        let unknown = service
            .login(LoginRequest {
                email: "ghost@example.com".to_string(),
                password: "nope".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(wrong, ServiceError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn corrupt_stored_hash_is_an_integrity_error() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_user(NewUser {
                email: "c@example.com".to_string(),
                name: "C".to_string(),
                password_hash: "garbage".to_string(),
                group_ids: vec![],
                permission_ids: vec![],
            })
            .await
            .unwrap();

        let err = service(store)
            .login(LoginRequest {
                email: "c@example.com".to_string(),
                password: "whatever".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Integrity(_)));
    }

    #[tokio::test]
    async fn logout_revokes_jti() {
        let denylist = Arc::new(MemoryDenylist::new());
        let jwt = JwtService::new(&JwtConfig {
            signing_key: SigningKeyConfig::Secret("a".repeat(32)),
            login_token_expiry_minutes: 1,
            refresh_token_expiry_minutes: 15,
        })
        .unwrap();
        let service = AuthService::new(Arc::new(MemoryStore::new()), jwt.clone(), denylist.clone());

        let user = User {
            id: 5,
            email: "l@example.com".to_string(),
            name: "L".to_string(),
            password_hash: String::new(),
            created_at: Utc::now(),
        };
        let claims = jwt.validate(&jwt.issue_login_token(&user).unwrap().token).unwrap();

        service.logout(&claims).await.unwrap();
        assert!(denylist.is_denied(&claims.jti).await.unwrap());
    }
}
