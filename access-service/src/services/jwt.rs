use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fs;
use uuid::Uuid;

use crate::config::{JwtConfig, SigningKeyConfig};
use crate::models::User;

/// Signs and verifies bearer tokens with the process-wide key.
#[derive(Clone)]
pub struct JwtService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    login_token_expiry_minutes: i64,
    refresh_token_expiry_minutes: i64,
}

/// Claims carried by every token this service issues. Login and refreshed
/// tokens have the same shape; only the lifetime differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// User ID, numeric
    pub id: i64,
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// JWT ID (for revocation)
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let (algorithm, encoding_key, decoding_key) = match &config.signing_key {
            SigningKeyConfig::Secret(secret) => (
                Algorithm::HS256,
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            ),
            SigningKeyConfig::RsaKeyFiles {
                private_key_path,
                public_key_path,
            } => {
                let private_key_pem = fs::read_to_string(private_key_path).map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to read private key from {}: {}",
                        private_key_path,
                        e
                    )
                })?;
                let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;

                let public_key_pem = fs::read_to_string(public_key_path).map_err(|e| {
                    anyhow::anyhow!("Failed to read public key from {}: {}", public_key_path, e)
                })?;
                let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

                (Algorithm::RS256, encoding_key, decoding_key)
            }
        };

        tracing::info!(algorithm = ?algorithm, "JWT service initialized");

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
            login_token_expiry_minutes: config.login_token_expiry_minutes,
            refresh_token_expiry_minutes: config.refresh_token_expiry_minutes,
        })
    }

    /// Sign a token for `user` that expires `ttl` from now.
    pub fn issue(&self, user: &User, ttl: Duration) -> Result<IssuedToken, anyhow::Error> {
        let now = Utc::now();
        let expires_at = now + ttl;

        let claims = TokenClaims {
            sub: user.id.to_string(),
            id: user.id,
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode token: {}", e))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn issue_login_token(&self, user: &User) -> Result<IssuedToken, anyhow::Error> {
        self.issue(user, Duration::minutes(self.login_token_expiry_minutes))
    }

    pub fn issue_refresh_token(&self, user: &User) -> Result<IssuedToken, anyhow::Error> {
        self.issue(user, Duration::minutes(self.refresh_token_expiry_minutes))
    }

    /// Verify signature and expiry. No leeway: a token is dead the second
    /// its `exp` passes.
    pub fn validate(&self, token: &str) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<TokenClaims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }

    /// Login token lifetime in seconds (for client info)
    pub fn login_token_expiry_seconds(&self) -> i64 {
        self.login_token_expiry_minutes * 60
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}
