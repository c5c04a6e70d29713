//! JWT token handling

use crate::auth::models::{Admin, RoleKind};
use crate::config::AuthConfig;
use crate::error::{Error, Result};
use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (numeric admin row id)
    pub sub: String,
    /// Human readable admin identifier
    pub admin_id: Option<String>,
    /// Role at issue time
    pub role: RoleKind,
    /// Issued at
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

impl Claims {
    /// Create claims for an admin valid for `lifetime`
    pub fn for_admin(admin: &Admin, lifetime: Duration) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: admin.id.to_string(),
            admin_id: admin.admin_id.clone(),
            role: admin.role.kind(),
            iat: now,
            exp: now + lifetime.num_seconds(),
        }
    }

    /// Row id of the admin the token was issued to
    pub fn subject_id(&self) -> Result<i64> {
        self.sub.parse().map_err(|_| Error::InvalidToken)
    }
}

/// Signs and verifies access tokens with a shared HMAC secret
#[derive(Clone)]
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, algorithm: &str, lifetime_minutes: i64) -> Result<Self> {
        let algorithm = match algorithm {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => {
                return Err(Error::Config(format!(
                    "Unsupported token algorithm: {}",
                    other
                )))
            }
        };

        Ok(Self {
            algorithm,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: Duration::minutes(lifetime_minutes),
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::new(
            &config.secret_key,
            &config.algorithm,
            config.access_token_expire_minutes,
        )
    }

    /// Issue an access token for an admin
    pub fn issue(&self, admin: &Admin) -> Result<String> {
        self.encode_claims(&Claims::for_admin(admin, self.lifetime))
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String> {
        Ok(encode(&Header::new(self.algorithm), claims, &self.encoding)?)
    }

    /// Validate signature and expiry and decode the claims
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                Error::InvalidToken
            })
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.algorithm)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}
