use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type UserId = i32;
pub type RoleId = i32;

/// Claim names owned by the signer; callers cannot override them.
pub const RESERVED_CLAIMS: [&str; 5] = ["sub", "iat", "exp", "jti", "roles"];

/// Caller-controlled part of an access token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomClaims {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CustomClaims {
    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(flatten)]
    pub custom: CustomClaims,
}

impl Claims {
    pub fn roles(&self) -> &[String] {
        &self.custom.roles
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
    pub expires_at: DateTime<Utc>,
}

/// Access/refresh pair handed to the client after login or refresh.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub firstname: String,
    pub lastname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRoleRecord {
    pub id: i32,
    pub user_id: UserId,
    pub role_id: RoleId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: i32,
    pub user_id: UserId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Outcome of an idempotent role grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleAssignment {
    Created(UserRoleRecord),
    AlreadyAssigned(UserRoleRecord),
}

impl RoleAssignment {
    pub fn record(&self) -> &UserRoleRecord {
        match self {
            Self::Created(record) | Self::AlreadyAssigned(record) => record,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}
