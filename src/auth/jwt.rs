use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use uuid::Uuid;

use super::{AuthError, Claims, CustomClaims, IssuedToken, RESERVED_CLAIMS, deadline::expires_after};

pub trait TokenSigner: Send + Sync {
    fn issue(
        &self,
        subject: &str,
        ttl: Duration,
        claims: CustomClaims,
    ) -> Result<IssuedToken, AuthError>;

    fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: Vec<u8>,
    /// Seconds a token stays acceptable past its `exp`.
    pub leeway_secs: i64,
}

impl JwtSettings {
    pub fn new(secret: impl AsRef<[u8]>, leeway_secs: i64) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            leeway_secs,
        }
    }
}

/// HS256 signer over one process-wide secret, immutable after construction.
#[derive(Clone)]
pub struct JwtSigner {
    enc: EncodingKey,
    dec: DecodingKey,
    leeway_secs: i64,
}

impl JwtSigner {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            enc: EncodingKey::from_secret(&settings.secret),
            dec: DecodingKey::from_secret(&settings.secret),
            leeway_secs: settings.leeway_secs.max(0),
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".into());

        encode(&header, claims, &self.enc).map_err(|err| AuthError::Signing(err.to_string()))
    }

    pub fn issue_at(
        &self,
        subject: &str,
        ttl: Duration,
        claims: CustomClaims,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        if let Some(name) = claims
            .extra
            .keys()
            .find(|name| RESERVED_CLAIMS.contains(&name.as_str()))
        {
            return Err(AuthError::Signing(format!("claim `{name}` is reserved")));
        }

        let expires_at = expires_after(now, ttl)?;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            custom: claims,
        };
        let token = self.sign(&claims)?;

        Ok(IssuedToken {
            token,
            claims,
            expires_at,
        })
    }

    /// Verifies against an explicit clock: a token with `exp = T` is
    /// rejected once `now >= T + leeway`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.dec, &validation).map_err(classify)?;
        if now >= data.claims.exp.saturating_add(self.leeway_secs) {
            return Err(AuthError::TokenExpired);
        }

        Ok(data.claims)
    }
}

impl TokenSigner for JwtSigner {
    fn issue(
        &self,
        subject: &str,
        ttl: Duration,
        claims: CustomClaims,
    ) -> Result<IssuedToken, AuthError> {
        self.issue_at(subject, ttl, claims, Utc::now())
    }

    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
            AuthError::TokenSignatureInvalid
        }
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => {
            tracing::debug!(error = %err, "rejecting unparseable access token");
            AuthError::TokenMalformed
        }
    }
}
