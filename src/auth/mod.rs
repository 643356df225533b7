//! Bearer-token verification and the recipient directory used by email delivery.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

use crate::errors::ServiceError;

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Caller identity extracted from a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub subject: String,
    pub email: Option<String>,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("No recipient emails found")]
    NoRecipients,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        ServiceError::Unauthorized(err.to_string())
    }
}

/// Verifies the credentials carried by a request.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn verify(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError>;
}

/// Checks `Authorization: Bearer <jwt>` signed with a shared HS256 secret.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = audience {
            validation.set_audience(&[audience]);
        }

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn verify(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.validate_token(token)?;
        Ok(AuthUser {
            subject: claims.sub,
            email: claims.email,
        })
    }
}

/// Rejects requests the configured [`Authenticator`] does not accept.
pub async fn auth_middleware(
    State(authenticator): State<Arc<dyn Authenticator>>,
    request: Request,
    next: Next,
) -> Response {
    match authenticator.verify(request.headers()).await {
        Ok(user) => {
            let span = info_span!("caller", subject = %user.subject);
            next.run(request).instrument(span).await
        }
        Err(e) => {
            debug!(error = %e, "rejecting unauthenticated request");
            ServiceError::from(e).into_response()
        }
    }
}

/// Lists the email addresses the notify job delivers to.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn list_all_emails(&self) -> Result<Vec<String>, AuthError>;
}

/// Directory backed by a fixed address list from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticRecipientDirectory {
    emails: Vec<String>,
}

impl StaticRecipientDirectory {
    pub fn new(emails: Vec<String>) -> Self {
        Self { emails }
    }
}

#[async_trait]
impl RecipientDirectory for StaticRecipientDirectory {
    async fn list_all_emails(&self) -> Result<Vec<String>, AuthError> {
        if self.emails.is_empty() {
            return Err(AuthError::NoRecipients);
        }
        Ok(self.emails.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "an-hs256-secret-used-only-in-tests";

    fn token(secret: &str, exp_offset: i64, iss: Option<&str>) -> String {
        let claims = Claims {
            sub: "user-1".into(),
            exp: chrono::Utc::now().timestamp() + exp_offset,
            iss: iss.map(str::to_string),
            aud: None,
            email: Some("user@example.com".into()),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn valid_token_yields_user() {
        let auth = JwtAuthenticator::new(SECRET, None, None);
        let user = auth.verify(&bearer(&token(SECRET, 600, None))).await.unwrap();
        assert_eq!(user.subject, "user-1");
        assert_eq!(user.email.as_deref(), Some("user@example.com"));
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let auth = JwtAuthenticator::new(SECRET, None, None);
        assert_matches!(auth.verify(&HeaderMap::new()).await, Err(AuthError::MissingToken));
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let auth = JwtAuthenticator::new(SECRET, None, None);
        let other = token("a-completely-different-signing-secret", 600, None);
        assert_matches!(auth.verify(&bearer(&other)).await, Err(AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let auth = JwtAuthenticator::new(SECRET, None, None);
        let stale = token(SECRET, -3600, None);
        assert_matches!(auth.verify(&bearer(&stale)).await, Err(AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn issuer_is_enforced_when_configured() {
        let auth = JwtAuthenticator::new(SECRET, Some("pantry"), None);
        assert!(auth
            .verify(&bearer(&token(SECRET, 600, Some("pantry"))))
            .await
            .is_ok());
        assert!(auth
            .verify(&bearer(&token(SECRET, 600, Some("elsewhere"))))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn empty_directory_is_an_error() {
        let directory = StaticRecipientDirectory::default();
        assert_matches!(directory.list_all_emails().await, Err(AuthError::NoRecipients));

        let directory = StaticRecipientDirectory::new(vec!["a@example.com".into()]);
        assert_eq!(directory.list_all_emails().await.unwrap().len(), 1);
    }
}
