use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::errors::{Error, Result};

const SESSION_KEY: &str = "csrf.token";

/// Anti-forgery token bound to the caller's session, rendered into every form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the session's token, creating it on first use.
    pub async fn issue(session: &Session) -> Result<Self> {
        if let Some(token) = session.get::<String>(SESSION_KEY).await? {
            return Ok(Self(token));
        }

        let token = Uuid::new_v4().simple().to_string();
        session.insert(SESSION_KEY, &token).await?;
        Ok(Self(token))
    }

    /// Checks a submitted token against the session. Never creates a token, so a rejected request
    /// leaves no session behind.
    pub async fn verify(session: &Session, submitted: &str) -> Result<Self> {
        let expected = session.get::<String>(SESSION_KEY).await?;

        match expected {
            Some(expected) if !submitted.is_empty() && constant_time_eq(&expected, submitted) => Ok(Self(expected)),
            _ => Err(Error::CsrfValidationFailed),
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn session<S: Send + Sync>(parts: &mut Parts, state: &S) -> Result<Session> {
    Session::from_request_parts(parts, state)
        .await
        .map_err(|(_, message)| Error::Unexpected(message.into()))
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let session = session(parts, state).await?;
        Self::issue(&session).await
    }
}

#[derive(Deserialize)]
struct TokenField {
    #[serde(default)]
    csrf_token: String,
}

/// A url-encoded form that is only handed to the handler once its anti-forgery token matches the
/// session. Rejects with `403` otherwise. The verified token is kept for re-rendering the form.
pub struct CsrfForm<T> {
    pub form: T,
    pub token: CsrfToken,
}

impl<S, T> FromRequest<S> for CsrfForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let (mut parts, body) = req.into_parts();
        let session = session(&mut parts, state).await?;

        let bytes = Bytes::from_request(Request::from_parts(parts, body), state)
            .await
            .map_err(|e| Error::BadForm(e.body_text()))?;

        let TokenField { csrf_token } =
            serde_urlencoded::from_bytes(&bytes).map_err(|e| Error::BadForm(e.to_string()))?;
        let token = CsrfToken::verify(&session, &csrf_token).await?;

        let form = serde_urlencoded::from_bytes::<T>(&bytes).map_err(|e| Error::BadForm(e.to_string()))?;
        Ok(Self { form, token })
    }
}
