//! **Auth seam** — bearer token to user identity, checked before accept.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use std::collections::HashMap;

/// Resolves a bearer token presented at session accept. An `Err` refuses the
/// session with a protocol-appropriate "forbidden" before accept completes.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn decode(&self, token: &str) -> VoiceResult<i64>;
}

/// Fixed token table for tests and local demos.
#[derive(Debug, Default)]
pub struct StaticAuth {
    tokens: HashMap<String, i64>,
}

impl StaticAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: i64) -> Self {
        self.tokens.insert(token.into(), user_id);
        self
    }
}

#[async_trait]
impl AuthService for StaticAuth {
    async fn decode(&self, token: &str) -> VoiceResult<i64> {
        self.tokens
            .get(token)
            .copied()
            .ok_or_else(|| VoiceError::Auth("invalid or missing token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_token_resolves() {
        let auth = StaticAuth::new().with_token("abc", 42);
        assert_eq!(auth.decode("abc").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn unknown_token_is_refused() {
        let auth = StaticAuth::new();
        assert!(matches!(
            auth.decode("nope").await.unwrap_err(),
            VoiceError::Auth(_)
        ));
    }
}
