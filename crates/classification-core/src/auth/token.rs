use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::{ClassificationError, Result};

/// Access/refresh token pair as issued by the OAuth provider.
///
/// Provider fields this crate does not interpret (scope, user id, ...) are
/// kept in `extra` so that a load/save cycle preserves them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(
        default,
        with = "lenient_ts_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Unix seconds, written as an integer. Fractional seconds are accepted
/// on read and truncated.
mod lenient_ts_seconds {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        chrono::serde::ts_seconds_option::serialize(value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| {
                DateTime::from_timestamp(secs.trunc() as i64, 0)
                    .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
            })
            .transpose()
    }
}

/// Body of a token endpoint answer (code exchange or refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Token {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: None,
            expires_in: None,
            expires_at: None,
            extra: Map::new(),
        }
    }

    /// Build a token from a provider answer.
    ///
    /// Refresh answers often omit `refresh_token`; the one from `previous`
    /// is carried over in that case.
    pub fn from_response(response: TokenResponse, previous: Option<&Token>) -> Result<Self> {
        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous.map(|p| p.refresh_token.clone()))
            .ok_or_else(|| {
                ClassificationError::TokenUnavailable(
                    "token response lacks refresh_token".to_string(),
                )
            })?;

        let expires_at = response
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));

        let token = Self {
            access_token: response.access_token,
            refresh_token,
            token_type: response
                .token_type
                .or_else(|| previous.and_then(|p| p.token_type.clone())),
            expires_in: response.expires_in,
            expires_at,
            extra: response.extra,
        };
        token.ensure_usable()?;
        Ok(token)
    }

    /// Both halves of the pair must be present for the token to be usable
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    pub fn ensure_usable(&self) -> Result<()> {
        if self.is_usable() {
            Ok(())
        } else {
            Err(ClassificationError::TokenUnavailable(
                "Invalid format: access_token and refresh_token must be provided".to_string(),
            ))
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expiry| Utc::now() >= expiry)
            .unwrap_or(false)
    }
}
