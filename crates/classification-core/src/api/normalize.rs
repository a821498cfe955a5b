//! Translation between typed values and wire JSON.
//!
//! Outgoing bodies are serialized through serde: request records declare
//! their wire names and skip unset fields, plain `serde_json` mappings pass
//! through untouched. Incoming responses are reduced to an optional body.

use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{ClassificationError, Result};

/// Canonical wire body for `value`; an absent value becomes `{}`.
pub fn to_wire_body<T: Serialize + ?Sized>(value: Option<&T>) -> Result<Value> {
    match value {
        Some(value) => Ok(serde_json::to_value(value)?),
        None => Ok(Value::Object(Map::new())),
    }
}

/// Canonical wire body for a list, element by element; absent becomes `[]`.
pub fn to_wire_list<T: Serialize>(values: Option<&[T]>) -> Result<Value> {
    let items = values
        .unwrap_or_default()
        .iter()
        .map(|item| to_wire_body(Some(item)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(items))
}

/// Reduce a response to its body, or fail if the status is not `expected`.
///
/// Error statuses surface as the HTTP client's own status error. A match
/// on 204, an empty body or an unparsable body all yield `None`.
pub async fn interpret(response: Response, expected: StatusCode) -> Result<Option<Value>> {
    let actual = response.status();
    if actual != expected {
        debug!(%expected, %actual, url = %response.url(), "Unexpected response status");
        response.error_for_status_ref()?;
        return Err(ClassificationError::UnexpectedStatus { expected, actual });
    }

    if actual == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let bytes = response.bytes().await?;
    Ok(parse_body(&bytes))
}

/// Parse a response body, treating empty structures as no content
pub fn parse_body(bytes: &[u8]) -> Option<Value> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) if !is_empty(&value) => Some(value),
        _ => None,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
