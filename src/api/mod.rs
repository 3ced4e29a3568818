// Typed wrappers over the hostel backend endpoints
//
// Every call goes through `SecureClient`, so token attachment and refresh
// are handled underneath.

pub mod meals;
pub mod profiles;
pub mod properties;
pub mod users;
pub mod wallet;

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{extract_message, ClientError, Result};

/// Read a response body, turning non-2xx statuses and `success: false`
/// envelopes into [`ClientError::Api`].
pub async fn read_body(response: Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), body = %text, "Backend returned an error");
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: extract_message(&text),
        });
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    let body: Value =
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))?;

    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Request failed")
                .to_string(),
        });
    }

    Ok(body)
}

/// Decode the payload of an envelope `{ success, message, data }`.
/// Some endpoints answer with the bare payload, which is decoded as-is.
pub fn decode_data<T: DeserializeOwned>(body: Value) -> Result<T> {
    let payload = match body {
        Value::Object(mut map) if map.get("data").is_some_and(|d| !d.is_null()) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    serde_json::from_value(payload).map_err(|e| ClientError::Decode(e.to_string()))
}

pub async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T> {
    decode_data(read_body(response).await?)
}

/// Case-insensitive substring search across optional text fields.
/// An empty query matches everything.
pub fn matches_query(fields: &[Option<&str>], query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }

    fields
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_enveloped_payload() {
        let ids: Vec<String> =
            decode_data(json!({ "success": true, "message": "ok", "data": ["a", "b"] })).unwrap();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_decode_bare_payload() {
        let ids: Vec<String> = decode_data(json!(["a"])).unwrap();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_decode_null_data_falls_back_to_body() {
        let value: Value = decode_data(json!({ "data": null, "orders": [] })).unwrap();
        assert_eq!(value["orders"], json!([]));
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let result: Result<Vec<String>> = decode_data(json!({ "data": 5 }));
        assert!(matches!(result, Err(ClientError::Decode(_))));
    }

    #[test]
    fn test_matches_query() {
        let fields = [Some("Rahim Uddin"), None, Some("rahim@example.com")];
        assert!(matches_query(&fields, ""));
        assert!(matches_query(&fields, "  "));
        assert!(matches_query(&fields, "UDDIN"));
        assert!(matches_query(&fields, "example"));
        assert!(!matches_query(&fields, "karim"));
        assert!(!matches_query(&[None], "x"));
    }
}
