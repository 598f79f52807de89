//! Upstash (Redis over REST) storage backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::UpstashConfig;

use super::backend::{KvBackend, StoreError};

/// Redis commands sent as JSON arrays to an Upstash REST endpoint.
pub struct UpstashBackend {
    client: Client,
    url: String,
    token: String,
    closed: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct UpstashResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl UpstashBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: &UpstashConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            closed: AtomicBool::new(false),
        })
    }

    /// Run one command and return its `result` value.
    async fn command(&self, args: Vec<String>) -> Result<Value, StoreError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(StoreError::Closed);
        }

        let name = args.first().cloned().unwrap_or_default();
        debug!(command = %name, "Upstash command");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&args)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Timeout
                } else if e.is_connect() {
                    StoreError::ConnectionFailed(e.to_string())
                } else {
                    StoreError::CommandFailed(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            StoreError::InvalidResponse(format!("{} response body unreadable: {}", name, e))
        })?;

        decode_response(&name, status.as_u16(), &body)
    }
}

/// Decode an Upstash REST reply. Errors are reported even on HTTP 200.
fn decode_response(command: &str, status: u16, body: &str) -> Result<Value, StoreError> {
    let parsed: UpstashResponse = serde_json::from_str(body).map_err(|_| {
        StoreError::InvalidResponse(format!(
            "{} returned HTTP {}: {}",
            command,
            status,
            body.chars().take(200).collect::<String>()
        ))
    })?;

    if let Some(error) = parsed.error {
        return Err(StoreError::CommandFailed(format!("{}: {}", command, error)));
    }
    if !(200..300).contains(&status) {
        return Err(StoreError::CommandFailed(format!(
            "{} returned HTTP {}",
            command, status
        )));
    }
    Ok(parsed.result.unwrap_or(Value::Null))
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn into_string_list(value: Value) -> Result<Vec<String>, StoreError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.into_iter().map(value_to_string).collect()),
        other => Err(StoreError::InvalidResponse(format!(
            "expected an array, got {}",
            other
        ))),
    }
}

/// HGETALL replies with a flat `[field, value, field, value, ...]` array.
fn into_field_map(value: Value) -> Result<HashMap<String, String>, StoreError> {
    let flat = into_string_list(value)?;
    if flat.len() % 2 != 0 {
        return Err(StoreError::InvalidResponse(
            "odd number of elements in hash reply".to_string(),
        ));
    }
    let mut map = HashMap::with_capacity(flat.len() / 2);
    let mut items = flat.into_iter();
    while let (Some(field), Some(value)) = (items.next(), items.next()) {
        map.insert(field, value);
    }
    Ok(map)
}

fn command_args(name: &str, key: &str, rest: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut args = vec![name.to_string(), key.to_string()];
    args.extend(rest);
    args
}

#[async_trait]
impl KvBackend for UpstashBackend {
    fn name(&self) -> &str {
        "upstash"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        match self.command(vec!["PING".to_string()]).await? {
            Value::String(s) if s.eq_ignore_ascii_case("pong") => Ok(()),
            other => Err(StoreError::InvalidResponse(format!(
                "unexpected PING reply: {}",
                other
            ))),
        }
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .command(command_args("HGET", key, [field.to_string()]))
            .await?;
        Ok(match value {
            Value::Null => None,
            other => Some(value_to_string(other)),
        })
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let value = self.command(command_args("HGETALL", key, [])).await?;
        into_field_map(value)
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let rest = fields
            .iter()
            .flat_map(|(field, value)| [field.to_string(), value.clone()]);
        self.command(command_args("HSET", key, rest)).await?;
        Ok(())
    }

    async fn hash_delete(&self, key: &str, fields: &[&str]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let rest = fields.iter().map(|f| f.to_string());
        self.command(command_args("HDEL", key, rest)).await?;
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        if members.is_empty() {
            return Ok(());
        }
        self.command(command_args("SADD", key, members.iter().cloned()))
            .await?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        if members.is_empty() {
            return Ok(());
        }
        self.command(command_args("SREM", key, members.iter().cloned()))
            .await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let value = self.command(command_args("SMEMBERS", key, [])).await?;
        into_string_list(value)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let value = self
            .command(command_args("SISMEMBER", key, [member.to_string()]))
            .await?;
        match value.as_u64() {
            Some(n) => Ok(n == 1),
            None => Err(StoreError::InvalidResponse(format!(
                "unexpected SISMEMBER reply: {}",
                value
            ))),
        }
    }

    async fn set_len(&self, key: &str) -> Result<usize, StoreError> {
        let value = self.command(command_args("SCARD", key, [])).await?;
        value.as_u64().map(|n| n as usize).ok_or_else(|| {
            StoreError::InvalidResponse(format!("unexpected SCARD reply: {}", value))
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.command(command_args("DEL", key, [])).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> UpstashConfig {
        UpstashConfig {
            url: "https://eu1-example.upstash.io/".to_string(),
            token: "token".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let backend = UpstashBackend::new(&config()).unwrap();
        assert_eq!(backend.url, "https://eu1-example.upstash.io");
        assert_eq!(backend.name(), "upstash");
    }

    #[test]
    fn test_decode_result() {
        let value = decode_response("SMEMBERS", 200, r#"{"result":["1","2"]}"#).unwrap();
        assert_eq!(value, json!(["1", "2"]));
    }

    #[test]
    fn test_decode_error_reply() {
        let err = decode_response("SADD", 400, r#"{"error":"WRONGTYPE Operation"}"#).unwrap_err();
        assert!(matches!(err, StoreError::CommandFailed(_)));
        assert!(err.to_string().contains("WRONGTYPE"));
    }

    #[test]
    fn test_decode_non_json_body() {
        let err = decode_response("PING", 502, "<html>Bad gateway</html>").unwrap_err();
        assert!(matches!(err, StoreError::InvalidResponse(_)));
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn test_decode_unauthorized_without_error_field() {
        let err = decode_response("PING", 401, r#"{}"#).unwrap_err();
        assert!(matches!(err, StoreError::CommandFailed(_)));
    }

    #[test]
    fn test_decode_null_result() {
        let value = decode_response("HGET", 200, r#"{"result":null}"#).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_into_field_map() {
        let map = into_field_map(json!(["createMs", "1700000000000", "lastScanMs", 0])).unwrap();
        assert_eq!(map["createMs"], "1700000000000");
        assert_eq!(map["lastScanMs"], "0");

        assert!(into_field_map(json!(["dangling"])).is_err());
        assert!(into_field_map(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_into_string_list_numbers() {
        let members = into_string_list(json!([12345, "abc"])).unwrap();
        assert_eq!(members, vec!["12345".to_string(), "abc".to_string()]);
        assert!(into_string_list(json!("nope")).is_err());
    }

    #[test]
    fn test_command_args() {
        let args = command_args("SADD", "search:abc", ["1".to_string(), "2".to_string()]);
        assert_eq!(args, vec!["SADD", "search:abc", "1", "2"]);
    }

    #[tokio::test]
    async fn test_closed_backend_rejects_commands() {
        let backend = UpstashBackend::new(&config()).unwrap();
        backend.close().await.unwrap();
        assert!(matches!(backend.ping().await, Err(StoreError::Closed)));
    }
}
