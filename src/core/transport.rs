//! Wire envelope types and the retrying transport.
//!
//! The remote service speaks HTTP/JSON; in-process we model that surface as
//! typed request/response envelopes dispatched through the [`Transport`]
//! trait, so the same client code runs against the loopback service binding
//! or a real socket-backed binding.
//!
//! [`RetryingTransport`] wraps any transport with bounded exponential backoff
//! plus jitter. Only I/O-classified failures and 5xx responses are retried;
//! protocol-level 4xx responses pass straight through for the client to map.

use crate::core::error::SyncError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
}

/// One outbound call: method + path + bearer token + optional JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRequest {
    pub method: Method,
    pub path: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,
}

impl WireRequest {
    pub fn get(path: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            token: token.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, token: impl Into<String>, body: JsonValue) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            token: token.into(),
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireResponse {
    pub status: u16,
    pub body: JsonValue,
}

impl WireResponse {
    pub fn ok(body: JsonValue) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": message }),
        }
    }
}

/// Boundary to the remote service.
///
/// `send` returns `Err` only for I/O-level failures (timeouts, connection
/// loss). Protocol outcomes, including 4xx/5xx, come back as status codes in
/// `Ok(WireResponse)`.
pub trait Transport {
    fn send(&self, req: &WireRequest) -> Result<WireResponse, SyncError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first (3 => 4 total).
    pub max_retries: u32,
    pub base_ms: u64,
    pub cap_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_ms: 200,
            cap_ms: 5_000,
        }
    }
}

/// Delay before retry `attempt` (0-indexed):
/// `min(base * 2^attempt + jitter, cap)`.
pub fn backoff_delay_ms(attempt: u32, policy: &RetryPolicy, jitter_ms: u64) -> u64 {
    let exp = policy
        .base_ms
        .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
    exp.saturating_add(jitter_ms).min(policy.cap_ms)
}

fn jitter_ms(policy: &RetryPolicy) -> u64 {
    if policy.base_ms == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..policy.base_ms)
}

pub struct RetryingTransport<T: Transport> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    pub fn with_policy(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T: Transport> Transport for RetryingTransport<T> {
    fn send(&self, req: &WireRequest) -> Result<WireResponse, SyncError> {
        let mut attempt = 0u32;
        loop {
            let outcome = match self.inner.send(req) {
                Ok(resp) if resp.status >= 500 => Err(SyncError::ServerError(format!(
                    "{} {} returned {}",
                    method_name(req.method),
                    req.path,
                    resp.status
                ))),
                other => other,
            };
            match outcome {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    let delay = backoff_delay_ms(attempt, &self.policy, jitter_ms(&self.policy));
                    if delay > 0 {
                        thread::sleep(Duration::from_millis(delay));
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn method_name(method: Method) -> &'static str {
    match method {
        Method::Get => "GET",
        Method::Post => "POST",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(backoff_delay_ms(0, &policy, 0), 200);
        assert_eq!(backoff_delay_ms(1, &policy, 0), 400);
        assert_eq!(backoff_delay_ms(2, &policy, 0), 800);
        assert_eq!(backoff_delay_ms(10, &policy, 0), 5_000);
    }

    #[test]
    fn test_backoff_jitter_added_below_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(backoff_delay_ms(0, &policy, 199), 399);
        assert_eq!(backoff_delay_ms(4, &policy, 199), 3_399);
        assert_eq!(backoff_delay_ms(5, &policy, 199), 5_000);
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = RetryPolicy::default();
        assert_eq!(backoff_delay_ms(63, &policy, 0), policy.cap_ms);
        assert_eq!(backoff_delay_ms(64, &policy, 0), policy.cap_ms);
    }
}
