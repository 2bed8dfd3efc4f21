use crate::request::{Body, HttpRequest};
use crate::runtime;
use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Configuration for the token-issuing backend, e.g.
/// `http://localhost:8000/api`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEndpointConfig {
    pub base_url: String,
}

/// Credential for one media session. `token` is a bearer credential and is
/// redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub url: String,
    pub room_name: String,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token", &"[REDACTED]")
            .field("url", &self.url)
            .field("room_name", &self.room_name)
            .finish()
    }
}

pub fn build_token_request(
    cfg: &TokenEndpointConfig,
    room_name: Option<&str>,
    participant_name: &str,
) -> HttpRequest {
    let url = join_url(&cfg.base_url, "/token");

    let payload = json!({
        "room_name": room_name,
        "participant_name": participant_name,
    });

    HttpRequest {
        method: "POST".into(),
        url,
        headers: vec![("Content-Type".into(), "application/json".into())],
        body: Body::Json(payload.to_string()),
    }
}

pub fn parse_token_response(body: &[u8]) -> anyhow::Result<TokenResponse> {
    serde_json::from_slice(body).context("decode token JSON")
}

/// Requests a fresh credential. A non-2xx status is an error; the caller
/// decides whether to surface it (the coordinator does, and never retries).
pub async fn fetch_token(
    cfg: &TokenEndpointConfig,
    room_name: Option<&str>,
    participant_name: &str,
) -> anyhow::Result<TokenResponse> {
    let req = build_token_request(cfg, room_name, participant_name);
    let resp = runtime::execute(&req).await?;
    if !(200..=299).contains(&resp.status) {
        return Err(anyhow!(
            "token request failed: status={} body={}",
            resp.status,
            String::from_utf8_lossy(&resp.body)
        ));
    }
    parse_token_response(&resp.body)
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
