//! Authenticated HTTP client for the discovery service.
//!
//! Two auth levels: anonymous calls carry the shared `X-API-Key`;
//! authenticated calls additionally sign the canonical request body with the
//! site's private key so the service can attribute operations to a domain.
//!
//! Idempotent reads retry with bounded exponential backoff. Mutating calls
//! never auto-retry.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};
use serde::de::DeserializeOwned;
use serde::Serialize;

use polis_protocol::defaults::{DISCOVERY_TIMEOUT_SECS, USER_AGENT};
use polis_protocol::{
    BeseechResponse, BlessingDecision, BlessingRequestPayload, BlessingVerdict, OperationResult,
    PendingBlessing, PolisError, RegisterSitePayload, Result, StreamBatch, StreamFilter,
};

pub const HEADER_API_KEY: &str = "X-API-Key";
pub const HEADER_DOMAIN: &str = "X-Polis-Domain";
pub const HEADER_SIGNATURE: &str = "X-Polis-Signature";

/// Attempts for idempotent reads (1 initial + retries).
const READ_ATTEMPTS: u32 = 3;
/// Base backoff between read retries; doubles each attempt.
const READ_BACKOFF_MS: u64 = 500;

/// Client for one discovery endpoint.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DiscoveryClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DISCOVERY_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PolisError::remote("discovery", format!("client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub async fn register_site(
        &self,
        payload: &RegisterSitePayload,
        key: &SigningKey,
    ) -> Result<OperationResult> {
        self.post_signed(
            "/api/sites/register",
            &payload.canonical_json()?,
            &payload.domain,
            key,
        )
        .await
    }

    pub async fn unregister_site(&self, domain: &str, key: &SigningKey) -> Result<OperationResult> {
        let body = serde_json::json!({ "domain": domain }).to_string();
        self.post_signed("/api/sites/unregister", &body, domain, key)
            .await
    }

    pub async fn check_site_registration(&self, domain: &str) -> Result<bool> {
        let url = self.endpoint(&format!("/api/sites/{domain}"));
        let response = self
            .http
            .get(&url)
            .header(HEADER_API_KEY, &self.api_key)
            .send()
            .await
            .map_err(|e| PolisError::remote(&url, e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(&url, &response)?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Blessings
    // ------------------------------------------------------------------

    /// POST a signed blessing request on behalf of the commenter.
    pub async fn beseech_blessing(
        &self,
        payload: &BlessingRequestPayload,
        domain: &str,
        key: &SigningKey,
    ) -> Result<BeseechResponse> {
        self.post_signed("/api/blessings/beseech", &payload.canonical_json()?, domain, key)
            .await
    }

    /// POST a signed grant or denial on behalf of the post author.
    pub async fn submit_verdict(
        &self,
        verdict: &BlessingVerdict,
        domain: &str,
        key: &SigningKey,
    ) -> Result<OperationResult> {
        self.post_signed("/api/blessings/verdict", &verdict.canonical_json()?, domain, key)
            .await
    }

    /// Best-effort revocation notice so peer inbox projections converge.
    pub async fn announce_revocation(
        &self,
        comment_url: &str,
        domain: &str,
        key: &SigningKey,
    ) -> Result<OperationResult> {
        let body = serde_json::json!({ "comment_url": comment_url }).to_string();
        self.post_signed("/api/blessings/revoke", &body, domain, key)
            .await
    }

    /// Blessing requests awaiting my decision.
    pub async fn fetch_pending_blessings(&self, for_domain: &str) -> Result<Vec<PendingBlessing>> {
        let url = self.endpoint("/api/blessings/pending");
        let response = self
            .get_with_retry(&url, &[("for", for_domain)])
            .await?;
        parse_json(response, &url).await
    }

    /// Decisions recorded for comments authored by `domain`.
    pub async fn fetch_blessing_decisions(
        &self,
        domain: &str,
        since: Option<&str>,
    ) -> Result<Vec<BlessingDecision>> {
        let url = self.endpoint("/api/blessings/decisions");
        let mut query = vec![("domain", domain)];
        if let Some(since) = since {
            query.push(("since", since));
        }
        let response = self.get_with_retry(&url, &query).await?;
        parse_json(response, &url).await
    }

    // ------------------------------------------------------------------
    // Follows
    // ------------------------------------------------------------------

    pub async fn announce_follow(
        &self,
        actor_domain: &str,
        target_domain: &str,
        key: &SigningKey,
    ) -> Result<OperationResult> {
        let body =
            serde_json::json!({ "actor": actor_domain, "target": target_domain }).to_string();
        self.post_signed("/api/follows/announce", &body, actor_domain, key)
            .await
    }

    pub async fn announce_unfollow(
        &self,
        actor_domain: &str,
        target_domain: &str,
        key: &SigningKey,
    ) -> Result<OperationResult> {
        let body =
            serde_json::json!({ "actor": actor_domain, "target": target_domain }).to_string();
        self.post_signed("/api/follows/remove", &body, actor_domain, key)
            .await
    }

    // ------------------------------------------------------------------
    // Event stream
    // ------------------------------------------------------------------

    /// Pull a page of the global event log.
    pub async fn stream_query(&self, filter: &StreamFilter) -> Result<StreamBatch> {
        let url = self.endpoint("/api/stream");
        let limit = filter.limit.to_string();
        let mut query: Vec<(&str, &str)> =
            vec![("since", filter.since.as_str()), ("limit", limit.as_str())];
        if let Some(type_filter) = filter.type_filter.as_deref() {
            query.push(("type", type_filter));
        }
        if let Some(actor) = filter.actor_filter.as_deref() {
            query.push(("actor", actor));
        }
        if let Some(target) = filter.target_filter.as_deref() {
            query.push(("target", target));
        }
        let response = self.get_with_retry(&url, &query).await?;
        parse_json(response, &url).await
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Signed POST: canonical body bytes, attributed to `domain`.
    async fn post_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        canonical_body: &str,
        domain: &str,
        key: &SigningKey,
    ) -> Result<T> {
        let url = self.endpoint(path);
        let signature = BASE64.encode(key.sign(canonical_body.as_bytes()).to_bytes());
        let response = self
            .http
            .post(&url)
            .header(HEADER_API_KEY, &self.api_key)
            .header(HEADER_DOMAIN, domain)
            .header(HEADER_SIGNATURE, signature)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(canonical_body.to_string())
            .send()
            .await
            .map_err(|e| PolisError::remote(&url, e.to_string()))?;
        check_status(&url, &response)?;
        parse_json(response, &url).await
    }

    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let mut backoff = Duration::from_millis(READ_BACKOFF_MS);
        let mut last_err = None;
        for attempt in 1..=READ_ATTEMPTS {
            let result = self
                .http
                .get(url)
                .query(query)
                .header(HEADER_API_KEY, &self.api_key)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_server_error() => {
                    last_err = Some(PolisError::remote(
                        url,
                        format!("HTTP {}", response.status()),
                    ));
                }
                Ok(response) => {
                    check_status(url, &response)?;
                    return Ok(response);
                }
                Err(e) => last_err = Some(PolisError::remote(url, e.to_string())),
            }
            if attempt < READ_ATTEMPTS {
                tracing::debug!(%url, attempt, "discovery read failed, backing off");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
        Err(last_err.unwrap_or_else(|| PolisError::remote(url, "request failed")))
    }
}

fn check_status(url: &str, response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(PolisError::remote(url, format!("HTTP {status}")))
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| PolisError::remote(url, format!("invalid response body: {e}")))
}

/// Sign an arbitrary serializable body the way authenticated calls do.
/// Exposed for tests that assert the wire contract.
pub fn sign_body<T: Serialize>(body: &T, key: &SigningKey) -> Result<String> {
    let canonical = serde_json::to_string(body)?;
    Ok(BASE64.encode(key.sign(canonical.as_bytes()).to_bytes()))
}

/// A discovery client bound to one site identity. Downstream crates define
/// capability traits (stream source, blessing transport, follow transport)
/// and implement them over this.
#[derive(Debug, Clone)]
pub struct AuthedDiscovery {
    client: DiscoveryClient,
    domain: String,
    key: SigningKey,
}

impl AuthedDiscovery {
    pub fn new(client: DiscoveryClient, domain: impl Into<String>, key: SigningKey) -> Self {
        Self {
            client,
            domain: domain.into(),
            key,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn client(&self) -> &DiscoveryClient {
        &self.client
    }

    pub async fn register(&self, payload: &RegisterSitePayload) -> Result<OperationResult> {
        self.client.register_site(payload, &self.key).await
    }

    pub async fn unregister(&self) -> Result<OperationResult> {
        self.client.unregister_site(&self.domain, &self.key).await
    }

    pub async fn is_registered(&self) -> Result<bool> {
        self.client.check_site_registration(&self.domain).await
    }

    pub async fn beseech(&self, payload: &BlessingRequestPayload) -> Result<BeseechResponse> {
        self.client
            .beseech_blessing(payload, &self.domain, &self.key)
            .await
    }

    pub async fn submit_verdict(&self, verdict: &BlessingVerdict) -> Result<OperationResult> {
        self.client
            .submit_verdict(verdict, &self.domain, &self.key)
            .await
    }

    pub async fn announce_revocation(&self, comment_url: &str) -> Result<OperationResult> {
        self.client
            .announce_revocation(comment_url, &self.domain, &self.key)
            .await
    }

    pub async fn fetch_pending_blessings(&self) -> Result<Vec<PendingBlessing>> {
        self.client.fetch_pending_blessings(&self.domain).await
    }

    pub async fn fetch_blessing_decisions(
        &self,
        since: Option<&str>,
    ) -> Result<Vec<BlessingDecision>> {
        self.client
            .fetch_blessing_decisions(&self.domain, since)
            .await
    }

    pub async fn announce_follow(&self, target_domain: &str) -> Result<OperationResult> {
        self.client
            .announce_follow(&self.domain, target_domain, &self.key)
            .await
    }

    pub async fn announce_unfollow(&self, target_domain: &str) -> Result<OperationResult> {
        self.client
            .announce_unfollow(&self.domain, target_domain, &self.key)
            .await
    }

    pub async fn stream_query(&self, filter: &StreamFilter) -> Result<StreamBatch> {
        self.client.stream_query(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polis_security::verify_content;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = DiscoveryClient::new("https://discovery.example/", "k").unwrap();
        assert_eq!(client.base_url(), "https://discovery.example");
        assert_eq!(
            client.endpoint("/api/stream"),
            "https://discovery.example/api/stream"
        );
    }

    #[test]
    fn test_sign_body_verifies_with_public_key() {
        let key = SigningKey::from_bytes(&[5u8; 32]);
        let body = serde_json::json!({ "domain": "alice.example" });
        let signature = sign_body(&body, &key).unwrap();
        let canonical = serde_json::to_string(&body).unwrap();
        verify_content(canonical.as_bytes(), &signature, &key.verifying_key()).unwrap();
    }

    #[test]
    fn test_blessing_payload_signature_matches_canonical_bytes() {
        let key = SigningKey::from_bytes(&[5u8; 32]);
        let payload = BlessingRequestPayload {
            comment_url: "https://bob.example/comments/pending/abc.md".into(),
            comment_version: "cc".repeat(32),
            in_reply_to: "https://alice.example/posts/20250101/x.md".into(),
            in_reply_to_version: None,
            root_post: "https://alice.example/posts/20250101/x.md".into(),
            author: "https://bob.example".into(),
            timestamp: "2025-01-02T03:04:05Z".parse().unwrap(),
        };
        let canonical = payload.canonical_json().unwrap();
        let signature = BASE64.encode(key.sign(canonical.as_bytes()).to_bytes());
        verify_content(canonical.as_bytes(), &signature, &key.verifying_key()).unwrap();
    }
}
