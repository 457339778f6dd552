//! Rate-limit-aware HTTP client.
//!
//! Every outbound call goes through [`ResilientClient`]. A 429 response is
//! retried with exponential backoff; any other non-success status, transport
//! error, or payload that does not decode into the expected type is returned
//! as an error on the first occurrence.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use ndc_shared::{NdcError, Result, RetryConfig};

/// User-Agent string for upstream requests.
const USER_AGENT: &str = concat!("ndc-candidates/", env!("CARGO_PKG_VERSION"));

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// HTTP client with 429 backoff and typed response decoding.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    client: Client,
    retry: RetryConfig,
}

impl ResilientClient {
    /// Create a client with the given retry policy and per-request timeout.
    pub fn new(retry: RetryConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| NdcError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, retry })
    }

    /// GET `url` and decode the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url, headers: HeaderMap) -> Result<T> {
        let response = self
            .send_with_retry(url, || self.client.get(url.as_str()).headers(headers.clone()))
            .await?;
        decode(url, response).await
    }

    /// POST `body` as JSON to `url` and decode the JSON response into `T`.
    pub async fn post_json<B, T>(&self, url: &Url, headers: HeaderMap, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send_with_retry(url, || {
                self.client
                    .post(url.as_str())
                    .headers(headers.clone())
                    .json(body)
            })
            .await?;
        decode(url, response).await
    }

    /// Send the request built by `build`, rebuilding and resending it after
    /// each 429 until the retry allowance is spent.
    async fn send_with_retry<F>(&self, url: &Url, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            debug!(%url, attempt, "sending request");
            let response = build()
                .send()
                .await
                .map_err(|e| NdcError::Network(format!("{url}: {e}")))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.retry.max_retries {
                let delay = self.retry.delay_for(attempt);
                warn!(
                    %url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                let mut body = response.text().await.unwrap_or_default();
                if body.len() > MAX_ERROR_BODY {
                    let cut = (0..=MAX_ERROR_BODY)
                        .rev()
                        .find(|i| body.is_char_boundary(*i))
                        .unwrap_or(0);
                    body.truncate(cut);
                }
                return Err(NdcError::Upstream {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }

            return Ok(response);
        }
    }
}

/// Decode a success response body into `T`.
async fn decode<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| NdcError::Network(format!("{url}: body read failed: {e}")))?;

    serde_json::from_slice(&bytes).map_err(|e| NdcError::schema(url.as_str(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_client() -> ResilientClient {
        let retry = RetryConfig {
            max_retries: 5,
            base_delay_ms: 1,
        };
        ResilientClient::new(retry, Duration::from_secs(5)).unwrap()
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{p}", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn decodes_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/count"))
            .respond_with(ResponseTemplate::new(200).set_body_string("42"))
            .expect(1)
            .mount(&server)
            .await;

        let n: u64 = fast_client()
            .get_json(&url(&server, "/count"), HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(n, 42);
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(3)
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"["x"]"#))
            .expect(1)
            .mount(&server)
            .await;

        let out: Vec<String> = fast_client()
            .get_json(&url(&server, "/busy"), HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(out, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn gives_up_after_five_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(6)
            .mount(&server)
            .await;

        let err = fast_client()
            .get_json::<u64>(&url(&server, "/busy"), HeaderMap::new())
            .await
            .unwrap_err();
        match err {
            NdcError::Upstream { status, body, .. } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = fast_client()
            .get_json::<u64>(&url(&server, "/broken"), HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NdcError::Upstream { status: 503, .. }));
    }

    #[tokio::test]
    async fn shape_mismatch_is_schema_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/count"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"count": 1}"#))
            .mount(&server)
            .await;

        let err = fast_client()
            .get_json::<u64>(&url(&server, "/count"), HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NdcError::Schema { .. }));
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn post_sends_json_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .and(header("x-test", "1"))
            .and(body_json(serde_json::json!({"method": "query"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("true"))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-test", "1".parse().unwrap());
        let ok: bool = fast_client()
            .post_json(
                &url(&server, "/rpc"),
                headers,
                &serde_json::json!({"method": "query"}),
            )
            .await
            .unwrap();
        assert!(ok);
    }
}
