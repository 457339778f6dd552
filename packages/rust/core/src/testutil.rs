//! Mock upstreams and temp databases shared by the engine tests.

use std::path::PathBuf;

use ndc_fetch::Upstream;
use ndc_shared::{Credentials, RetryConfig, UpstreamConfig};
use serde_json::json;
use wiremock::matchers::{method, path, path_regex, query_param};
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Token every mocked candidate holds besides the native row.
pub const TOKEN: &str = "tkn.near";

/// Upstream pointed at `server` for every provider, with millisecond backoff.
pub fn upstream_for(server: &MockServer) -> Upstream {
    let base = server.uri();
    let config = UpstreamConfig {
        pikespeak_url: base.clone(),
        nearblocks_url: base.clone(),
        pagoda_url: base.clone(),
        rpc_url: format!("{base}/rpc"),
        prices_url: format!("{base}/prices.json"),
        ..UpstreamConfig::default()
    };
    let retry = RetryConfig {
        max_retries: 5,
        base_delay_ms: 1,
    };
    Upstream::new(&config, retry).expect("test upstream")
}

/// A fresh database path under the system temp dir.
pub fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("ndc_core_test_{}.db", Uuid::now_v7()))
}

pub fn creds() -> Credentials {
    Credentials::new("pk-test", "pg-test")
}

/// Serve `ids` through the nominations listing in pages of `page_size`.
pub async fn mount_listing(server: &MockServer, ids: &[&str], page_size: usize) {
    let mut offset = 0;
    for chunk in ids.chunks(page_size) {
        let rows: Vec<_> = chunk
            .iter()
            .map(|id| json!({"nominee": id, "house": "HouseOfMerit", "timestamp": "1690000000"}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/nominations/candidates"))
            .and(query_param("offset", offset.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(server)
            .await;
        offset += page_size;
    }
    Mock::given(method("GET"))
        .and(path("/nominations/candidates"))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

/// Serve a price sheet listing `TOKEN` at `price`.
pub async fn mount_prices(server: &MockServer, price: &str) {
    Mock::given(method("GET"))
        .and(path("/prices.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            TOKEN: {"price": price},
            "other.near": {"price": "0.5"}
        })))
        .mount(server)
        .await;
}

/// Serve every per-candidate enrichment endpoint and `TOKEN` metadata.
pub async fn mount_enrichment(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/election/votes-by-candidate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"voter": "v1.near"}, {"voter": "v2.near"}])),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v1/account/[^/]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "account": [{"amount": "1000", "created": {"block_timestamp": 1_600_000_000_000_000_000u64}}]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/eapi/v1/accounts/[^/]+/NFT$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nft_counts": [{
                "contract_account_id": "pics.near",
                "nft_count": 2,
                "contract_metadata": {"name": "Pics", "symbol": "PIC"}
            }]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/account/tx-count/[^/]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(17)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/account/balance/[^/]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"contract": "Near", "amount": "5", "symbol": "NEAR"},
            {"contract": TOKEN, "amount": "42", "symbol": "TKN", "icon": "data:"}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/bridge/probable-eth-addresses/[^/]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["0xabc"])))
        .mount(server)
        .await;
    mount_ft_metadata(server).await;
}

/// Serve `ft_metadata` for `TOKEN` over JSON-RPC.
pub async fn mount_ft_metadata(server: &MockServer) {
    let payload = br#"{"spec":"ft-1.0.0","name":"Token","symbol":"TKN","decimals":18}"#;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "dontcare",
            "result": {"result": payload.to_vec(), "logs": [], "block_height": 1}
        })))
        .mount(server)
        .await;
}

/// Make one endpoint path fail with `status`, ahead of the generic mocks.
pub async fn mount_failure(server: &MockServer, endpoint: &str, status: u16) {
    Mock::given(path(endpoint))
        .respond_with(ResponseTemplate::new(status))
        .with_priority(1)
        .mount(server)
        .await;
}
