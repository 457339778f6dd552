//! Typed calls against each external data source.
//!
//! [`Upstream`] knows the endpoint layout, the query parameters, and which
//! credential header goes to which provider. Each method is exactly one
//! outbound call (plus any 429 retries inside [`ResilientClient`]).

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, ORIGIN};
use tracing::{debug, instrument, warn};
use url::Url;

use ndc_shared::{Credentials, NdcError, Result, RetryConfig, UpstreamConfig};

use crate::client::ResilientClient;
use crate::schema::{
    AccountInfo, AccountResponse, BalanceRow, CandidateRow, FtMetadataPayload, NftCount,
    NftCountsResponse, PriceListing, RpcRequest, RpcResponse, VoteRow,
};

/// Header carrying provider API keys.
const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Origin the listing/analytics provider expects.
const PIKESPEAK_ORIGIN: &str = "https://near.social";

/// Endpoint layout and client for all upstream providers.
#[derive(Debug, Clone)]
pub struct Upstream {
    http: ResilientClient,
    pikespeak: Url,
    nearblocks: Url,
    pagoda: Url,
    rpc: Url,
    prices: Url,
    nominations_contract: String,
    elections_contract: String,
    native_sentinel: String,
}

impl Upstream {
    /// Build the upstream set from config.
    pub fn new(config: &UpstreamConfig, retry: RetryConfig) -> Result<Self> {
        let parse = |name: &str, raw: &str| {
            Url::parse(raw)
                .map_err(|e| NdcError::config(format!("upstream.{name} '{raw}' is not a URL: {e}")))
        };
        Ok(Self {
            http: ResilientClient::new(retry, Duration::from_secs(config.timeout_secs))?,
            pikespeak: parse("pikespeak_url", &config.pikespeak_url)?,
            nearblocks: parse("nearblocks_url", &config.nearblocks_url)?,
            pagoda: parse("pagoda_url", &config.pagoda_url)?,
            rpc: parse("rpc_url", &config.rpc_url)?,
            prices: parse("prices_url", &config.prices_url)?,
            nominations_contract: config.nominations_contract.clone(),
            elections_contract: config.elections_contract.clone(),
            native_sentinel: config.native_sentinel.clone(),
        })
    }

    /// Contract id of the native-currency row in balance responses.
    pub fn native_sentinel(&self) -> &str {
        &self.native_sentinel
    }

    // -----------------------------------------------------------------------
    // Listing / analytics provider
    // -----------------------------------------------------------------------

    /// One page of the nominations listing starting at `offset`.
    #[instrument(skip(self, creds))]
    pub async fn candidates_page(
        &self,
        creds: &Credentials,
        offset: usize,
    ) -> Result<Vec<CandidateRow>> {
        let mut url = endpoint(&self.pikespeak, &["nominations", "candidates"])?;
        url.query_pairs_mut()
            .append_pair("contract", &self.nominations_contract)
            .append_pair("offset", &offset.to_string());
        self.http.get_json(&url, pikespeak_headers(creds)?).await
    }

    /// Accounts that voted for `candidate`.
    pub async fn voters(&self, creds: &Credentials, candidate: &str) -> Result<Vec<String>> {
        let mut url = endpoint(&self.pikespeak, &["election", "votes-by-candidate"])?;
        url.query_pairs_mut()
            .append_pair("contract", &self.elections_contract)
            .append_pair("candidate", candidate);
        let rows: Vec<VoteRow> = self.http.get_json(&url, pikespeak_headers(creds)?).await?;
        Ok(rows.into_iter().map(|r| r.voter).collect())
    }

    pub async fn tx_count(&self, creds: &Credentials, candidate: &str) -> Result<u64> {
        let url = endpoint(&self.pikespeak, &["account", "tx-count", candidate])?;
        self.http.get_json(&url, pikespeak_headers(creds)?).await
    }

    /// All balance rows of `candidate`, native row included.
    pub async fn balances(&self, creds: &Credentials, candidate: &str) -> Result<Vec<BalanceRow>> {
        let url = endpoint(&self.pikespeak, &["account", "balance", candidate])?;
        self.http.get_json(&url, pikespeak_headers(creds)?).await
    }

    pub async fn eth_addresses(&self, creds: &Credentials, candidate: &str) -> Result<Vec<String>> {
        let url = endpoint(&self.pikespeak, &["bridge", "probable-eth-addresses", candidate])?;
        self.http.get_json(&url, pikespeak_headers(creds)?).await
    }

    // -----------------------------------------------------------------------
    // Other providers
    // -----------------------------------------------------------------------

    /// Native balance and creation block timestamp.
    pub async fn account(&self, candidate: &str) -> Result<AccountInfo> {
        let url = endpoint(&self.nearblocks, &["v1", "account", candidate])?;
        let resp: AccountResponse = self.http.get_json(&url, HeaderMap::new()).await?;
        let row = resp
            .account
            .into_iter()
            .next()
            .ok_or_else(|| NdcError::schema(url.as_str(), "empty account list"))?;
        Ok(AccountInfo {
            amount: row.amount,
            created: row.created.block_timestamp,
        })
    }

    /// NFT contract positions with inline contract metadata.
    pub async fn nft_holdings(&self, creds: &Credentials, candidate: &str) -> Result<Vec<NftCount>> {
        let url = endpoint(&self.pagoda, &["eapi", "v1", "accounts", candidate, "NFT"])?;
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, header_value(&creds.pagoda_api_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let resp: NftCountsResponse = self.http.get_json(&url, headers).await?;
        Ok(resp.nft_counts)
    }

    /// On-chain `ft_metadata` of a token contract, best effort.
    ///
    /// Any failure (status, transport, RPC error, undecodable bytes) yields
    /// `None`; the caller records the holding without metadata.
    pub async fn ft_metadata(&self, contract_id: &str) -> Option<FtMetadataPayload> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let resp: RpcResponse = match self
            .http
            .post_json(&self.rpc, headers, &RpcRequest::ft_metadata(contract_id))
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                debug!(contract_id, error = %e, "ft_metadata call failed");
                return None;
            }
        };

        let Some(call) = resp.result else {
            debug!(contract_id, "ft_metadata returned no result");
            return None;
        };
        match serde_json::from_slice(&call.result) {
            Ok(meta) => Some(meta),
            Err(e) => {
                debug!(contract_id, error = %e, "ft_metadata bytes did not decode");
                None
            }
        }
    }

    /// The public price listing, contract id to price.
    ///
    /// Entries whose price is not a finite number are dropped.
    #[instrument(skip(self))]
    pub async fn price_sheet(&self) -> Result<HashMap<String, f64>> {
        let listing: PriceListing = self.http.get_json(&self.prices, HeaderMap::new()).await?;
        let mut prices = HashMap::with_capacity(listing.len());
        for (contract, entry) in listing {
            match entry.price.trim().parse::<f64>() {
                Ok(price) if price.is_finite() => {
                    prices.insert(contract, price);
                }
                _ => warn!(contract, price = %entry.price, "skipping unparsable price"),
            }
        }
        Ok(prices)
    }
}

/// Append path segments to a base URL, percent-encoding each one.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| NdcError::config(format!("{base} cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn header_value(raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw).map_err(|e| NdcError::config(format!("invalid API key header: {e}")))
}

fn pikespeak_headers(creds: &Credentials) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(API_KEY_HEADER, header_value(&creds.pikespeak_api_key)?);
    headers.insert(ORIGIN, HeaderValue::from_static(PIKESPEAK_ORIGIN));
    Ok(headers)
}
