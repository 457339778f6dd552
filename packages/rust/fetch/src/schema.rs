//! Wire shapes of the upstream responses.
//!
//! Decoding into these types is the schema validation: a payload that does
//! not fit is rejected by [`crate::ResilientClient`] before the engine sees it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One row of the nominations listing.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateRow {
    pub nominee: String,
    pub house: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteRow {
    pub voter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub account: Vec<AccountRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountRow {
    pub amount: String,
    pub created: CreatedBlock,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedBlock {
    pub block_timestamp: u64,
}

/// Native balance and creation time of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub amount: String,
    pub created: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NftCountsResponse {
    pub nft_counts: Vec<NftCount>,
}

/// An NFT contract position with the contract's inline metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct NftCount {
    pub contract_account_id: String,
    pub nft_count: u64,
    pub contract_metadata: NftContractMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NftContractMetadata {
    pub name: String,
    pub symbol: String,
}

/// One row of the balance API, native currency included.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceRow {
    pub contract: String,
    pub amount: String,
    pub symbol: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Price listing: contract id to `{ "price": "<decimal>" }`.
pub type PriceListing = HashMap<String, PriceEntry>;

#[derive(Debug, Clone, Deserialize)]
pub struct PriceEntry {
    pub price: String,
}

// ---------------------------------------------------------------------------
// JSON-RPC
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: &'static str,
    pub method: &'static str,
    pub params: CallFunctionParams<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CallFunctionParams<'a> {
    pub request_type: &'static str,
    pub finality: &'static str,
    pub account_id: &'a str,
    pub method_name: &'static str,
    pub args_base64: &'static str,
}

impl<'a> RpcRequest<'a> {
    /// `ft_metadata` view call against `contract_id` at final finality.
    pub(crate) fn ft_metadata(contract_id: &'a str) -> Self {
        Self {
            jsonrpc: "2.0",
            id: "dontcare",
            method: "query",
            params: CallFunctionParams {
                request_type: "call_function",
                finality: "final",
                account_id: contract_id,
                method_name: "ft_metadata",
                args_base64: "",
            },
        }
    }
}

/// JSON-RPC envelope; `result` is absent when the node reports an error.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub result: Option<CallFunctionResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallFunctionResult {
    /// Raw bytes returned by the view function.
    pub result: Vec<u8>,
}

/// The JSON a token contract returns from `ft_metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FtMetadataPayload {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}
