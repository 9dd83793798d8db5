// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![allow(missing_docs)]
//! Request and response bodies shared by the HTTP handlers and the relayer.

use serde::{Deserialize, Serialize};

use confession_fee_oracle_backends::FeeSource;
use confession_relayer_store::SortOrder;
use confession_relayer_types::{Confession, VoteType};

/// Anonymous voter identity, generated and kept by the client.
pub const VISITOR_ID_HEADER: &str = "x-visitor-id";
/// Admin session token.
pub const ADMIN_SESSION_HEADER: &str = "x-admin-session";

/// Representation for IP address response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpInformationResponse {
    pub ip: String,
}

/// `{ "success": true }`
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// `{ "success": true, ..data }`
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Success<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Body of `POST /api/relayer/submit`.
///
/// Every field is optional at the wire level so that validation can report
/// all missing fields at once.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitRequest {
    pub confession_text: Option<String>,
    pub category: Option<String>,
    pub payment_tx_hash: Option<String>,
}

/// Successful relayed submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub confession: Confession,
    /// The relayer's anchoring transaction.
    pub tx_hash: String,
    pub fee_source: FeeSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

/// `GET /api/relayer/info`
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayerInfoResponse {
    pub enabled: bool,
    pub relayer_address: Option<String>,
    /// Required fee in ether.
    pub fee: Option<String>,
    /// Required fee in wei.
    pub fee_wei: Option<String>,
    pub fee_source: Option<FeeSource>,
    /// Relayer balance in ether.
    pub balance: Option<String>,
    pub has_sufficient_balance: bool,
    pub contract_address: Option<String>,
    pub chain_id: Option<u64>,
}

/// Query string of `GET /api/confessions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    pub category: Option<String>,
    pub sort: Option<SortOrder>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// A confession annotated with the requesting visitor's vote.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfessionWithVote {
    #[serde(flatten)]
    pub confession: Confession,
    pub user_vote: Option<VoteType>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfessionListResponse {
    pub success: bool,
    pub confessions: Vec<ConfessionWithVote>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfessionResponse {
    pub success: bool,
    pub confession: ConfessionWithVote,
}

/// Body of `POST /api/confessions/:id/vote`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub vote_type: VoteType,
    #[serde(default)]
    pub visitor_id: Option<String>,
}

/// Optional body of `DELETE /api/confessions/:id/vote`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoveVoteRequest {
    pub visitor_id: Option<String>,
}

/// Body of `PATCH /api/confessions/:id/visibility`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRequest {
    pub is_hidden: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceRequest {
    pub wallet_address: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub wallet_address: String,
    pub signature: String,
    pub message: String,
}

/// Response of `GET /api/admin/session`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use confession_relayer_types::Category;

    #[test]
    fn submit_request_tolerates_missing_fields() {
        let req: SubmitRequest =
            serde_json::from_str(r#"{"confessionText":"gm"}"#).unwrap();
        assert_eq!(req.confession_text.as_deref(), Some("gm"));
        assert!(req.category.is_none());
        assert!(req.payment_tx_hash.is_none());
    }

    #[test]
    fn user_vote_is_flattened_next_to_confession_fields() {
        let item = ConfessionWithVote {
            confession: Confession::anchored("gm", Category::Wisdom, "0xabc"),
            user_vote: Some(VoteType::Like),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["userVote"], "like");
        assert_eq!(json["displayText"], "gm");
        assert_eq!(json["isAnchored"], true);
    }

    #[test]
    fn list_query_parses_sort() {
        let q: ListQuery =
            serde_json::from_str(r#"{"sort":"top","limit":5}"#).unwrap();
        assert_eq!(q.sort, Some(SortOrder::Top));
        assert_eq!(q.limit, Some(5));
    }
}
