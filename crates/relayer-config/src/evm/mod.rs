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

use confession_relayer_types::{PrivateKey, RpcUrl};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// EvmConfig describes the chain confessions are anchored on.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EvmConfig {
    /// Http(s) Endpoint for quick Req/Res
    #[serde(skip_serializing, alias = "http_endpoint")]
    pub http_endpoint: Option<RpcUrl>,
    /// Block Explorer for this chain.
    ///
    /// Optional, and only used for printing a clickable links
    /// for transactions and building explorer urls in responses.
    pub explorer: Option<url::Url>,
    /// chain specific id (output of chainId opcode on EVM networks)
    #[serde(rename(serialize = "chainId"), alias = "chain_id")]
    pub chain_id: u64,
    /// The anchor contract exposing `getFee`, `isAnchored` and `anchor`.
    #[serde(rename(serialize = "contractAddress"), alias = "contract_address")]
    pub contract_address: Option<Address>,
    /// The Private Key of the relayer wallet on this network
    /// the format is more dynamic here:
    /// 1. if it starts with '0x' then this would be raw (64 bytes) hex encoded
    ///    private key.
    ///    Example: 0x8917174396171783496173419137618235192359106130478137647163400318
    ///
    /// 2. if it starts with '$' then it would be considered as an Enviroment variable
    ///    of a hex-encoded private key.
    ///   Example: $RELAYER_PRIVATE_KEY
    #[serde(skip_serializing, alias = "private_key")]
    pub private_key: Option<PrivateKey>,
}

impl Default for EvmConfig {
    fn default() -> Self {
        Self {
            http_endpoint: None,
            explorer: None,
            chain_id: crate::defaults::CHAIN_ID,
            contract_address: None,
            private_key: None,
        }
    }
}
