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

#![warn(missing_docs)]
//! Domain types shared across the confession relayer crates.

/// Confessions, categories and votes.
pub mod confession;
/// Ether denominated amounts read from the config.
pub mod ether_amount;
/// A module for managing the private key of the relayer wallet.
pub mod private_key;
/// A module for managing the RPC URL.
pub mod rpc_url;
/// Lexicon based sentiment scoring.
pub mod sentiment;

pub use confession::{Category, Confession, Vote, VoteType};
pub use ether_amount::EtherAmount;
pub use private_key::PrivateKey;
pub use rpc_url::RpcUrl;
