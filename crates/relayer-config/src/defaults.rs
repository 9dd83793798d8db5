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

use confession_relayer_types::EtherAmount;
use ethers::types::U256;

/// The default port the relayer will listen on. Defaults to 9955.
pub const fn port() -> u16 {
    9955
}

/// Submissions allowed per caller and window.
pub const RATE_LIMIT_MAX_REQUESTS: u32 = 10;
/// One hour.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 3600;
/// 90% of the quoted fee.
pub const PAYMENT_TOLERANCE_BPS: u32 = 9000;
/// Anchor confirmation bound.
pub const CONFIRMATION_TIMEOUT_SECS: u64 = 60;
/// Maximum confession length in characters.
pub const MAX_CONFESSION_LENGTH: usize = 1000;
/// Five minutes.
pub const NONCE_TTL_SECS: u64 = 300;
/// One hour.
pub const SESSION_TTL_SECS: u64 = 3600;
/// Sepolia.
pub const CHAIN_ID: u64 = 11155111;

/// 0.001 of the native token.
pub fn gas_buffer() -> EtherAmount {
    EtherAmount(U256::exp10(15))
}

/// 0.0004 of the native token, roughly one dollar.
pub fn default_fee() -> EtherAmount {
    EtherAmount(U256::exp10(14) * 4)
}
