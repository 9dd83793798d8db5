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

use derive_more::Display;
/// Target for logger
pub const TARGET: &str = "confession_probe";

/// The Kind of the Probe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// When the Lifecycle of the Relayer changes, like starting or shutting down.
    #[display(fmt = "lifecycle")]
    Lifecycle,
    /// A relayed confession submission moving through its steps.
    #[display(fmt = "relayer_submit")]
    RelayerSubmit,
    /// Outcome of checking a user payment transaction.
    #[display(fmt = "payment_verify")]
    PaymentVerify,
    /// Relayer Transaction Queue state.
    #[display(fmt = "tx_queue")]
    TxQueue,
    /// Admin challenge and session events.
    #[display(fmt = "admin_auth")]
    AdminAuth,
    /// A caller hit the submission rate limit.
    #[display(fmt = "rate_limit")]
    RateLimit,
    /// Fee quote source changes.
    #[display(fmt = "fee_oracle")]
    FeeOracle,
}
