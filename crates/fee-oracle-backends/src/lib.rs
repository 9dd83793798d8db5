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

//! Fee Oracle Backends
//!
//! A Fee Oracle Backend answers "how much must a relayed confession pay right
//! now", in wei. The anchor contract is the source of truth; when it cannot be
//! read, a fixed default keeps the relayer available.
//!
//! ## Usage
//! ```rust,ignore
//! let oracle = FeeOracleMerger::builder()
//!     .merge(Box::new(ContractFeeBackend::new(chain)))
//!     .merge(Box::new(FixedFeeBackend::fallback(default_fee)))
//!     .build();
//! let quote = oracle.required_fee().await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::fmt::Display;

use confession_relayer_utils::Result;
use ethers::types::U256;
use serde::Serialize;

/// Reads the fee from the anchor contract.
mod contract;
/// A fixed fee.
mod fixed;
/// Fallback chain over several backends.
mod merger;

pub use contract::ContractFeeBackend;
pub use fixed::FixedFeeBackend;
pub use merger::{FeeOracleMerger, FeeOracleMergerBuilder};

/// Where a fee quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeSource {
    /// Read from the anchor contract.
    Contract,
    /// The configured default, used when the contract could not be read.
    Fallback,
}

impl Display for FeeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contract => write!(f, "contract"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// A fee amount with its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    /// Fee in wei.
    pub amount: U256,
    /// Where the amount came from.
    pub source: FeeSource,
}

/// A trait for a fee backend
#[async_trait::async_trait]
pub trait FeeBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;
    /// The fee a relayed submission must pay now.
    async fn required_fee(&self) -> Result<FeeQuote>;
}
