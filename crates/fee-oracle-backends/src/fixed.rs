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

use confession_relayer_utils::Result;
use ethers::types::U256;

use crate::{FeeQuote, FeeSource};

/// A backend that always quotes the same amount.
#[derive(Debug, Clone, Copy)]
pub struct FixedFeeBackend {
    quote: FeeQuote,
}

impl FixedFeeBackend {
    /// A fixed quote reported as coming from `source`.
    #[must_use]
    pub fn new(amount: U256, source: FeeSource) -> Self {
        Self {
            quote: FeeQuote { amount, source },
        }
    }

    /// The configured default fee, reported as [`FeeSource::Fallback`].
    #[must_use]
    pub fn fallback(amount: U256) -> Self {
        Self::new(amount, FeeSource::Fallback)
    }
}

#[async_trait::async_trait]
impl super::FeeBackend for FixedFeeBackend {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn required_fee(&self) -> Result<FeeQuote> {
        Ok(self.quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FeeBackend;

    #[tokio::test]
    async fn it_works() {
        let backend = FixedFeeBackend::fallback(U256::from(42u64));
        let quote = backend.required_fee().await.unwrap();
        assert_eq!(quote.amount, U256::from(42u64));
        assert_eq!(quote.source, FeeSource::Fallback);
        assert_eq!(
            serde_json::to_value(quote.source).unwrap(),
            serde_json::json!("fallback")
        );
    }
}
