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

use std::sync::Arc;

use confession_relayer_chain::ChainClient;
use confession_relayer_utils::Result;

use crate::{FeeQuote, FeeSource};

/// Reads `getFee()` from the anchor contract on every call.
#[derive(Debug, Clone)]
pub struct ContractFeeBackend {
    chain: Arc<dyn ChainClient>,
}

impl ContractFeeBackend {
    /// Creates a backend over `chain`.
    #[must_use]
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }
}

#[async_trait::async_trait]
impl super::FeeBackend for ContractFeeBackend {
    fn name(&self) -> &'static str {
        "contract"
    }

    async fn required_fee(&self) -> Result<FeeQuote> {
        let amount = self.chain.required_fee().await?;
        Ok(FeeQuote {
            amount,
            source: FeeSource::Contract,
        })
    }
}
