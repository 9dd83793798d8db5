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

use std::collections::HashSet;

use ethers::types::H256;
use parking_lot::Mutex;

/// Payment transaction hashes already consumed by a relayed submission.
///
/// Process-local and not persisted; a restart forgets every claim.
#[derive(Debug, Default)]
pub struct PaymentClaims {
    claimed: Mutex<HashSet<H256>>,
}

impl PaymentClaims {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically marks `hash` as used. Returns `false` when it already was.
    pub fn claim(&self, hash: H256) -> bool {
        self.claimed.lock().insert(hash)
    }

    /// Forgets a claim. Only valid before the relayer transaction is broadcast.
    pub fn release(&self, hash: &H256) -> bool {
        self.claimed.lock().remove(hash)
    }

    /// Whether `hash` is marked as used.
    pub fn is_claimed(&self, hash: &H256) -> bool {
        self.claimed.lock().contains(hash)
    }

    /// Number of claimed hashes.
    pub fn len(&self) -> usize {
        self.claimed.lock().len()
    }

    /// Whether nothing was claimed yet.
    pub fn is_empty(&self) -> bool {
        self.claimed.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn claim_is_insert_if_absent() {
        let claims = PaymentClaims::new();
        let h = H256::random();
        assert!(claims.claim(h));
        assert!(!claims.claim(h));
        assert!(claims.is_claimed(&h));
        assert!(claims.release(&h));
        assert!(!claims.is_claimed(&h));
        assert!(claims.claim(h));
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let claims = Arc::new(PaymentClaims::new());
        let h = H256::random();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let claims = claims.clone();
                std::thread::spawn(move || claims.claim(h))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(claims.len(), 1);
    }
}
