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

use confession_relayer_chain::{ChainClient, PaymentStatus, PaymentTransaction};
use confession_relayer_utils::probe;
use ethers::types::{Address, H256, U256};

use crate::submit::SubmissionError;

const BPS_DENOMINATOR: u64 = 10_000;

/// Whether `paid` covers `tolerance_bps` basis points of `fee`.
pub fn covers_fee(paid: U256, fee: U256, tolerance_bps: u32) -> bool {
    paid.saturating_mul(U256::from(BPS_DENOMINATOR))
        >= fee.saturating_mul(U256::from(tolerance_bps))
}

/// Checks that `hash` is a mined, successful transfer to `relayer` worth at
/// least `tolerance_bps` of `fee`.
///
/// Single-use is enforced separately by the payment claims.
#[tracing::instrument(skip(chain), fields(%hash))]
pub async fn verify_payment(
    chain: &dyn ChainClient,
    hash: H256,
    relayer: Address,
    fee: U256,
    tolerance_bps: u32,
) -> Result<PaymentTransaction, SubmissionError> {
    let tx = chain
        .payment_transaction(hash)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up payment transaction");
            SubmissionError::PaymentLookup
        })?
        .ok_or(SubmissionError::PaymentNotFound)?;

    match tx.status {
        PaymentStatus::Pending => return Err(SubmissionError::PaymentPending),
        PaymentStatus::Reverted => return Err(SubmissionError::PaymentReverted),
        PaymentStatus::Success => {}
    }

    // H160 equality is byte-wise, so checksum casing never matters.
    if tx.to != Some(relayer) {
        return Err(SubmissionError::WrongRecipient {
            expected: relayer,
            received: tx.to,
        });
    }

    if !covers_fee(tx.value, fee, tolerance_bps) {
        return Err(SubmissionError::InsufficientPayment {
            required: fee,
            received: tx.value,
        });
    }

    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::PaymentVerify,
        verified = true,
        payment = %hash,
        value = %tx.value,
    );
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use confession_relayer_chain::MockedChainClient;
    use ethers::utils::parse_ether;

    const BPS: u32 = 9_000;

    fn relayer() -> Address {
        Address::repeat_byte(0x42)
    }

    #[test]
    fn tolerance_band() {
        let fee = U256::from(1_000u64);
        assert!(covers_fee(U256::from(900u64), fee, BPS));
        assert!(!covers_fee(U256::from(899u64), fee, BPS));
        assert!(covers_fee(U256::from(2_000u64), fee, BPS));
        assert!(covers_fee(U256::zero(), U256::zero(), BPS));
    }

    #[tokio::test]
    async fn accepts_confirmed_payment_within_tolerance() {
        let chain = MockedChainClient::new(relayer());
        let fee = parse_ether("0.001").unwrap();
        let hash = chain.add_confirmed_payment(relayer(), fee * 9 / 10);
        let tx = verify_payment(&chain, hash, relayer(), fee, BPS).await.unwrap();
        assert_eq!(tx.hash, hash);
    }

    #[tokio::test]
    async fn refuses_unknown_pending_and_reverted() {
        let chain = MockedChainClient::new(relayer());
        let fee = U256::from(100u64);
        let unknown = H256::repeat_byte(9);
        assert_eq!(
            verify_payment(&chain, unknown, relayer(), fee, BPS).await.unwrap_err(),
            SubmissionError::PaymentNotFound
        );

        for (byte, status, expected) in [
            (1u8, PaymentStatus::Pending, SubmissionError::PaymentPending),
            (2u8, PaymentStatus::Reverted, SubmissionError::PaymentReverted),
        ] {
            let hash = H256::repeat_byte(byte);
            chain.add_payment(PaymentTransaction {
                hash,
                from: Address::repeat_byte(1),
                to: Some(relayer()),
                value: fee,
                status,
            });
            assert_eq!(
                verify_payment(&chain, hash, relayer(), fee, BPS).await.unwrap_err(),
                expected
            );
        }
    }

    #[tokio::test]
    async fn names_expected_and_received_recipient() {
        let chain = MockedChainClient::new(relayer());
        let elsewhere = Address::repeat_byte(0x07);
        let hash = chain.add_confirmed_payment(elsewhere, U256::from(100u64));
        assert_eq!(
            verify_payment(&chain, hash, relayer(), U256::from(100u64), BPS)
                .await
                .unwrap_err(),
            SubmissionError::WrongRecipient {
                expected: relayer(),
                received: Some(elsewhere),
            }
        );
    }

    #[tokio::test]
    async fn underpayment_reports_amounts() {
        let chain = MockedChainClient::new(relayer());
        let hash = chain.add_confirmed_payment(relayer(), U256::from(50u64));
        assert_eq!(
            verify_payment(&chain, hash, relayer(), U256::from(100u64), BPS)
                .await
                .unwrap_err(),
            SubmissionError::InsufficientPayment {
                required: U256::from(100u64),
                received: U256::from(50u64),
            }
        );
    }

    #[tokio::test]
    async fn rpc_failure_is_an_upstream_error() {
        let chain = MockedChainClient::new(relayer());
        let hash = chain.add_confirmed_payment(relayer(), U256::from(100u64));
        chain.set_rpc_down(true);
        assert_eq!(
            verify_payment(&chain, hash, relayer(), U256::from(100u64), BPS)
                .await
                .unwrap_err(),
            SubmissionError::PaymentLookup
        );
    }
}
