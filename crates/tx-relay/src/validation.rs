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

use std::str::FromStr;

use confession_relayer_handler_utils::SubmitRequest;
use confession_relayer_types::Category;
use ethers::types::H256;
use serde::Serialize;

/// A problem with one request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Wire name of the field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// A submission whose shape has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    /// Confession text, as sent.
    pub text: String,
    /// Parsed category.
    pub category: Category,
    /// The user's payment transaction.
    pub payment_tx_hash: H256,
}

/// `0x` followed by exactly 64 hex digits.
fn parse_tx_hash(raw: &str) -> Option<H256> {
    let digits = raw.strip_prefix("0x")?;
    if digits.len() != 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    H256::from_str(digits).ok()
}

/// Checks every field of a submission without any I/O, reporting all
/// problems at once.
pub fn validate_submission(
    request: &SubmitRequest,
    max_length: usize,
) -> Result<ValidSubmission, Vec<FieldError>> {
    let mut errors = Vec::new();

    let text = match request.confession_text.as_deref() {
        None => {
            errors.push(FieldError::new("confessionText", "Required"));
            None
        }
        Some(t) if t.trim().is_empty() => {
            errors.push(FieldError::new("confessionText", "Must not be empty"));
            None
        }
        Some(t) if t.chars().count() > max_length => {
            errors.push(FieldError::new(
                "confessionText",
                format!("Must be at most {max_length} characters"),
            ));
            None
        }
        Some(t) => Some(t.to_owned()),
    };

    let category = match request.category.as_deref() {
        None => {
            errors.push(FieldError::new("category", "Required"));
            None
        }
        Some(c) => match Category::from_str(c) {
            Ok(c) => Some(c),
            Err(e) => {
                errors.push(FieldError::new("category", e.to_string()));
                None
            }
        },
    };

    let payment_tx_hash = match request.payment_tx_hash.as_deref() {
        None => {
            errors.push(FieldError::new("paymentTxHash", "Required"));
            None
        }
        Some(h) => {
            let parsed = parse_tx_hash(h.trim());
            if parsed.is_none() {
                errors.push(FieldError::new(
                    "paymentTxHash",
                    "Must be 0x followed by 64 hex characters",
                ));
            }
            parsed
        }
    };

    match (text, category, payment_tx_hash) {
        (Some(text), Some(category), Some(payment_tx_hash)) => {
            Ok(ValidSubmission {
                text,
                category,
                payment_tx_hash,
            })
        }
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str, category: &str, hash: &str) -> SubmitRequest {
        SubmitRequest {
            confession_text: Some(text.into()),
            category: Some(category.into()),
            payment_tx_hash: Some(hash.into()),
        }
    }

    const HASH: &str =
        "0x1111111111111111111111111111111111111111111111111111111111111111";

    #[test]
    fn accepts_well_formed_submission() {
        let valid = validate_submission(&request("gm", "Wisdom", HASH), 1000)
            .unwrap();
        assert_eq!(valid.category, Category::Wisdom);
        assert_eq!(valid.payment_tx_hash, H256::repeat_byte(0x11));
    }

    #[test]
    fn length_is_counted_in_characters() {
        let text = "é".repeat(1000);
        assert!(validate_submission(&request(&text, "Wisdom", HASH), 1000).is_ok());
        let text = "a".repeat(1001);
        let errs =
            validate_submission(&request(&text, "Wisdom", HASH), 1000).unwrap_err();
        assert_eq!(errs[0].field, "confessionText");
    }

    #[test]
    fn reports_every_bad_field() {
        let errs =
            validate_submission(&request("  ", "Gossip", "0x1234"), 1000).unwrap_err();
        let fields: Vec<_> = errs.iter().map(|e| e.field).collect();
        assert_eq!(fields, ["confessionText", "category", "paymentTxHash"]);

        let errs = validate_submission(&SubmitRequest::default(), 1000).unwrap_err();
        assert_eq!(errs.len(), 3);
    }

    #[test]
    fn hash_needs_prefix_and_exact_length() {
        assert!(parse_tx_hash(HASH.trim_start_matches("0x")).is_none());
        assert!(parse_tx_hash(&format!("{HASH}00")).is_none());
        assert!(parse_tx_hash(&HASH.replace('1', "g")).is_none());
        assert!(parse_tx_hash(&HASH.to_uppercase().replacen("0X", "0x", 1)).is_some());
    }
}
