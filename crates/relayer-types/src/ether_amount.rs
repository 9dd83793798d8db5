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

use ethers::types::U256;
use ethers::utils::{format_ether, parse_ether};
use serde::{Deserialize, Serialize, Serializer};

/// An amount of the native token, stored in wei.
///
/// Deserializes from a decimal ether string (`"0.001"`) or number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct EtherAmount(pub U256);

impl EtherAmount {
    /// Parses an ether denominated decimal.
    pub fn from_ether(value: &str) -> Result<Self, ethers::utils::ConversionError> {
        parse_ether(value).map(Self)
    }

    /// The amount in wei.
    pub fn wei(&self) -> U256 {
        self.0
    }
}

impl std::fmt::Display for EtherAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ETH", format_ether(self.0))
    }
}

impl From<U256> for EtherAmount {
    fn from(wei: U256) -> Self {
        Self(wei)
    }
}

impl Serialize for EtherAmount {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_ether(self.0))
    }
}

impl<'de> Deserialize<'de> for EtherAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct EtherVisitor;
        impl<'de> serde::de::Visitor<'de> for EtherVisitor {
            type Value = EtherAmount;

            fn expecting(
                &self,
                formatter: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                formatter.write_str("an ether amount such as \"0.001\"")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                EtherAmount::from_ether(value.trim())
                    .map_err(|e| serde::de::Error::custom(format!("{e}")))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&value.to_string())
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&value.to_string())
            }
        }

        deserializer.deserialize_any(EtherVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_strings_and_numbers() {
        let a: EtherAmount =
            serde_json::from_value(serde_json::json!("0.001")).unwrap();
        assert_eq!(a.wei(), U256::exp10(15));
        let b: EtherAmount =
            serde_json::from_value(serde_json::json!(0.5)).unwrap();
        assert_eq!(b.wei(), U256::exp10(17) * 5);
        let c: EtherAmount =
            serde_json::from_value(serde_json::json!(2)).unwrap();
        assert_eq!(c.wei(), U256::exp10(18) * 2);
    }

    #[test]
    fn serializes_back_to_ether() {
        let a = EtherAmount(U256::exp10(15));
        let text = serde_json::to_string(&a).unwrap();
        assert!(text.starts_with("\"0.001"));
    }
}
