//! Engine configuration
//!
//! Loaded from JSON; every field except `node_program` has a default.

use ledger_types::errors::EngineError;
use ledger_types::fee::FeeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Program that collects protocol fees, hex encoded in JSON
    #[serde(with = "hex_bytes")]
    pub node_program: Vec<u8>,
    pub fee: FeeConfig,
}

impl EngineConfig {
    pub fn new(node_program: Vec<u8>) -> Self {
        Self { node_program, ..Default::default() }
    }

    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json).map_err(|e| EngineError::Config {
            message: format!("malformed engine config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| EngineError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.node_program.is_empty() {
            return Err(EngineError::Config {
                message: "node_program must not be empty".to_string(),
            });
        }
        self.fee.validate().map_err(|e| EngineError::Config { message: e.to_string() })
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_types::fee::FeePolicyKind;
    use rust_decimal::Decimal;

    #[test]
    fn test_config_from_json() {
        let config = EngineConfig::from_json_str(
            r#"{
                "node_program": "0014fefe",
                "fee": { "taker_fee_bps": 10, "validation_policy": "maker_taker" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.node_program, vec![0x00, 0x14, 0xfe, 0xfe]);
        assert_eq!(config.fee.taker_fee_bps, 10);
        assert_eq!(config.fee.maker_fee_bps, 0);
        assert_eq!(config.fee.validation_policy, FeePolicyKind::MakerTaker);
        assert_eq!(config.fee.build_policy, FeePolicyKind::CappedDifferential);
    }

    #[test]
    fn test_config_requires_node_program() {
        assert!(matches!(
            EngineConfig::from_json_str("{}"),
            Err(EngineError::Config { .. })
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"node_program": "zz"}"#),
            Err(EngineError::Config { .. })
        ));
    }

    #[test]
    fn test_config_rejects_bad_rate() {
        let mut config = EngineConfig::new(vec![0x51]);
        config.fee.max_fee_rate = Decimal::from(2);
        assert!(matches!(config.validate(), Err(EngineError::Config { .. })));
    }

    #[test]
    fn test_config_serde_round_trip_keeps_hex() {
        let config = EngineConfig::new(vec![0xab, 0xcd]);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["node_program"], "abcd");
    }
}
