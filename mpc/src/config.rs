//! Session configuration of a single party.

use std::{
    fmt,
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::MpcError,
    executor::{BatchedEvaluator, EvaluationStrategy},
    spdz::DEFAULT_MAC_CHECK_THRESHOLD,
    transport::NetworkConfig,
};

/// Prime field used in a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum FieldKind {
    #[serde(rename = "97")]
    Fp97,
    #[serde(rename = "61")]
    Mersenne61,
    #[default]
    #[serde(rename = "127")]
    Mersenne127,
}

impl FromStr for FieldKind {
    type Err = MpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "97" => Ok(FieldKind::Fp97),
            "61" => Ok(FieldKind::Mersenne61),
            "127" => Ok(FieldKind::Mersenne127),
            other => Err(MpcError::contract(format!("unknown field {:?}", other))),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Fp97 => "97",
            FieldKind::Mersenne61 => "61",
            FieldKind::Mersenne127 => "127",
        };
        f.write_str(name)
    }
}

/// Source of preprocessed material.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierConfig {
    /// Insecure material derived from a seed shared by all parties.
    Fake { seed: u8 },
    /// Material written by the dealer. `#` in the path is replaced with the party ID.
    Precomputed { path: String },
}

impl Default for SupplierConfig {
    fn default() -> Self {
        SupplierConfig::Fake { seed: 0 }
    }
}

fn default_batch_capacity() -> usize {
    BatchedEvaluator::DEFAULT_BATCH_CAPACITY
}

fn default_mac_check_threshold() -> usize {
    DEFAULT_MAC_CHECK_THRESHOLD
}

/// Everything one party needs to join a session.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SessionConfig {
    pub party_id: usize,
    #[serde(flatten)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub field: FieldKind,
    #[serde(default = "default_batch_capacity")]
    pub batch_capacity: usize,
    #[serde(default)]
    pub strategy: EvaluationStrategy,
    #[serde(default = "default_mac_check_threshold")]
    pub mac_check_threshold: usize,
    #[serde(default)]
    pub receive_timeout_secs: Option<u64>,
    #[serde(default)]
    pub supplier: SupplierConfig,
}

impl SessionConfig {
    /// Load and validate configuration from JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MpcError> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader).map_err(io::Error::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MpcError> {
        let num_parties = self.network.num_parties();
        if num_parties < 2 {
            return Err(MpcError::contract("session needs at least two parties"));
        }
        if self.party_id >= num_parties {
            return Err(MpcError::contract(format!(
                "party {} is not among the {} configured parties",
                self.party_id, num_parties
            )));
        }
        if self.batch_capacity == 0 {
            return Err(MpcError::contract("batch capacity must be positive"));
        }
        if self.mac_check_threshold == 0 {
            return Err(MpcError::contract("MAC check threshold must be positive"));
        }
        Ok(())
    }

    pub fn num_parties(&self) -> usize {
        self.network.num_parties()
    }

    pub fn evaluator(&self) -> BatchedEvaluator {
        BatchedEvaluator::new(self.batch_capacity, self.strategy)
    }

    pub fn receive_timeout(&self) -> Option<Duration> {
        self.receive_timeout_secs.map(Duration::from_secs)
    }

    /// Path of this party's file, with `#` in `pattern` replaced by the party ID.
    pub fn party_path(&self, pattern: &str) -> PathBuf {
        pattern.replace('#', &self.party_id.to_string()).into()
    }

    /// Path of precomputed material of this party, if configured.
    pub fn precomputed_path(&self) -> Option<PathBuf> {
        match &self.supplier {
            SupplierConfig::Precomputed { path } => Some(self.party_path(path)),
            SupplierConfig::Fake { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{
        "party_id": 1,
        "parties": [{"address": "127.0.0.1:9000"}, {"address": "127.0.0.1:9001"}],
        "field": "61",
        "strategy": "sequential_batched",
        "receive_timeout_secs": 30,
        "supplier": {"precomputed": {"path": "data/party#.bin"}}
    }"#;

    #[test]
    fn test_parse() {
        let config: SessionConfig = serde_json::from_str(RAW).unwrap();
        config.validate().unwrap();
        assert_eq!(config.num_parties(), 2);
        assert_eq!(config.field, FieldKind::Mersenne61);
        assert_eq!(config.strategy, EvaluationStrategy::SequentialBatched);
        assert_eq!(config.batch_capacity, BatchedEvaluator::DEFAULT_BATCH_CAPACITY);
        assert_eq!(config.receive_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(
            config.precomputed_path(),
            Some(PathBuf::from("data/party1.bin"))
        );
    }

    #[test]
    fn test_defaults() {
        let raw = r#"{
            "party_id": 0,
            "parties": [{"address": "127.0.0.1:9000"}, {"address": "127.0.0.1:9001"}]
        }"#;
        let config: SessionConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.field, FieldKind::Mersenne127);
        assert_eq!(config.strategy, EvaluationStrategy::Greedy);
        assert_eq!(config.supplier, SupplierConfig::Fake { seed: 0 });
        assert_eq!(config.precomputed_path(), None);
        assert_eq!(config.receive_timeout(), None);
    }

    #[test]
    fn test_validate() {
        let mut config: SessionConfig = serde_json::from_str(RAW).unwrap();
        config.party_id = 2;
        assert!(config.validate().is_err());
        config.party_id = 0;
        config.batch_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_field_kind_from_str() {
        assert_eq!("97".parse::<FieldKind>().unwrap(), FieldKind::Fp97);
        assert_eq!(FieldKind::Mersenne127.to_string(), "127");
        assert!("13".parse::<FieldKind>().is_err());
    }
}
