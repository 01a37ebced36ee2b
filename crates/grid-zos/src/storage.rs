//! Storage workload payloads

use serde::{Deserialize, Serialize};

use crate::Challenge;

/// A raw disk attached to a machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zmount {
    /// In bytes.
    pub size: u64,
}

impl Challenge for Zmount {
    fn challenge(&self) -> String {
        self.size.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZdbMode {
    #[default]
    User,
    Seq,
}

impl ZdbMode {
    fn as_str(&self) -> &'static str {
        match self {
            ZdbMode::User => "user",
            ZdbMode::Seq => "seq",
        }
    }
}

/// 0-db storage namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Zdb {
    /// In bytes.
    pub size: u64,
    pub mode: ZdbMode,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub public: bool,
}

impl Challenge for Zdb {
    fn challenge(&self) -> String {
        format!(
            "{}{}{}{}",
            self.size,
            self.mode.as_str(),
            self.password,
            self.public
        )
    }
}

/// Quantum-safe filesystem. Only the fields this SDK populates; the full
/// encoder/decoder configuration lives with the workload builders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Qsfs {
    /// Cache size in bytes.
    pub cache: u64,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub minimal_shards: u32,
    #[serde(default)]
    pub expected_shards: u32,
}

impl Challenge for Qsfs {
    fn challenge(&self) -> String {
        format!(
            "{}{}{}{}",
            self.cache, self.prefix, self.minimal_shards, self.expected_shards
        )
    }
}
