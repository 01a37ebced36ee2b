//! Deployment envelope, challenge hashing and signing

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::workload::Workload;
use crate::Challenge;

/// Key scheme of a signature, decided by the external signing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeypairType {
    Sr25519,
    Ed25519,
}

/// External signing seam. Key management is not this crate's concern; the
/// deployment hands over the decoded challenge hash and stores whatever
/// signature comes back.
pub trait Signer: Send + Sync {
    fn sign(&self, data: &[u8]) -> Vec<u8>;
    fn keypair_type(&self) -> KeypairType;
}

/// One twin that must (or may) sign the deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureRequest {
    pub twin_id: u32,
    pub required: bool,
    pub weight: u32,
}

impl Challenge for SignatureRequest {
    fn challenge(&self) -> String {
        format!("{}{}{}", self.twin_id, self.required, self.weight)
    }
}

/// A signature produced against the deployment's challenge hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub twin_id: u32,
    pub signature: String,
    pub signature_type: KeypairType,
}

/// Who must sign and with what combined weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureRequirement {
    #[serde(default)]
    pub requests: Vec<SignatureRequest>,
    #[serde(default)]
    pub weight_required: u32,
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

impl SignatureRequirement {
    /// Single-signer requirement for the given twin.
    pub fn single(twin_id: u32) -> Self {
        Self {
            requests: vec![SignatureRequest {
                twin_id,
                required: false,
                weight: 1,
            }],
            weight_required: 1,
            signatures: Vec::new(),
        }
    }
}

impl Challenge for SignatureRequirement {
    fn challenge(&self) -> String {
        let mut out = String::new();
        for request in &self.requests {
            out.push_str(&request.challenge());
        }
        out.push_str(&self.weight_required.to_string());
        out
    }
}

/// The signed, contract-bound collection of workloads submitted to one node.
///
/// Identity for reconciliation is `contract_id`; `challenge_hash` matches a
/// freshly submitted deployment to its on-chain contract, which records the
/// same hash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub version: u32,
    pub twin_id: u32,
    #[serde(default)]
    pub contract_id: u64,
    #[serde(default)]
    pub expiration: u64,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub workloads: Vec<Workload>,
    #[serde(default)]
    pub signature_requirement: SignatureRequirement,
}

impl Deployment {
    pub fn new(twin_id: u32, metadata: String, description: String) -> Self {
        Self {
            version: 0,
            twin_id,
            contract_id: 0,
            expiration: 0,
            metadata,
            description,
            workloads: Vec::new(),
            signature_requirement: SignatureRequirement::single(twin_id),
        }
    }

    /// Rehydrate a transport-returned plain JSON structure into the typed tree.
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Lowercase MD5 hex of the canonical challenge string. The contract
    /// carries the same hash, which is also what gets signed.
    pub fn challenge_hash(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.challenge().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Sign the challenge hash and record the signature for `twin_id`,
    /// replacing an earlier signature by the same twin.
    pub fn sign(&mut self, twin_id: u32, signer: &dyn Signer) {
        let hash = self.challenge_hash();
        // challenge_hash always yields valid hex
        let bytes = hex::decode(&hash).unwrap_or_default();
        let signature = hex::encode(signer.sign(&bytes));
        let signature_type = signer.keypair_type();

        for existing in &mut self.signature_requirement.signatures {
            if existing.twin_id == twin_id {
                existing.signature = signature;
                existing.signature_type = signature_type;
                return;
            }
        }
        self.signature_requirement.signatures.push(Signature {
            twin_id,
            signature,
            signature_type,
        });
    }
}

impl Challenge for Deployment {
    fn challenge(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.version.to_string());
        out.push_str(&self.twin_id.to_string());
        out.push_str(&self.expiration.to_string());
        out.push_str(&self.metadata);
        out.push_str(&self.description);
        for workload in &self.workloads {
            out.push_str(&workload.challenge());
        }
        out.push_str(&self.signature_requirement.challenge());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkLight;
    use crate::workload::WorkloadData;

    struct FixedSigner;

    impl Signer for FixedSigner {
        fn sign(&self, data: &[u8]) -> Vec<u8> {
            data.iter().rev().copied().collect()
        }

        fn keypair_type(&self) -> KeypairType {
            KeypairType::Sr25519
        }
    }

    fn deployment() -> Deployment {
        let mut deployment = Deployment::new(7, String::new(), "test".to_string());
        deployment.workloads.push(Workload::new(
            0,
            "netA",
            WorkloadData::NetworkLight(NetworkLight {
                subnet: "10.20.2.0/24".to_string(),
                ip_range: "10.20.0.0/16".to_string(),
                node_id: 3,
                mycelium: None,
            }),
        ));
        deployment
    }

    #[test]
    fn challenge_hash_is_md5_hex() {
        let hash = deployment().challenge_hash();
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn challenge_ignores_contract_id() {
        let mut a = deployment();
        let mut b = deployment();
        a.contract_id = 1;
        b.contract_id = 99;
        assert_eq!(a.challenge_hash(), b.challenge_hash());
    }

    #[test]
    fn workload_change_changes_hash() {
        let a = deployment();
        let mut b = deployment();
        b.workloads[0].name = "netB".to_string();
        assert_ne!(a.challenge_hash(), b.challenge_hash());
    }

    #[test]
    fn sign_appends_then_replaces() {
        let mut deployment = deployment();
        deployment.sign(7, &FixedSigner);
        assert_eq!(deployment.signature_requirement.signatures.len(), 1);
        let first = deployment.signature_requirement.signatures[0].clone();
        assert_eq!(first.twin_id, 7);
        assert_eq!(first.signature_type, KeypairType::Sr25519);

        deployment.sign(7, &FixedSigner);
        assert_eq!(deployment.signature_requirement.signatures.len(), 1);
    }

    #[test]
    fn from_value_rehydrates_untyped_json() {
        let value = serde_json::to_value(deployment()).unwrap();
        let back = Deployment::from_value(value).unwrap();
        assert_eq!(back, deployment());
    }
}
