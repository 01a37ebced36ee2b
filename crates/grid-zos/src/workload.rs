//! Workload envelope and the tagged payload union

use serde::{Deserialize, Serialize};

use crate::gateway::{GatewayFqdnProxy, GatewayNameProxy, PublicIp, Zlogs};
use crate::machine::{Machine, MachineKind};
use crate::network::NetworkLight;
use crate::storage::{Qsfs, Zdb, Zmount};
use crate::Challenge;

/// Workload kinds as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadType {
    #[serde(rename = "zmachine")]
    Zmachine,
    #[serde(rename = "zmachine-light")]
    ZmachineLight,
    #[serde(rename = "network")]
    Network,
    #[serde(rename = "network-light")]
    NetworkLight,
    #[serde(rename = "zmount")]
    Zmount,
    #[serde(rename = "volume")]
    Volume,
    #[serde(rename = "zdb")]
    Zdb,
    #[serde(rename = "qsfs")]
    Qsfs,
    #[serde(rename = "ip")]
    PublicIp,
    /// Deprecated in favour of `ip`, still seen on old deployments.
    #[serde(rename = "ipv4")]
    PublicIpv4,
    #[serde(rename = "gateway-fqdn-proxy")]
    GatewayFqdnProxy,
    #[serde(rename = "gateway-name-proxy")]
    GatewayNameProxy,
    #[serde(rename = "zlogs")]
    Zlogs,
}

impl WorkloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadType::Zmachine => "zmachine",
            WorkloadType::ZmachineLight => "zmachine-light",
            WorkloadType::Network => "network",
            WorkloadType::NetworkLight => "network-light",
            WorkloadType::Zmount => "zmount",
            WorkloadType::Volume => "volume",
            WorkloadType::Zdb => "zdb",
            WorkloadType::Qsfs => "qsfs",
            WorkloadType::PublicIp => "ip",
            WorkloadType::PublicIpv4 => "ipv4",
            WorkloadType::GatewayFqdnProxy => "gateway-fqdn-proxy",
            WorkloadType::GatewayNameProxy => "gateway-name-proxy",
            WorkloadType::Zlogs => "zlogs",
        }
    }

    /// True for both machine variants.
    pub fn is_machine(&self) -> bool {
        matches!(self, WorkloadType::Zmachine | WorkloadType::ZmachineLight)
    }

    /// True for both network variants. Network workloads are never removed by
    /// the workload differ; they go through the dedicated teardown path.
    pub fn is_network(&self) -> bool {
        matches!(self, WorkloadType::Network | WorkloadType::NetworkLight)
    }
}

/// Kind-specific workload payload, tagged by the wire `type` field.
///
/// Standard and light machines share one payload struct; the variant carries
/// the kind, the payload carries the kind-specific optional sub-fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WorkloadData {
    #[serde(rename = "zmachine")]
    Machine(Machine),
    #[serde(rename = "zmachine-light")]
    MachineLight(Machine),
    #[serde(rename = "network-light")]
    NetworkLight(NetworkLight),
    #[serde(rename = "zmount")]
    Zmount(Zmount),
    #[serde(rename = "volume")]
    Volume(Zmount),
    #[serde(rename = "zdb")]
    Zdb(Zdb),
    #[serde(rename = "qsfs")]
    Qsfs(Qsfs),
    #[serde(rename = "ip")]
    PublicIp(PublicIp),
    #[serde(rename = "ipv4")]
    PublicIpv4(PublicIp),
    #[serde(rename = "gateway-fqdn-proxy")]
    GatewayFqdnProxy(GatewayFqdnProxy),
    #[serde(rename = "gateway-name-proxy")]
    GatewayNameProxy(GatewayNameProxy),
    #[serde(rename = "zlogs")]
    Zlogs(Zlogs),
}

impl WorkloadData {
    pub fn workload_type(&self) -> WorkloadType {
        match self {
            WorkloadData::Machine(_) => WorkloadType::Zmachine,
            WorkloadData::MachineLight(_) => WorkloadType::ZmachineLight,
            WorkloadData::NetworkLight(_) => WorkloadType::NetworkLight,
            WorkloadData::Zmount(_) => WorkloadType::Zmount,
            WorkloadData::Volume(_) => WorkloadType::Volume,
            WorkloadData::Zdb(_) => WorkloadType::Zdb,
            WorkloadData::Qsfs(_) => WorkloadType::Qsfs,
            WorkloadData::PublicIp(_) => WorkloadType::PublicIp,
            WorkloadData::PublicIpv4(_) => WorkloadType::PublicIpv4,
            WorkloadData::GatewayFqdnProxy(_) => WorkloadType::GatewayFqdnProxy,
            WorkloadData::GatewayNameProxy(_) => WorkloadType::GatewayNameProxy,
            WorkloadData::Zlogs(_) => WorkloadType::Zlogs,
        }
    }

    /// Machine payload with its kind, for either variant.
    pub fn as_machine(&self) -> Option<(MachineKind, &Machine)> {
        match self {
            WorkloadData::Machine(m) => Some((MachineKind::Standard, m)),
            WorkloadData::MachineLight(m) => Some((MachineKind::Light, m)),
            _ => None,
        }
    }

    pub fn as_network(&self) -> Option<&NetworkLight> {
        match self {
            WorkloadData::NetworkLight(n) => Some(n),
            _ => None,
        }
    }
}

impl Challenge for WorkloadData {
    fn challenge(&self) -> String {
        match self {
            WorkloadData::Machine(m) | WorkloadData::MachineLight(m) => m.challenge(),
            WorkloadData::NetworkLight(n) => n.challenge(),
            WorkloadData::Zmount(z) | WorkloadData::Volume(z) => z.challenge(),
            WorkloadData::Zdb(z) => z.challenge(),
            WorkloadData::Qsfs(q) => q.challenge(),
            WorkloadData::PublicIp(p) | WorkloadData::PublicIpv4(p) => p.challenge(),
            WorkloadData::GatewayFqdnProxy(g) => g.challenge(),
            WorkloadData::GatewayNameProxy(g) => g.challenge(),
            WorkloadData::Zlogs(z) => z.challenge(),
        }
    }
}

/// Result state reported by the node for a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultState {
    Ok,
    Error,
    Deleted,
    Paused,
}

/// Node-reported outcome attached to a deployed workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadResult {
    #[serde(default)]
    pub created: u64,
    pub state: ResultState,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A single unit of declared infrastructure inside a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub version: u32,
    pub name: String,
    #[serde(flatten)]
    pub data: WorkloadData,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<WorkloadResult>,
}

impl Workload {
    pub fn new(version: u32, name: impl Into<String>, data: WorkloadData) -> Self {
        Self {
            version,
            name: name.into(),
            data,
            metadata: String::new(),
            description: String::new(),
            result: None,
        }
    }

    pub fn workload_type(&self) -> WorkloadType {
        self.data.workload_type()
    }

    /// True when the node reports the workload as deleted.
    pub fn is_deleted(&self) -> bool {
        matches!(
            self.result,
            Some(WorkloadResult {
                state: ResultState::Deleted,
                ..
            })
        )
    }
}

impl Challenge for Workload {
    fn challenge(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.version.to_string());
        out.push_str(&self.name);
        out.push_str(self.workload_type().as_str());
        out.push_str(&self.metadata);
        out.push_str(&self.description);
        out.push_str(&self.data.challenge());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{MachineInterface, MachineNetwork};
    use crate::network::NetworkLight;

    fn network_workload() -> Workload {
        Workload::new(
            0,
            "testnet",
            WorkloadData::NetworkLight(NetworkLight {
                subnet: "10.20.2.0/24".to_string(),
                ip_range: "10.20.0.0/16".to_string(),
                node_id: 11,
                mycelium: None,
            }),
        )
    }

    #[test]
    fn serde_round_trip_keeps_type_tag() {
        let workload = network_workload();
        let json = serde_json::to_value(&workload).unwrap();
        assert_eq!(json["type"], "network-light");
        assert_eq!(json["data"]["subnet"], "10.20.2.0/24");

        let back: Workload = serde_json::from_value(json).unwrap();
        assert_eq!(back, workload);
    }

    #[test]
    fn machine_variants_have_distinct_types() {
        let machine = Machine {
            flist: "https://hub.grid.tf/base.flist".to_string(),
            network: MachineNetwork {
                public_ip: Some(String::new()),
                planetary: Some(true),
                interfaces: vec![MachineInterface {
                    network: "testnet".to_string(),
                    ip: "10.20.2.2".to_string(),
                }],
                mycelium: None,
            },
            ..Machine::default()
        };
        let standard = Workload::new(0, "vm1", WorkloadData::Machine(machine.clone()));
        let light = Workload::new(0, "vm1", WorkloadData::MachineLight(machine));

        assert_eq!(standard.workload_type(), WorkloadType::Zmachine);
        assert_eq!(light.workload_type(), WorkloadType::ZmachineLight);
        assert_eq!(
            serde_json::to_value(&light).unwrap()["type"],
            "zmachine-light"
        );
    }

    #[test]
    fn challenge_is_deterministic() {
        let workload = network_workload();
        assert_eq!(workload.challenge(), workload.challenge());
        assert!(workload.challenge().contains("network-light"));
    }

    #[test]
    fn deleted_state_detected() {
        let mut workload = network_workload();
        assert!(!workload.is_deleted());
        workload.result = Some(WorkloadResult {
            created: 0,
            state: ResultState::Deleted,
            message: String::new(),
            data: serde_json::Value::Null,
        });
        assert!(workload.is_deleted());
    }
}
