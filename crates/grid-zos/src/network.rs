//! Network workload payload

use serde::{Deserialize, Serialize};

use crate::Challenge;

/// Mycelium overlay configuration on a network workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mycelium {
    pub hex_key: String,
    #[serde(default)]
    pub peers: Vec<String>,
}

/// Light private network payload.
///
/// The payload of a network workload is shared with the `LogicalNetwork`
/// that produced it; mutations go through the network's refresh routine so
/// every deployment holding this workload stays in sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkLight {
    /// The /24 carved out for the hosting node.
    pub subnet: String,
    /// The /16 of the whole logical network.
    pub ip_range: String,
    /// The node this subnet is assigned to.
    #[serde(default)]
    pub node_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mycelium: Option<Mycelium>,
}

impl Challenge for NetworkLight {
    fn challenge(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.subnet);
        out.push_str(&self.ip_range);
        if let Some(mycelium) = &self.mycelium {
            out.push_str(&mycelium.hex_key);
            for peer in &mycelium.peers {
                out.push_str(peer);
            }
        }
        out
    }
}
