//! Public IP, gateway and log-shipping payloads

use serde::{Deserialize, Serialize};

use crate::Challenge;

/// A reserved public address on a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIp {
    #[serde(default)]
    pub v4: bool,
    #[serde(default)]
    pub v6: bool,
}

impl Challenge for PublicIp {
    fn challenge(&self) -> String {
        format!("{}{}", self.v4, self.v6)
    }
}

/// Gateway proxying an externally owned domain to backends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayFqdnProxy {
    pub fqdn: String,
    #[serde(default)]
    pub tls_passthrough: bool,
    #[serde(default)]
    pub backends: Vec<String>,
}

impl Challenge for GatewayFqdnProxy {
    fn challenge(&self) -> String {
        let mut out = format!("{}{}", self.fqdn, self.tls_passthrough);
        for backend in &self.backends {
            out.push_str(backend);
        }
        out
    }
}

/// Gateway serving under a grid-managed name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayNameProxy {
    pub name: String,
    #[serde(default)]
    pub tls_passthrough: bool,
    #[serde(default)]
    pub backends: Vec<String>,
}

impl Challenge for GatewayNameProxy {
    fn challenge(&self) -> String {
        let mut out = format!("{}{}", self.name, self.tls_passthrough);
        for backend in &self.backends {
            out.push_str(backend);
        }
        out
    }
}

/// Log shipping for a machine workload.
///
/// Exactly one of `zmachine`/`zmachine_light` names the machine whose logs
/// are shipped, matching the machine variant it points at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Zlogs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zmachine: Option<String>,
    #[serde(
        default,
        rename = "zmachine-light",
        skip_serializing_if = "Option::is_none"
    )]
    pub zmachine_light: Option<String>,
    pub output: String,
}

impl Zlogs {
    /// Name of the machine this log shipper is attached to.
    pub fn machine_name(&self) -> Option<&str> {
        self.zmachine.as_deref().or(self.zmachine_light.as_deref())
    }
}

impl Challenge for Zlogs {
    fn challenge(&self) -> String {
        let mut out = String::new();
        if let Some(name) = self.machine_name() {
            out.push_str(name);
        }
        out.push_str(&self.output);
        out
    }
}
