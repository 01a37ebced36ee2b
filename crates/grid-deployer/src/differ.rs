//! Workload graph diffing
//!
//! Splits a deployment's workloads into the set that stays and the machine
//! workloads to tear down, dragging each machine's dependents (mounts, log
//! shippers, reserved public IP) into the removal set. Network workloads are
//! never removed here; networks go through the teardown path in the
//! reconciler.

use std::collections::BTreeSet;

use grid_zos::{MachineKind, Workload, WorkloadData, WorkloadType};

/// Workload kinds subject to name-based removal. Everything except the
/// network kinds.
pub fn default_delete_types() -> Vec<WorkloadType> {
    vec![
        WorkloadType::PublicIp,
        WorkloadType::PublicIpv4,
        WorkloadType::Zmachine,
        WorkloadType::ZmachineLight,
        WorkloadType::Zmount,
        WorkloadType::Volume,
        WorkloadType::Zdb,
        WorkloadType::Qsfs,
        WorkloadType::GatewayFqdnProxy,
        WorkloadType::GatewayNameProxy,
        WorkloadType::Zlogs,
    ]
}

/// Partition `workloads` into `(remaining, removed_machines)`.
///
/// An empty `names` selects every machine workload. A removed machine drags
/// its mounts, the log shippers pointing at it and its reserved public IP
/// into the removal set. Order of `remaining` preserves the input order.
pub fn split_workloads(
    workloads: &[Workload],
    names: &[String],
    types: &[WorkloadType],
) -> (Vec<Workload>, Vec<Workload>) {
    let mut names: BTreeSet<String> = if names.is_empty() {
        workloads
            .iter()
            .filter(|w| w.workload_type().is_machine())
            .map(|w| w.name.clone())
            .collect()
    } else {
        names.iter().cloned().collect()
    };

    let mut removed_machines = Vec::new();
    for kind in [MachineKind::Standard, MachineKind::Light] {
        for workload in workloads {
            let Some((machine_kind, machine)) = workload.data.as_machine() else {
                continue;
            };
            if machine_kind != kind || !names.contains(&workload.name) {
                continue;
            }

            for mount in &machine.mounts {
                names.insert(mount.name.clone());
            }
            for dependent in workloads {
                if let WorkloadData::Zlogs(zlogs) = &dependent.data {
                    let attached = match kind {
                        MachineKind::Standard => zlogs.zmachine.as_deref(),
                        MachineKind::Light => zlogs.zmachine_light.as_deref(),
                    };
                    if attached == Some(workload.name.as_str()) {
                        names.insert(dependent.name.clone());
                    }
                }
            }
            if let Some(public_ip) = machine.network.public_ip_name() {
                names.insert(public_ip.to_string());
            }
            removed_machines.push(workload.clone());
        }
    }

    let remaining = workloads
        .iter()
        .filter(|w| {
            w.workload_type().is_network()
                || !types.contains(&w.workload_type())
                || !names.contains(&w.name)
        })
        .cloned()
        .collect();

    (remaining, removed_machines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_zos::{
        Machine, MachineNetwork, Mount, NetworkLight, PublicIp, Workload, WorkloadData, Zlogs,
        Zmount,
    };

    fn network_workload() -> Workload {
        Workload::new(
            0,
            "netA",
            WorkloadData::NetworkLight(NetworkLight {
                subnet: "10.20.2.0/24".to_string(),
                ip_range: "10.20.0.0/16".to_string(),
                node_id: 11,
                mycelium: None,
            }),
        )
    }

    fn machine_workload(name: &str, public_ip: &str, mounts: &[&str]) -> Workload {
        let machine = Machine {
            flist: "https://hub.grid.tf/base.flist".to_string(),
            network: MachineNetwork::for_kind(
                grid_zos::MachineKind::Standard,
                "netA",
                "10.20.2.2",
                false,
                public_ip,
                None,
            ),
            mounts: mounts
                .iter()
                .map(|m| Mount {
                    name: m.to_string(),
                    mountpoint: format!("/mnt/{m}"),
                })
                .collect(),
            ..Machine::default()
        };
        Workload::new(0, name, WorkloadData::Machine(machine))
    }

    fn disk_workload(name: &str) -> Workload {
        Workload::new(0, name, WorkloadData::Zmount(Zmount { size: 1 << 30 }))
    }

    fn fixture() -> Vec<Workload> {
        vec![
            network_workload(),
            machine_workload("vm1", "vm1_pubip", &["disk1"]),
            disk_workload("disk1"),
            Workload::new(0, "vm1_pubip", WorkloadData::PublicIp(PublicIp::default())),
            Workload::new(
                0,
                "vm1_logs",
                WorkloadData::Zlogs(Zlogs {
                    zmachine: Some("vm1".to_string()),
                    zmachine_light: None,
                    output: "redis://logs".to_string(),
                }),
            ),
            machine_workload("vm2", "", &[]),
        ]
    }

    #[test]
    fn machine_drags_its_dependents() {
        let workloads = fixture();
        let (remaining, removed) =
            split_workloads(&workloads, &["vm1".to_string()], &default_delete_types());

        let remaining_names: Vec<&str> = remaining.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(remaining_names, vec!["netA", "vm2"]);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].name, "vm1");
    }

    #[test]
    fn empty_names_select_all_machines() {
        let workloads = fixture();
        let (remaining, removed) = split_workloads(&workloads, &[], &default_delete_types());

        let remaining_names: Vec<&str> = remaining.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(remaining_names, vec!["netA"]);
        assert_eq!(removed.len(), 2);
    }

    #[test]
    fn networks_survive_any_request() {
        let workloads = fixture();
        let (remaining, removed) =
            split_workloads(&workloads, &["netA".to_string()], &default_delete_types());
        assert!(remaining.iter().any(|w| w.name == "netA"));
        assert!(removed.is_empty());
    }

    #[test]
    fn unknown_name_is_a_noop() {
        let workloads = fixture();
        let (remaining, removed) =
            split_workloads(&workloads, &["nope".to_string()], &default_delete_types());
        assert_eq!(remaining.len(), workloads.len());
        assert!(removed.is_empty());
    }

    #[test]
    fn split_is_idempotent() {
        let workloads = fixture();
        let names = vec!["vm1".to_string()];
        let first = split_workloads(&workloads, &names, &default_delete_types());
        let second = split_workloads(&workloads, &names, &default_delete_types());
        assert_eq!(first, second);
    }

    #[test]
    fn preserves_input_order() {
        let workloads = fixture();
        let (remaining, _) = split_workloads(&workloads, &["nope".to_string()], &default_delete_types());
        let names: Vec<&str> = remaining.iter().map(|w| w.name.as_str()).collect();
        let original: Vec<&str> = workloads.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, original);
    }
}
