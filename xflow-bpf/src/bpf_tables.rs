//! libbpf-backed flow tables.
//!
//! `BpfFlowMaps` loads the XDP classifier and exposes its two per-CPU hash
//! maps (`flows` and `cache`). Attaching returns an [`XdpAttachment`] that owns
//! the XDP link independently of the maps, so the engine can keep reading the
//! tables while holding the attachment guard. Only available with the `bpf`
//! feature.

use std::mem::MaybeUninit;

use libbpf_rs::skel::{OpenSkel, SkelBuilder};
use libbpf_rs::{Link, Map, MapCore, MapFlags, OpenObject};
use xflow_schema::{Accumulator, FlowKey};

use crate::tables::{Attachment, BpfError, ColdCache, LiveTable, TableError};

mod flow_skel {
    include!(concat!(env!("OUT_DIR"), "/flow.skel.rs"));
}

use flow_skel::*;

/// Loaded classifier and its maps.
pub struct BpfFlowMaps<'obj> {
    skel: FlowSkel<'obj>,
}

impl<'obj> BpfFlowMaps<'obj> {
    /// Open and load the classifier.
    ///
    /// `object` backs the libbpf object and must outlive the maps.
    pub fn load(object: &'obj mut MaybeUninit<OpenObject>) -> Result<Self, BpfError> {
        let open_skel = FlowSkelBuilder::default()
            .open(object)
            .map_err(|e| BpfError::Load(e.to_string()))?;

        let skel = open_skel
            .load()
            .map_err(|e| BpfError::Load(e.to_string()))?;

        Ok(Self { skel })
    }

    /// Attach the classifier to `interface` in generic XDP mode.
    ///
    /// # Errors
    /// Returns `BpfError` if the interface does not exist, permissions are
    /// missing, or the kernel rejects the attachment.
    pub fn attach(&self, interface: &str) -> Result<XdpAttachment, BpfError> {
        let ifindex = nix::net::if_::if_nametoindex(interface)
            .map_err(|_| BpfError::InterfaceNotFound(interface.to_string()))?;

        let link = self
            .skel
            .progs
            .xdp_flow
            .attach_xdp(ifindex as i32)
            .map_err(|e| {
                if e.to_string().contains("permission") || e.to_string().contains("EPERM") {
                    BpfError::InsufficientPermissions
                } else {
                    BpfError::Attach {
                        interface: interface.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        Ok(XdpAttachment {
            link: Some(link),
            interface: interface.to_string(),
        })
    }

    /// The classifier's live table.
    pub fn live(&self) -> BpfLiveTable<'_> {
        BpfLiveTable {
            map: &self.skel.maps.flows,
        }
    }

    /// The finalized-flow cache.
    pub fn cold(&self) -> BpfColdCache<'_> {
        BpfColdCache {
            map: &self.skel.maps.cache,
        }
    }
}

/// XDP link guard. Dropping it detaches the classifier.
pub struct XdpAttachment {
    link: Option<Link>,
    interface: String,
}

impl Attachment for XdpAttachment {
    fn interface(&self) -> &str {
        &self.interface
    }

    fn detach(&mut self) -> Result<(), BpfError> {
        match self.link.take() {
            Some(link) => link.detach().map_err(|e| BpfError::Detach {
                interface: self.interface.clone(),
                reason: e.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Live table backed by the `flows` map.
pub struct BpfLiveTable<'a> {
    map: &'a Map<'a>,
}

impl LiveTable for BpfLiveTable<'_> {
    fn keys(&self) -> Result<Vec<FlowKey>, TableError> {
        self.map
            .keys()
            .map(|raw| FlowKey::from_bytes(&raw).map_err(TableError::from))
            .collect()
    }

    fn lookup(&self, key: &FlowKey) -> Result<Option<Vec<Accumulator>>, TableError> {
        read_percpu(self.map, key)
    }

    fn delete(&self, key: &FlowKey) -> Result<(), TableError> {
        match self.map.delete(&key.to_bytes()) {
            Ok(()) => Ok(()),
            // Already gone; the classifier never deletes, but a resize can.
            Err(e) if e.kind() == libbpf_rs::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TableError::Delete(e.to_string())),
        }
    }
}

/// Cold cache backed by the `cache` map.
pub struct BpfColdCache<'a> {
    map: &'a Map<'a>,
}

impl ColdCache for BpfColdCache<'_> {
    fn lookup(&self, key: &FlowKey) -> Result<Option<Vec<Accumulator>>, TableError> {
        read_percpu(self.map, key)
    }

    fn insert(&self, key: FlowKey, shards: &[Accumulator]) -> Result<(), TableError> {
        let values: Vec<Vec<u8>> = shards.iter().map(|s| s.to_bytes().to_vec()).collect();
        self.map
            .update_percpu(&key.to_bytes(), &values, MapFlags::ANY)
            .map_err(|e| TableError::Write(e.to_string()))
    }

    fn remove(&self, key: &FlowKey) -> Result<(), TableError> {
        match self.map.delete(&key.to_bytes()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == libbpf_rs::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TableError::Delete(e.to_string())),
        }
    }

    fn entries(&self) -> Result<Vec<(FlowKey, Vec<Accumulator>)>, TableError> {
        let mut out = Vec::new();
        for raw in self.map.keys() {
            let key = FlowKey::from_bytes(&raw)?;
            if let Some(shards) = read_percpu(self.map, &key)? {
                out.push((key, shards));
            }
        }
        Ok(out)
    }
}

fn read_percpu(map: &Map<'_>, key: &FlowKey) -> Result<Option<Vec<Accumulator>>, TableError> {
    let values = map
        .lookup_percpu(&key.to_bytes(), MapFlags::ANY)
        .map_err(|e| TableError::Read(e.to_string()))?;

    match values {
        Some(per_cpu) => {
            let shards = per_cpu
                .iter()
                .map(|v| Accumulator::from_bytes(v))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(shards))
        }
        None => Ok(None),
    }
}
