use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::CartonBox;
use crate::types::{EnvVar, Status};

/// The virtual machine backing a box.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    /// Fully qualified host name, also the VM name on the backend.
    pub name: String,
    pub box_id: String,
    pub carton_id: String,
    pub vm_id: String,
    pub image: String,
    pub vnets: BTreeMap<String, String>,
    pub storage_type: String,
    pub public_ip: String,
    pub envs: Vec<EnvVar>,
    pub status: Status,
}

impl Machine {
    pub fn from_box(b: &CartonBox, image: &str) -> Self {
        Self {
            name: b.fqdn(),
            box_id: b.id.clone(),
            carton_id: b.carton_id.clone(),
            vm_id: b.vm_id.clone(),
            image: image.to_string(),
            vnets: b.vnets.clone(),
            storage_type: b.storage_type.clone(),
            public_ip: b.public_ip.clone(),
            envs: b.envs.clone(),
            status: b.status,
        }
    }

    /// True once the backend has assigned an id.
    pub fn is_created(&self) -> bool {
        !self.vm_id.is_empty()
    }
}
