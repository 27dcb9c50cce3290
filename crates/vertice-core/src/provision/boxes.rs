use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::repository::Repo;
use crate::types::{EnvVar, Status};

/// One provisionable unit of a carton.
///
/// Built from a [`crate::component::Component`] right before an operation.
/// The metadata store stays authoritative for `status`; the copy here is
/// what the running pipeline last wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartonBox {
    pub id: String,
    pub carton_id: String,
    pub name: String,
    pub org_id: String,
    pub domain_name: String,
    #[serde(default)]
    pub tosca: String,
    #[serde(default)]
    pub public_ip: String,
    /// Network name per interface role, e.g. `ipv4_pub → public-net`.
    #[serde(default)]
    pub vnets: BTreeMap<String, String>,
    #[serde(default)]
    pub storage_type: String,
    /// Name of the provisioner that owns this box.
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub router: Option<String>,
    /// Id the IaaS backend assigned to the VM, empty until created.
    #[serde(default)]
    pub vm_id: String,
    #[serde(default)]
    pub envs: Vec<EnvVar>,
    #[serde(default)]
    pub repo: Option<Repo>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub state: String,
}

impl CartonBox {
    pub fn new(
        id: impl Into<String>,
        carton_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            carton_id: carton_id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// `name.domain`, or just the name when no domain is set.
    pub fn fqdn(&self) -> String {
        if self.domain_name.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.domain_name)
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain_name = domain.into();
        self
    }

    pub fn with_router(mut self, router: impl Into<String>) -> Self {
        self.router = Some(router.into());
        self
    }

    pub fn with_vnet(mut self, role: impl Into<String>, network: impl Into<String>) -> Self {
        self.vnets.insert(role.into(), network.into());
        self
    }

    pub fn with_vm_id(mut self, vm_id: impl Into<String>) -> Self {
        self.vm_id = vm_id.into();
        self
    }

    pub fn with_repo(mut self, repo: Repo) -> Self {
        self.repo = Some(repo);
        self
    }
}
