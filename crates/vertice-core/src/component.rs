//! Component records as served by the metadata store.
//!
//! A component is the durable description of one box. Provisioning
//! operations build a [`CartonBox`] from it just before they run and write
//! status changes back to it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provision::CartonBox;
use crate::repository::{self, Hook, Repo};
use crate::types::{EnvVar, Status};

pub const DOMAIN: &str = "domain";
pub const PUBLICIPV4: &str = "publicipv4";
pub const PRIVATEIPV4: &str = "privateipv4";
pub const PROVIDER: &str = "provider";
pub const STORAGE_TYPE: &str = "storage_type";
pub const ROUTER: &str = "router";
pub const STATUS: &str = "status";
pub const LAST_STATUS_UPDATE: &str = "lastsuccessstatusupdate";
pub const VERTICE: &str = "vertice";

/// RFC 822 timestamp, e.g. `02 Jan 06 15:04 UTC`.
const RFC822: &str = "%d %b %y %H:%M %Z";

// ---------------------------------------------------------------------------
// JsonPairs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonPair {
    pub key: String,
    pub value: String,
}

impl JsonPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered key/value list. Keys may repeat; lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonPairs(pub Vec<JsonPair>);

impl JsonPairs {
    /// Value of the first pair named `key`, or `""`.
    pub fn match_key(&self, key: &str) -> &str {
        self.0
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
            .unwrap_or("")
    }

    /// Remove every pair whose key appears in `entries`, then append the
    /// entries.
    pub fn nuke_and_set(&mut self, entries: &[(&str, String)]) {
        self.0
            .retain(|p| !entries.iter().any(|(k, _)| *k == p.key));
        self.0
            .extend(entries.iter().map(|(k, v)| JsonPair::new(*k, v.clone())));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Repository block of a component record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentRepo {
    #[serde(default)]
    pub rtype: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub oneclick: String,
    #[serde(default, rename = "url")]
    pub rurl: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub properties: JsonPairs,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    pub artifact_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub requirements: JsonPairs,
}

/// Envelope the API wraps single records in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiComponent {
    #[serde(default)]
    pub json_claz: String,
    pub results: Component,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "tosca_type")]
    pub tosca: String,
    #[serde(default)]
    pub inputs: JsonPairs,
    #[serde(default)]
    pub outputs: JsonPairs,
    #[serde(default)]
    pub envs: JsonPairs,
    #[serde(default)]
    pub repo: ComponentRepo,
    #[serde(default)]
    pub artifacts: Option<Artifacts>,
    #[serde(default)]
    pub related_components: Vec<String>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Component {
    /// Parsed status label; `None` when the record carries an unknown or
    /// empty label.
    pub fn current_status(&self) -> Option<Status> {
        self.status.parse().ok()
    }

    /// Record a new status and the time of the change in the inputs.
    pub fn set_status(&mut self, status: Status) {
        self.set_status_label(status.as_str());
    }

    /// Like [`Component::set_status`] for labels outside [`Status`], such as
    /// a status written by another service that is being restored.
    pub fn set_status_label(&mut self, label: &str) {
        let stamp = Utc::now().format(RFC822).to_string();
        self.inputs
            .nuke_and_set(&[(LAST_STATUS_UPDATE, stamp), (STATUS, label.to_string())]);
        self.status = label.to_string();
    }

    /// Whether the record already carries `label`, ignoring case and
    /// surrounding whitespace.
    pub fn has_status(&self, label: &str) -> bool {
        self.status.trim().eq_ignore_ascii_case(label.trim())
    }

    pub fn set_state(&mut self, state: impl Into<String>) {
        self.state = state.into();
    }

    pub fn domain(&self) -> &str {
        self.inputs.match_key(DOMAIN)
    }

    pub fn provider(&self) -> &str {
        self.inputs.match_key(PROVIDER)
    }

    pub fn storage_type(&self) -> String {
        self.inputs.match_key(STORAGE_TYPE).to_lowercase()
    }

    pub fn public_ip(&self) -> &str {
        self.outputs.match_key(PUBLICIPV4)
    }

    fn router(&self) -> Option<String> {
        let r = self.inputs.match_key(ROUTER);
        (!r.is_empty()).then(|| r.to_string())
    }

    fn with_one_click(&self) -> bool {
        self.repo.oneclick.trim() == "true" && self.repo.source == VERTICE
    }

    /// Every env pair becomes an environment variable of the box.
    pub fn env_vars(&self) -> Vec<EnvVar> {
        self.envs
            .0
            .iter()
            .map(|p| EnvVar {
                name: p.key.clone(),
                value: p.value.clone(),
            })
            .collect()
    }

    fn box_repo(&self, carton_id: &str) -> Option<Repo> {
        if self.repo == ComponentRepo::default() {
            return None;
        }
        let hook = build_hook(&self.operations).map(|mut h| {
            h.carton_id = carton_id.to_string();
            h.box_id = self.id.clone();
            h
        });
        Some(Repo {
            repo_type: self.repo.rtype.clone(),
            source: self.repo.source.clone(),
            url: self.repo.rurl.clone(),
            one_click: self.with_one_click(),
            hook,
        })
    }

    /// Build the box a provisioner operates on.
    pub fn mk_box(
        &self,
        carton_id: &str,
        org_id: &str,
        vm_id: &str,
        vnets: BTreeMap<String, String>,
    ) -> CartonBox {
        CartonBox {
            id: self.id.clone(),
            carton_id: carton_id.to_string(),
            name: self.name.clone(),
            org_id: org_id.to_string(),
            domain_name: self.domain().to_string(),
            tosca: self.tosca.clone(),
            public_ip: self.public_ip().to_string(),
            vnets,
            storage_type: self.storage_type(),
            provider: self.provider().to_string(),
            router: self.router(),
            vm_id: vm_id.to_string(),
            envs: self.env_vars(),
            repo: self.box_repo(carton_id),
            status: self.current_status().unwrap_or_default(),
            state: self.state.clone(),
        }
    }
}

/// Hook settings from the first `CI` operation.
fn build_hook(ops: &[Operation]) -> Option<Hook> {
    let op = ops.iter().find(|o| o.operation_type == repository::CI)?;
    let p = &op.properties;
    Some(Hook {
        enabled: p.match_key(repository::CI_ENABLED) == "true",
        token: p.match_key(repository::CI_TOKEN).to_string(),
        scm: p.match_key(repository::CI_SCM).to_string(),
        username: p.match_key(repository::CI_USER).to_string(),
        url: p.match_key(repository::CI_URL).to_string(),
        api_version: p.match_key(repository::CI_APIVERSION).to_string(),
        carton_id: String::new(),
        box_id: String::new(),
    })
}
