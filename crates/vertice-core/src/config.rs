use crate::error::{Result, VerticeError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Where the metadata store lives and which account talks to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:9000/v2".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            email: String::new(),
            api_key: String::new(),
            org_id: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProvisionerConfig
// ---------------------------------------------------------------------------

/// Settings of one provisioner backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// IaaS API endpoint, e.g. `http://one.example.com:2633/RPC2`.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Router used for boxes that do not name one.
    #[serde(default)]
    pub default_router: Option<String>,
    /// `METRICS_*=value` entries forwarded to boxes.
    #[serde(default)]
    pub metrics: Vec<String>,
}

impl ProvisionerConfig {
    /// `METRICS_*` entries split into a map. Other entries are ignored.
    pub fn metric_envs(&self) -> HashMap<String, String> {
        self.metrics
            .iter()
            .filter(|e| e.starts_with("METRICS_"))
            .filter_map(|e| e.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "default_provisioner")]
    pub default_provisioner: String,
    #[serde(default)]
    pub provisioners: HashMap<String, ProvisionerConfig>,
}

fn default_version() -> u32 {
    1
}

fn default_provisioner() -> String {
    "one".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            api: ApiConfig::default(),
            default_provisioner: default_provisioner(),
            provisioners: HashMap::new(),
        }
    }
}

impl Config {
    pub fn provisioner(&self, name: &str) -> Result<&ProvisionerConfig> {
        self.provisioners
            .get(name)
            .ok_or_else(|| VerticeError::InvalidConfig(format!("no settings for provisioner '{name}'")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VerticeError::InvalidConfig(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.api.url.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "api.url is empty".to_string(),
            });
        }

        if !self.provisioners.contains_key(&self.default_provisioner) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "default provisioner '{}' has no settings in provisioners",
                    self.default_provisioner
                ),
            });
        }

        let mut names: Vec<&String> = self.provisioners.keys().collect();
        names.sort();
        for name in names {
            let p = &self.provisioners[name];
            if p.endpoint.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("provisioner '{name}' has no endpoint"),
                });
            }
            if p.default_router.is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "provisioner '{name}' has no default_router; boxes without a router cannot be routed"
                    ),
                });
            }
            for entry in &p.metrics {
                if !entry.starts_with("METRICS_") || !entry.contains('=') {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!(
                            "provisioner '{name}' metric entry '{entry}' is not METRICS_<NAME>=<value>"
                        ),
                    });
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
api:
  url: http://api.megam.io/v2
  email: ops@megam.io
  api_key: k3y
  org_id: ORG123
provisioners:
  one:
    endpoint: http://one.megam.io:2633/RPC2
    user: oneadmin
    password: secret
    default_router: route53
    metrics:
      - METRICS_INFLUX=http://influx:8086
      - GARBAGE
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.default_provisioner, "one");
        assert_eq!(cfg.api.timeout_secs, 30);
        let one = cfg.provisioner("one").unwrap();
        assert_eq!(one.default_router.as_deref(), Some("route53"));
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.api.url, "http://localhost:9000/v2");
        assert!(cfg.provisioners.is_empty());
    }

    #[test]
    fn metric_envs_keeps_only_metrics_entries() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        let envs = cfg.provisioner("one").unwrap().metric_envs();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs["METRICS_INFLUX"], "http://influx:8086");
    }

    #[test]
    fn validate_flags_bad_metric_entry() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        assert!(warnings[0].message.contains("GARBAGE"));
    }

    #[test]
    fn validate_flags_missing_default_provisioner() {
        let cfg = Config::default();
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("'one'")));
    }

    #[test]
    fn validate_flags_missing_endpoint() {
        let mut cfg = Config::default();
        cfg.provisioners
            .insert("one".to_string(), ProvisionerConfig::default());
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("no endpoint")));
    }

    #[test]
    fn unknown_provisioner_settings_error() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.provisioner("docker").unwrap_err(),
            VerticeError::InvalidConfig(_)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf/vertice.yaml");
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        cfg.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.api.email, "ops@megam.io");
        assert_eq!(loaded.provisioner("one").unwrap().user, "oneadmin");
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
