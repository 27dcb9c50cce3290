use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Status label of a box, as written to the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    Deploying,
    Creating,
    Running,
    Starting,
    Stopping,
    Stopped,
    Restarting,
    Error,
    Destroying,
    Destroyed,
}

impl Status {
    pub fn all() -> &'static [Status] {
        &[
            Status::Pending,
            Status::Deploying,
            Status::Creating,
            Status::Running,
            Status::Starting,
            Status::Stopping,
            Status::Stopped,
            Status::Restarting,
            Status::Error,
            Status::Destroying,
            Status::Destroyed,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Deploying => "deploying",
            Status::Creating => "creating",
            Status::Running => "running",
            Status::Starting => "starting",
            Status::Stopping => "stopping",
            Status::Stopped => "stopped",
            Status::Restarting => "restarting",
            Status::Error => "error",
            Status::Destroying => "destroying",
            Status::Destroyed => "destroyed",
        }
    }

    /// True while a provisioning operation is still in flight.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Status::Deploying
                | Status::Creating
                | Status::Starting
                | Status::Stopping
                | Status::Restarting
                | Status::Destroying
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = crate::error::VerticeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::all()
            .iter()
            .copied()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::error::VerticeError::InvalidStatus(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// EnvVar
// ---------------------------------------------------------------------------

/// Environment variable injected into a box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}
