use std::collections::HashMap;
use std::io::{BufRead, Write};

use super::{CartonBox, Machine};
use crate::error::Result;

/// Remote API that owns virtual machines.
///
/// Implementations wrap one backend (OpenNebula XML-RPC, ...). A provisioner
/// shares one client across concurrent operations, so implementations
/// synchronize internally. Errors are reported raw; provisioners attach the
/// box name.
pub trait IaasClient: Send + Sync {
    /// Whether `image_id` may be deployed as `box_name`.
    fn is_valid_image(&self, box_name: &str, image_id: &str) -> Result<bool>;

    /// Allocate and boot a VM, returning the backend's id for it.
    fn create_machine(&self, machine: &Machine) -> Result<String>;

    fn destroy_machine(&self, machine: &Machine) -> Result<()>;

    fn start_machine(&self, machine: &Machine) -> Result<()>;

    fn stop_machine(&self, machine: &Machine) -> Result<()>;

    fn restart_machine(&self, machine: &Machine) -> Result<()>;

    /// Machines currently backing `b` that can accept commands.
    fn list_machines(&self, b: &CartonBox) -> Result<Vec<Machine>>;

    fn exec(
        &self,
        machine: &Machine,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        cmd: &str,
        args: &[String],
    ) -> Result<()>;

    /// Boot/provision log of a machine, read line by line until EOF.
    fn boot_log(&self, machine: &Machine) -> Result<Box<dyn BufRead + Send>>;

    /// Create or replace the VM template `name`.
    fn upsert_template(&self, name: &str, args: &HashMap<String, String>) -> Result<()>;

    fn remove_template(&self, name: &str) -> Result<()>;
}
