//! In-memory collaborators for provisioner tests.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::sync::Mutex;

use crate::component::Component;
use crate::error::{Result, VerticeError};
use crate::provision::{CartonBox, IaasClient, Machine};
use crate::repository::{Repo, RepositoryManager};
use crate::router::Router;
use crate::store::MetadataStore;
use crate::types::Status;

// ---------------------------------------------------------------------------
// FakeIaas
// ---------------------------------------------------------------------------

/// Records every call as `"<op> <target>"`; ops named in `fail_on` return an
/// RPC error after being recorded.
#[derive(Default)]
pub struct FakeIaas {
    calls: Mutex<Vec<String>>,
    fail: Mutex<HashSet<&'static str>>,
    images: Mutex<HashSet<String>>,
    machines: Mutex<Vec<Machine>>,
    boot_log: Mutex<Vec<String>>,
    boot_log_breaks: Mutex<bool>,
    pub templates: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl FakeIaas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(self, image: &str) -> Self {
        self.images.lock().unwrap().insert(image.to_string());
        self
    }

    pub fn with_machine(self, m: Machine) -> Self {
        self.machines.lock().unwrap().push(m);
        self
    }

    pub fn with_boot_log(self, lines: &[&str]) -> Self {
        *self.boot_log.lock().unwrap() = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Boot log that yields `lines` and then fails with an I/O error.
    pub fn with_broken_boot_log(self, lines: &[&str]) -> Self {
        *self.boot_log_breaks.lock().unwrap() = true;
        self.with_boot_log(lines)
    }

    pub fn fail_on(&self, op: &'static str) {
        self.fail.lock().unwrap().insert(op);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    fn record(&self, op: &'static str, target: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("{op} {target}"));
        if self.fail.lock().unwrap().contains(op) {
            return Err(VerticeError::Rpc(format!("{op} refused")));
        }
        Ok(())
    }
}

impl IaasClient for FakeIaas {
    fn is_valid_image(&self, box_name: &str, image_id: &str) -> Result<bool> {
        self.record("is_valid_image", box_name)?;
        Ok(self.images.lock().unwrap().contains(image_id))
    }

    fn create_machine(&self, machine: &Machine) -> Result<String> {
        self.record("create_machine", &machine.name)?;
        Ok("417".to_string())
    }

    fn destroy_machine(&self, machine: &Machine) -> Result<()> {
        self.record("destroy_machine", &machine.name)
    }

    fn start_machine(&self, machine: &Machine) -> Result<()> {
        self.record("start_machine", &machine.name)
    }

    fn stop_machine(&self, machine: &Machine) -> Result<()> {
        self.record("stop_machine", &machine.name)
    }

    fn restart_machine(&self, machine: &Machine) -> Result<()> {
        self.record("restart_machine", &machine.name)
    }

    fn list_machines(&self, b: &CartonBox) -> Result<Vec<Machine>> {
        self.record("list_machines", &b.name)?;
        Ok(self.machines.lock().unwrap().clone())
    }

    fn exec(
        &self,
        machine: &Machine,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        cmd: &str,
        args: &[String],
    ) -> Result<()> {
        self.record("exec", &machine.name)?;
        writeln!(stdout, "{cmd} {}", args.join(" "))?;
        Ok(())
    }

    fn boot_log(&self, machine: &Machine) -> Result<Box<dyn BufRead + Send>> {
        self.record("boot_log", &machine.name)?;
        let lines = self.boot_log.lock().unwrap().clone();
        if *self.boot_log_breaks.lock().unwrap() {
            let text: String = lines.iter().map(|l| format!("{l}\n")).collect();
            let reader = Cursor::new(text.into_bytes()).chain(ConnectionLost);
            return Ok(Box::new(BufReader::new(reader)));
        }
        Ok(Box::new(Cursor::new(lines.join("\n").into_bytes())))
    }

    fn upsert_template(&self, name: &str, args: &HashMap<String, String>) -> Result<()> {
        self.record("upsert_template", name)?;
        self.templates
            .lock()
            .unwrap()
            .insert(name.to_string(), args.clone());
        Ok(())
    }

    fn remove_template(&self, name: &str) -> Result<()> {
        self.record("remove_template", name)?;
        self.templates.lock().unwrap().remove(name);
        Ok(())
    }
}

struct ConnectionLost;

impl Read for ConnectionLost {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "log stream reset",
        ))
    }
}

// ---------------------------------------------------------------------------
// FakeStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    components: Mutex<HashMap<String, Component>>,
    deleted_components: Mutex<Vec<String>>,
    deleted_assemblies: Mutex<Vec<String>>,
    updates: Mutex<usize>,
    reject: Mutex<Option<Status>>,
}

impl FakeStore {
    pub fn with_component(self, c: Component) -> Self {
        self.components.lock().unwrap().insert(c.id.clone(), c);
        self
    }

    pub fn component(&self, id: &str) -> Option<Component> {
        self.components.lock().unwrap().get(id).cloned()
    }

    pub fn status_of(&self, id: &str) -> Option<String> {
        self.component(id).map(|c| c.status)
    }

    pub fn updates(&self) -> usize {
        *self.updates.lock().unwrap()
    }

    pub fn deleted_components(&self) -> Vec<String> {
        self.deleted_components.lock().unwrap().clone()
    }

    pub fn deleted_assemblies(&self) -> Vec<String> {
        self.deleted_assemblies.lock().unwrap().clone()
    }

    /// Fail any update that would write `status`.
    pub fn reject_status(&self, status: Status) {
        *self.reject.lock().unwrap() = Some(status);
    }
}

impl MetadataStore for FakeStore {
    fn fetch_component(&self, id: &str) -> Result<Component> {
        self.component(id)
            .ok_or_else(|| VerticeError::Store(format!("component {id} not found")))
    }

    fn update_component(&self, component: &Component) -> Result<()> {
        if let Some(rejected) = *self.reject.lock().unwrap() {
            if component.status == rejected.as_str() {
                return Err(VerticeError::Store(format!("status {rejected} rejected")));
            }
        }
        *self.updates.lock().unwrap() += 1;
        self.components
            .lock()
            .unwrap()
            .insert(component.id.clone(), component.clone());
        Ok(())
    }

    fn delete_component(&self, id: &str) -> Result<()> {
        self.components.lock().unwrap().remove(id);
        self.deleted_components.lock().unwrap().push(id.to_string());
        Ok(())
    }

    fn delete_assembly(&self, id: &str) -> Result<()> {
        self.deleted_assemblies.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeRouter / RecordingManager
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeRouter {
    calls: Mutex<Vec<String>>,
}

impl FakeRouter {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Router for FakeRouter {
    fn set_cname(&self, cname: &str, name: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("set_cname {cname} {name}"));
        Ok(())
    }

    fn unset_cname(&self, cname: &str, name: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("unset_cname {cname} {name}"));
        Ok(())
    }

    fn addr(&self, name: &str) -> Result<String> {
        Ok(format!("{name}.fake.io"))
    }

    fn remove_backend(&self, name: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("remove_backend {name}"));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingManager {
    pub removed: Mutex<Vec<String>>,
}

impl RepositoryManager for RecordingManager {
    fn create_hook(&self, repo: &Repo) -> Result<String> {
        Ok(format!("hook-{}", repo.url))
    }

    fn remove_hook(&self, repo: &Repo) -> Result<()> {
        self.removed.lock().unwrap().push(repo.url.clone());
        Ok(())
    }
}

/// Route `tracing` output to the test harness. `RUST_LOG` raises the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// A component record with the given status label.
pub fn component(id: &str, name: &str, status: &str) -> Component {
    Component {
        id: id.to_string(),
        name: name.to_string(),
        status: status.to_string(),
        ..Default::default()
    }
}
