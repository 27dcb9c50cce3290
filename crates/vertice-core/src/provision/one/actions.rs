//! Pipeline steps used by [`OneProvisioner`].

use std::io::{BufRead, Write};

use serde_json::{json, Value};

use super::OneProvisioner;
use crate::action::{Action, BwContext, FwContext};
use crate::error::{Result, VerticeError};
use crate::io::progress;
use crate::provision::{CartonBox, Machine};
use crate::repository;
use crate::types::Status;

/// Arguments shared by every step of one provisioner pipeline run.
pub(crate) struct RunArgs<'p, 'w> {
    pub box_: CartonBox,
    pub image_id: String,
    pub writer: &'w mut dyn Write,
    pub is_deploy: bool,
    pub provisioner: &'p OneProvisioner,
    /// Machine created by this run, once `create-machine` succeeded.
    pub machine: Option<Machine>,
}

impl<'p, 'w> RunArgs<'p, 'w> {
    pub fn new(provisioner: &'p OneProvisioner, b: &CartonBox, writer: &'w mut dyn Write) -> Self {
        Self {
            box_: b.clone(),
            image_id: String::new(),
            writer,
            is_deploy: false,
            provisioner,
            machine: None,
        }
    }

    pub fn deploying(mut self, image_id: &str) -> Self {
        self.image_id = image_id.to_string();
        self.is_deploy = true;
        self
    }

    /// The machine this run operates on: the one it created, else the one
    /// described by the box.
    fn machine(&self) -> Machine {
        self.machine
            .clone()
            .unwrap_or_else(|| Machine::from_box(&self.box_, &self.image_id))
    }
}

pub(crate) type Step<'p, 'w> = Box<dyn Action<RunArgs<'p, 'w>>>;

pub(crate) fn step<'p, 'w, T>(action: T) -> Step<'p, 'w>
where
    T: Action<RunArgs<'p, 'w>> + 'static,
{
    Box::new(action)
}

// ---------------------------------------------------------------------------
// update-status
// ---------------------------------------------------------------------------

/// Write a status to the box's component record.
///
/// Compensation writes back the status the record carried before, unless
/// built with [`UpdateStatus::forward_only`].
pub(crate) struct UpdateStatus {
    status: Status,
    revert: bool,
}

impl UpdateStatus {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            revert: true,
        }
    }

    pub fn forward_only(status: Status) -> Self {
        Self {
            status,
            revert: false,
        }
    }
}

/// Write `label` to the box's component record, returning the label it
/// carried before and whether a write happened.
fn write_status(args: &mut RunArgs<'_, '_>, label: &str) -> Result<(String, bool)> {
    let store = args.provisioner.store();
    let mut component = store.fetch_component(&args.box_.id)?;
    let previous = component.status.clone();
    let written = !component.has_status(label);
    if written {
        component.set_status_label(label);
        store.update_component(&component)?;
    }
    if let Ok(status) = label.parse() {
        args.box_.status = status;
    }
    Ok((previous, written))
}

impl<'p, 'w> Action<RunArgs<'p, 'w>> for UpdateStatus {
    fn name(&self) -> &str {
        "update-status"
    }

    fn forward(&self, ctx: FwContext<'_, RunArgs<'p, 'w>>) -> Result<Value> {
        let args = ctx.params;
        let (previous, written) = write_status(args, self.status.as_str())?;
        tracing::debug!(
            box_name = %args.box_.name,
            from = %previous,
            to = %self.status,
            written,
            "box status"
        );
        progress(
            args.writer,
            &format!("  status {} -> {}", args.box_.name, self.status),
        );
        Ok(json!({
            "previous": previous,
            "current": self.status.as_str(),
            "written": written,
        }))
    }

    /// Restores the exact label the record carried, even one outside
    /// [`Status`].
    fn backward(&self, ctx: BwContext<'_, RunArgs<'p, 'w>>) -> Result<()> {
        if !self.revert || ctx.fw_result["written"] != Value::Bool(true) {
            return Ok(());
        }
        let previous = ctx.fw_result["previous"].as_str().unwrap_or_default();
        write_status(ctx.params, previous)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// create-machine
// ---------------------------------------------------------------------------

pub(crate) struct CreateMachine;

impl<'p, 'w> Action<RunArgs<'p, 'w>> for CreateMachine {
    fn name(&self) -> &str {
        "create-machine"
    }

    fn forward(&self, ctx: FwContext<'_, RunArgs<'p, 'w>>) -> Result<Value> {
        let args = ctx.params;
        let mut machine = Machine::from_box(&args.box_, &args.image_id);
        let vm_id = args
            .provisioner
            .iaas()
            .create_machine(&machine)
            .map_err(VerticeError::in_box(&args.box_.name))?;

        machine.vm_id = vm_id.clone();
        args.box_.vm_id = vm_id.clone();
        progress(
            args.writer,
            &format!("  created machine {} (vm {vm_id})", machine.name),
        );
        args.machine = Some(machine);
        Ok(json!({ "vm_id": vm_id }))
    }

    fn backward(&self, ctx: BwContext<'_, RunArgs<'p, 'w>>) -> Result<()> {
        let args = ctx.params;
        let mut machine = args.machine();
        if let Some(vm_id) = ctx.fw_result["vm_id"].as_str() {
            machine.vm_id = vm_id.to_string();
        }
        if !machine.is_created() {
            return Ok(());
        }
        args.provisioner
            .iaas()
            .destroy_machine(&machine)
            .map_err(VerticeError::in_box(&args.box_.name))?;
        args.machine = None;
        args.box_.vm_id.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// follow-logs
// ---------------------------------------------------------------------------

/// Copy the machine's boot log into the progress writer. Never fails.
pub(crate) struct FollowLogs;

impl<'p, 'w> Action<RunArgs<'p, 'w>> for FollowLogs {
    fn name(&self) -> &str {
        "follow-logs"
    }

    fn forward(&self, ctx: FwContext<'_, RunArgs<'p, 'w>>) -> Result<Value> {
        let args = ctx.params;
        let machine = args.machine();
        let reader = match args.provisioner.iaas().boot_log(&machine) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(box_name = %args.box_.name, error = %e, "boot log unavailable");
                return Ok(json!({ "lines": 0 }));
            }
        };

        if args.is_deploy {
            progress(args.writer, &format!("  boot log of {}", machine.name));
        }
        let mut lines = 0u64;
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    progress(args.writer, &line);
                    lines += 1;
                }
                Err(e) => {
                    tracing::warn!(box_name = %args.box_.name, error = %e, "boot log read failed");
                    break;
                }
            }
        }
        Ok(json!({ "lines": lines }))
    }
}

// ---------------------------------------------------------------------------
// Teardown steps (forward only)
// ---------------------------------------------------------------------------

pub(crate) struct RemoveMachine;

impl<'p, 'w> Action<RunArgs<'p, 'w>> for RemoveMachine {
    fn name(&self) -> &str {
        "remove-machine"
    }

    fn forward(&self, ctx: FwContext<'_, RunArgs<'p, 'w>>) -> Result<Value> {
        let args = ctx.params;
        let machine = args.machine();
        args.provisioner
            .iaas()
            .destroy_machine(&machine)
            .map_err(VerticeError::in_box(&args.box_.name))?;
        progress(args.writer, &format!("  removed machine {}", machine.name));
        Ok(json!({ "vm_id": machine.vm_id }))
    }
}

pub(crate) struct RemoveBoxRecord;

impl<'p, 'w> Action<RunArgs<'p, 'w>> for RemoveBoxRecord {
    fn name(&self) -> &str {
        "remove-box-record"
    }

    fn forward(&self, ctx: FwContext<'_, RunArgs<'p, 'w>>) -> Result<Value> {
        let args = ctx.params;
        args.provisioner.store().delete_component(&args.box_.id)?;
        Ok(json!({ "component": args.box_.id }))
    }
}

pub(crate) struct RemoveCartonRecord;

impl<'p, 'w> Action<RunArgs<'p, 'w>> for RemoveCartonRecord {
    fn name(&self) -> &str {
        "remove-carton-record"
    }

    fn forward(&self, ctx: FwContext<'_, RunArgs<'p, 'w>>) -> Result<Value> {
        let args = ctx.params;
        args.provisioner
            .store()
            .delete_assembly(&args.box_.carton_id)?;
        Ok(json!({ "assembly": args.box_.carton_id }))
    }
}

/// Remove the CI hook of the box's repository, if it has one.
pub(crate) struct UnbindUnits;

impl<'p, 'w> Action<RunArgs<'p, 'w>> for UnbindUnits {
    fn name(&self) -> &str {
        "unbind-units"
    }

    fn forward(&self, ctx: FwContext<'_, RunArgs<'p, 'w>>) -> Result<Value> {
        let args = ctx.params;
        let Some(repo) = args.box_.repo.as_ref() else {
            return Ok(json!({ "unbound": false }));
        };
        let Some(hook) = repo.hook.as_ref() else {
            return Ok(json!({ "unbound": false }));
        };
        if !repo.ci_enabled() {
            return Ok(json!({ "unbound": false }));
        }
        repository::manager(hook.manager_name()).remove_hook(repo)?;
        Ok(json!({ "unbound": true }))
    }
}

pub(crate) struct RemoveRoutes;

impl<'p, 'w> Action<RunArgs<'p, 'w>> for RemoveRoutes {
    fn name(&self) -> &str {
        "remove-routes"
    }

    fn forward(&self, ctx: FwContext<'_, RunArgs<'p, 'w>>) -> Result<Value> {
        let args = ctx.params;
        if args.provisioner.router_name(&args.box_).is_none() {
            tracing::warn!(box_name = %args.box_.name, "no router configured, skipping route removal");
            return Ok(json!({ "removed": false }));
        }
        let router = args.provisioner.router_for(&args.box_)?;
        router.remove_backend(&args.box_.name)?;
        progress(args.writer, &format!("  removed routes of {}", args.box_.name));
        Ok(json!({ "removed": true, "backend": args.box_.name }))
    }
}

// ---------------------------------------------------------------------------
// Power steps
// ---------------------------------------------------------------------------

pub(crate) struct StartMachine;

impl<'p, 'w> Action<RunArgs<'p, 'w>> for StartMachine {
    fn name(&self) -> &str {
        "start-machine"
    }

    fn forward(&self, ctx: FwContext<'_, RunArgs<'p, 'w>>) -> Result<Value> {
        let args = ctx.params;
        args.provisioner
            .iaas()
            .start_machine(&args.machine())
            .map_err(VerticeError::in_box(&args.box_.name))?;
        Ok(Value::Null)
    }

    fn backward(&self, ctx: BwContext<'_, RunArgs<'p, 'w>>) -> Result<()> {
        let args = ctx.params;
        args.provisioner
            .iaas()
            .stop_machine(&args.machine())
            .map_err(VerticeError::in_box(&args.box_.name))
    }
}

pub(crate) struct StopMachine;

impl<'p, 'w> Action<RunArgs<'p, 'w>> for StopMachine {
    fn name(&self) -> &str {
        "stop-machine"
    }

    fn forward(&self, ctx: FwContext<'_, RunArgs<'p, 'w>>) -> Result<Value> {
        let args = ctx.params;
        args.provisioner
            .iaas()
            .stop_machine(&args.machine())
            .map_err(VerticeError::in_box(&args.box_.name))?;
        Ok(Value::Null)
    }

    fn backward(&self, ctx: BwContext<'_, RunArgs<'p, 'w>>) -> Result<()> {
        let args = ctx.params;
        args.provisioner
            .iaas()
            .start_machine(&args.machine())
            .map_err(VerticeError::in_box(&args.box_.name))
    }
}

pub(crate) struct RestartMachine;

impl<'p, 'w> Action<RunArgs<'p, 'w>> for RestartMachine {
    fn name(&self) -> &str {
        "restart-machine"
    }

    fn forward(&self, ctx: FwContext<'_, RunArgs<'p, 'w>>) -> Result<Value> {
        let args = ctx.params;
        args.provisioner
            .iaas()
            .restart_machine(&args.machine())
            .map_err(VerticeError::in_box(&args.box_.name))?;
        progress(args.writer, &format!("  restarted {}", args.box_.fqdn()));
        Ok(Value::Null)
    }
}
