//! OpenNebula-backed provisioner, registered as `"one"`.
//!
//! Every lifecycle operation is a [`Pipeline`] of steps from [`actions`]:
//!
//! | operation        | steps                                                              |
//! |------------------|--------------------------------------------------------------------|
//! | `image_deploy`   | status(deploying), create-machine, status(creating), follow-logs   |
//! | `destroy`        | follow-logs, status(destroying), remove-machine, remove-box-record, remove-carton-record, unbind-units, remove-routes |
//! | `start`          | status(starting), start-machine, status(running)                   |
//! | `stop`           | status(stopping), stop-machine, status(stopped)                    |
//! | `restart`        | status(restarting), restart-machine, status(running)               |
//! | `set_box_status` | status(s)                                                          |

mod actions;

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use serde_json::Value;

use self::actions::{
    step, CreateMachine, FollowLogs, RemoveBoxRecord, RemoveCartonRecord, RemoveMachine,
    RemoveRoutes, RestartMachine, RunArgs, StartMachine, Step, StopMachine, UnbindUnits,
    UpdateStatus,
};
use super::{CartonBox, IaasClient, Provisioner};
use crate::action::Pipeline;
use crate::config::ProvisionerConfig;
use crate::error::{Result, VerticeError};
use crate::io::progress;
use crate::registry::Registry;
use crate::router::{self, Router};
use crate::store::MetadataStore;
use crate::types::Status;

pub const NAME: &str = "one";

pub struct OneProvisioner {
    config: ProvisionerConfig,
    iaas: Arc<dyn IaasClient>,
    store: Arc<dyn MetadataStore>,
    routers: Arc<Registry<dyn Router>>,
}

impl OneProvisioner {
    /// Provisioner resolving routers through the process-wide router
    /// registry.
    pub fn new(
        config: ProvisionerConfig,
        iaas: Arc<dyn IaasClient>,
        store: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            config,
            iaas,
            store,
            routers: router::registry(),
        }
    }

    pub fn with_routers(mut self, routers: Arc<Registry<dyn Router>>) -> Self {
        self.routers = routers;
        self
    }

    /// Build a provisioner and register it under [`NAME`].
    pub fn init(
        config: ProvisionerConfig,
        iaas: Arc<dyn IaasClient>,
        store: Arc<dyn MetadataStore>,
    ) -> Arc<Self> {
        let p = Arc::new(Self::new(config, iaas, store));
        super::register(NAME, p.clone());
        tracing::info!(provisioner = NAME, endpoint = %p.config.endpoint, "provisioner registered");
        p
    }

    pub(crate) fn iaas(&self) -> &dyn IaasClient {
        self.iaas.as_ref()
    }

    pub(crate) fn store(&self) -> &dyn MetadataStore {
        self.store.as_ref()
    }

    /// Name of the router serving `b`, if the box or the config names one.
    pub(crate) fn router_name<'a>(&'a self, b: &'a CartonBox) -> Option<&'a str> {
        router::name_for(b, self.config.default_router.as_deref())
    }

    pub(crate) fn router_for(&self, b: &CartonBox) -> Result<Arc<dyn Router>> {
        router::for_box(&self.routers, b, self.config.default_router.as_deref())
    }

    fn run<'p, 'w>(
        &self,
        op: &str,
        steps: Vec<Step<'p, 'w>>,
        args: &mut RunArgs<'p, 'w>,
    ) -> Result<Value> {
        let pipeline = Pipeline::new(steps)?;
        tracing::info!(op, box_name = %args.box_.name, steps = ?pipeline.names(), "pipeline start");
        match pipeline.execute(args) {
            Ok(v) => {
                tracing::info!(op, box_name = %args.box_.name, "pipeline done");
                Ok(v)
            }
            Err(e) => {
                tracing::error!(
                    op,
                    box_name = %args.box_.name,
                    action = e.failed_action().unwrap_or_default(),
                    error = %e,
                    "pipeline failed"
                );
                Err(e)
            }
        }
    }
}

impl Provisioner for OneProvisioner {
    fn startup_message(&self) -> Result<String> {
        let mut out = String::from("One provisioner reports the following:\n");
        out.push_str(&format!("    endpoint: {}\n", self.config.endpoint));
        out.push_str(&format!("    user: {}\n", self.config.user));
        if let Some(r) = &self.config.default_router {
            out.push_str(&format!("    default router: {r}\n"));
        }
        Ok(out)
    }

    fn image_deploy(&self, b: &CartonBox, image_id: &str, w: &mut dyn Write) -> Result<String> {
        let valid = self
            .iaas
            .is_valid_image(&b.name, image_id)
            .map_err(VerticeError::in_box(&b.name))?;
        if !valid {
            return Err(VerticeError::InvalidImage {
                box_name: b.name.clone(),
                image: image_id.to_string(),
            });
        }

        progress(w, &format!("\n---- Create {} box {image_id} ----", b.fqdn()));
        let steps = vec![
            step(UpdateStatus::new(Status::Deploying)),
            step(CreateMachine),
            step(UpdateStatus::new(Status::Creating)),
            step(FollowLogs),
        ];
        let mut args = RunArgs::new(self, b, w).deploying(image_id);
        self.run("deploy", steps, &mut args)?;
        progress(
            args.writer,
            &format!("---- {} deployed (vm {}) ----", b.fqdn(), args.box_.vm_id),
        );
        Ok(image_id.to_string())
    }

    fn destroy(&self, b: &CartonBox, w: &mut dyn Write) -> Result<()> {
        progress(w, &format!("\n---- Removing {} ----", b.fqdn()));
        let steps = vec![
            step(FollowLogs),
            step(UpdateStatus::forward_only(Status::Destroying)),
            step(RemoveMachine),
            step(RemoveBoxRecord),
            step(RemoveCartonRecord),
            step(UnbindUnits),
            step(RemoveRoutes),
        ];
        let mut args = RunArgs::new(self, b, w);
        self.run("destroy", steps, &mut args)?;
        Ok(())
    }

    fn start(&self, b: &CartonBox) -> Result<()> {
        let steps = vec![
            step(UpdateStatus::new(Status::Starting)),
            step(StartMachine),
            step(UpdateStatus::new(Status::Running)),
        ];
        let mut sink = std::io::sink();
        let mut args = RunArgs::new(self, b, &mut sink);
        self.run("start", steps, &mut args)?;
        Ok(())
    }

    fn stop(&self, b: &CartonBox) -> Result<()> {
        let steps = vec![
            step(UpdateStatus::new(Status::Stopping)),
            step(StopMachine),
            step(UpdateStatus::new(Status::Stopped)),
        ];
        let mut sink = std::io::sink();
        let mut args = RunArgs::new(self, b, &mut sink);
        self.run("stop", steps, &mut args)?;
        Ok(())
    }

    fn restart(&self, b: &CartonBox, w: &mut dyn Write) -> Result<()> {
        progress(w, &format!("\n---- Restarting {} ----", b.fqdn()));
        let steps = vec![
            step(UpdateStatus::new(Status::Restarting)),
            step(RestartMachine),
            step(UpdateStatus::new(Status::Running)),
        ];
        let mut args = RunArgs::new(self, b, w);
        self.run("restart", steps, &mut args)?;
        Ok(())
    }

    fn set_box_status(&self, b: &CartonBox, status: Status) -> Result<()> {
        let mut sink = std::io::sink();
        let mut args = RunArgs::new(self, b, &mut sink);
        self.run("status", vec![step(UpdateStatus::new(status))], &mut args)?;
        Ok(())
    }

    fn execute_command_once(
        &self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        b: &CartonBox,
        cmd: &str,
        args: &[String],
    ) -> Result<()> {
        let machines = self
            .iaas
            .list_machines(b)
            .map_err(VerticeError::in_box(&b.name))?;
        let Some(machine) = machines.first() else {
            return Err(VerticeError::EmptyBoxSet(b.name.clone()));
        };
        tracing::debug!(box_name = %b.name, machine = %machine.name, cmd, "exec");
        self.iaas
            .exec(machine, stdout, stderr, cmd, args)
            .map_err(VerticeError::in_box(&b.name))
    }

    fn addr(&self, b: &CartonBox) -> Result<String> {
        let r = self.router_for(b).inspect_err(|e| {
            tracing::error!(box_name = %b.name, error = %e, "failed to get router");
        })?;
        r.addr(&b.name).inspect_err(|e| {
            tracing::error!(box_name = %b.name, error = %e, "failed to obtain box address");
        })
    }

    fn set_cname(&self, b: &CartonBox, cname: &str) -> Result<()> {
        self.router_for(b)?.set_cname(cname, &b.name)
    }

    fn unset_cname(&self, b: &CartonBox, cname: &str) -> Result<()> {
        self.router_for(b)?.unset_cname(cname, &b.name)
    }

    fn platform_add(
        &self,
        name: &str,
        args: &HashMap<String, String>,
        w: &mut dyn Write,
    ) -> Result<()> {
        progress(w, &format!("---- Pushing template {name} ----"));
        self.iaas.upsert_template(name, args)?;
        tracing::info!(template = name, "platform template pushed");
        Ok(())
    }

    fn platform_remove(&self, name: &str) -> Result<()> {
        self.iaas.remove_template(name)?;
        tracing::info!(template = name, "platform template removed");
        Ok(())
    }

    fn metric_envs(&self) -> HashMap<String, String> {
        self.config.metric_envs()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
