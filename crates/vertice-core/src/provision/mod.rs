//! Box provisioning.
//!
//! A [`Provisioner`] owns the lifecycle of boxes on one infrastructure
//! backend. Backends register under a name at startup; callers pick one by
//! the box's `provider`.

pub mod boxes;
pub mod iaas;
pub mod machine;
pub mod one;

pub use boxes::CartonBox;
pub use iaas::IaasClient;
pub use machine::Machine;

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, LazyLock};

use crate::error::{Result, VerticeError};
use crate::registry::Registry;
use crate::types::Status;

pub trait Provisioner: Send + Sync {
    /// Human-readable description of the backend connection, printed once
    /// at startup.
    fn startup_message(&self) -> Result<String>;

    /// Deploy `image_id` as `b`, streaming progress into `w`. Returns the
    /// deployed image id.
    fn image_deploy(&self, b: &CartonBox, image_id: &str, w: &mut dyn Write) -> Result<String>;

    /// Tear down the VM, records, hooks and routes of `b`.
    fn destroy(&self, b: &CartonBox, w: &mut dyn Write) -> Result<()>;

    fn start(&self, b: &CartonBox) -> Result<()>;

    fn stop(&self, b: &CartonBox) -> Result<()>;

    fn restart(&self, b: &CartonBox, w: &mut dyn Write) -> Result<()>;

    /// Persist `status` for `b`. Setting the status a box already has is a
    /// no-op.
    fn set_box_status(&self, b: &CartonBox, status: Status) -> Result<()>;

    /// Run `cmd` once on the first live machine of `b`.
    fn execute_command_once(
        &self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        b: &CartonBox,
        cmd: &str,
        args: &[String],
    ) -> Result<()>;

    fn addr(&self, b: &CartonBox) -> Result<String>;

    fn set_cname(&self, b: &CartonBox, cname: &str) -> Result<()>;

    fn unset_cname(&self, b: &CartonBox, cname: &str) -> Result<()>;

    fn platform_add(&self, name: &str, args: &HashMap<String, String>, w: &mut dyn Write)
        -> Result<()>;

    fn platform_update(
        &self,
        name: &str,
        args: &HashMap<String, String>,
        w: &mut dyn Write,
    ) -> Result<()> {
        self.platform_add(name, args, w)
    }

    fn platform_remove(&self, name: &str) -> Result<()>;

    /// Environment variables forwarded to boxes for metrics collection.
    fn metric_envs(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

static PROVISIONERS: LazyLock<Arc<Registry<dyn Provisioner>>> =
    LazyLock::new(|| Arc::new(Registry::new()));

/// Process-wide provisioner registry.
pub fn registry() -> Arc<Registry<dyn Provisioner>> {
    Arc::clone(&PROVISIONERS)
}

/// Register `p` under `name`, replacing any earlier registration.
pub fn register(name: &str, p: Arc<dyn Provisioner>) {
    if PROVISIONERS.register(name, p).is_some() {
        tracing::debug!(provisioner = name, "replaced registered provisioner");
    }
}

pub fn get(name: &str) -> Result<Arc<dyn Provisioner>> {
    lookup(&PROVISIONERS, name)
}

pub(crate) fn lookup(
    registry: &Registry<dyn Provisioner>,
    name: &str,
) -> Result<Arc<dyn Provisioner>> {
    registry
        .get(name)
        .ok_or_else(|| VerticeError::ProvisionerNotRegistered(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Provisioner for Named {
        fn startup_message(&self) -> Result<String> {
            Ok(self.0.to_string())
        }
        fn image_deploy(&self, _b: &CartonBox, image_id: &str, _w: &mut dyn Write) -> Result<String> {
            Ok(image_id.to_string())
        }
        fn destroy(&self, _b: &CartonBox, _w: &mut dyn Write) -> Result<()> {
            Ok(())
        }
        fn start(&self, _b: &CartonBox) -> Result<()> {
            Ok(())
        }
        fn stop(&self, _b: &CartonBox) -> Result<()> {
            Ok(())
        }
        fn restart(&self, _b: &CartonBox, _w: &mut dyn Write) -> Result<()> {
            Ok(())
        }
        fn set_box_status(&self, _b: &CartonBox, _status: Status) -> Result<()> {
            Ok(())
        }
        fn execute_command_once(
            &self,
            _stdout: &mut dyn Write,
            _stderr: &mut dyn Write,
            _b: &CartonBox,
            _cmd: &str,
            _args: &[String],
        ) -> Result<()> {
            Ok(())
        }
        fn addr(&self, b: &CartonBox) -> Result<String> {
            Ok(b.name.clone())
        }
        fn set_cname(&self, _b: &CartonBox, _cname: &str) -> Result<()> {
            Ok(())
        }
        fn unset_cname(&self, _b: &CartonBox, _cname: &str) -> Result<()> {
            Ok(())
        }
        fn platform_add(
            &self,
            _name: &str,
            _args: &HashMap<String, String>,
            w: &mut dyn Write,
        ) -> Result<()> {
            writeln!(w, "added by {}", self.0)?;
            Ok(())
        }
        fn platform_remove(&self, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn second_registration_wins() {
        let r: Registry<dyn Provisioner> = Registry::new();
        r.register("one", Arc::new(Named("first")));
        r.register("one", Arc::new(Named("second")));
        let p = lookup(&r, "one").unwrap();
        assert_eq!(p.startup_message().unwrap(), "second");
    }

    #[test]
    fn distinct_names_resolve_independently() {
        let r: Registry<dyn Provisioner> = Registry::new();
        r.register("one", Arc::new(Named("one")));
        r.register("docker", Arc::new(Named("docker")));
        assert_eq!(lookup(&r, "one").unwrap().startup_message().unwrap(), "one");
        assert_eq!(lookup(&r, "docker").unwrap().startup_message().unwrap(), "docker");
    }

    #[test]
    fn unregistered_backend_is_an_error() {
        let err = get("unregistered-backend").err().unwrap();
        assert!(matches!(err, VerticeError::ProvisionerNotRegistered(ref n) if n == "unregistered-backend"));
        assert_eq!(err.to_string(), "provisioner \"unregistered-backend\" not registered");
    }

    #[test]
    fn global_register_then_get() {
        register("provision-test-global", Arc::new(Named("global")));
        let p = get("provision-test-global").unwrap();
        assert_eq!(p.startup_message().unwrap(), "global");
    }

    #[test]
    fn platform_update_defaults_to_add() {
        let p = Named("x");
        let mut out = Vec::new();
        p.platform_update("ubuntu", &HashMap::new(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "added by x\n");
        assert!(p.metric_envs().is_empty());
    }
}
