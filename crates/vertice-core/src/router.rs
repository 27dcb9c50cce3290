//! Routers map box names to reachable addresses (DNS records, load
//! balancer backends). Concrete routers register themselves by name; a box
//! names the router it uses.

use std::sync::{Arc, LazyLock};

use crate::error::{Result, VerticeError};
use crate::provision::CartonBox;
use crate::registry::Registry;

pub trait Router: Send + Sync {
    /// Point `cname` at the backend named `name`.
    fn set_cname(&self, cname: &str, name: &str) -> Result<()>;

    fn unset_cname(&self, cname: &str, name: &str) -> Result<()>;

    /// Public address of the backend named `name`.
    fn addr(&self, name: &str) -> Result<String>;

    /// Drop every route of the backend named `name`.
    fn remove_backend(&self, name: &str) -> Result<()>;
}

static ROUTERS: LazyLock<Arc<Registry<dyn Router>>> =
    LazyLock::new(|| Arc::new(Registry::new()));

/// Process-wide router registry.
pub fn registry() -> Arc<Registry<dyn Router>> {
    Arc::clone(&ROUTERS)
}

pub fn register(name: &str, router: Arc<dyn Router>) {
    ROUTERS.register(name, router);
}

pub fn get(name: &str) -> Result<Arc<dyn Router>> {
    lookup(&ROUTERS, name)
}

pub(crate) fn lookup(registry: &Registry<dyn Router>, name: &str) -> Result<Arc<dyn Router>> {
    registry
        .get(name)
        .ok_or_else(|| VerticeError::RouterNotFound(name.to_string()))
}

/// Router name of `b`, falling back to `default`. Empty names count as
/// unset.
pub fn name_for<'a>(b: &'a CartonBox, default: Option<&'a str>) -> Option<&'a str> {
    b.router
        .as_deref()
        .filter(|n| !n.is_empty())
        .or(default.filter(|n| !n.is_empty()))
}

/// Resolve the router of `b`, falling back to `default` when the box names
/// none.
pub fn for_box(
    registry: &Registry<dyn Router>,
    b: &CartonBox,
    default: Option<&str>,
) -> Result<Arc<dyn Router>> {
    let Some(name) = name_for(b, default) else {
        tracing::warn!(box_name = %b.name, "box has no router configured");
        return Err(VerticeError::RouterNotFound(String::new()));
    };
    lookup(registry, name)
}
