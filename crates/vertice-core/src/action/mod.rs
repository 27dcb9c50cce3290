//! Compensable action pipelines.
//!
//! An [`Action`] is one externally visible step (a status write, an IaaS
//! call, a router mutation) paired with a best-effort undo. A [`Pipeline`]
//! runs a fixed list of actions in order against one shared argument value
//! and, when a step fails, undoes the steps that already succeeded in
//! reverse order before handing the original error back.
//!
//! ```text
//! forward:   a ──▶ b ──▶ c ✗
//! backward:        b ◀── a        (c is never compensated)
//! result:    Err(Action { action: "c", source: <c's error> })
//! ```

pub mod pipeline;

pub use pipeline::Pipeline;

use serde_json::Value;

use crate::error::Result;

/// What a forward step sees: the shared arguments and the result of the
/// step that ran just before it (`None` for the first step).
pub struct FwContext<'a, A> {
    pub params: &'a mut A,
    pub previous: Option<&'a Value>,
}

/// What a backward step sees: the shared arguments and the value its own
/// forward step returned.
pub struct BwContext<'a, A> {
    pub params: &'a mut A,
    pub fw_result: &'a Value,
}

/// A single named pipeline step.
///
/// `A` is the argument struct owned by one pipeline run. Implementations
/// must not panic in `backward`: compensation runs while another error is
/// already in flight, and its failures are only logged.
pub trait Action<A>: Send + Sync {
    /// Name used in logs and in [`crate::VerticeError::Action`].
    fn name(&self) -> &str;

    fn forward(&self, ctx: FwContext<'_, A>) -> Result<Value>;

    fn backward(&self, ctx: BwContext<'_, A>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}
