use serde_json::Value;

use crate::error::{Result, VerticeError};

use super::{Action, BwContext, FwContext};

/// An ordered, immutable list of actions executed once.
pub struct Pipeline<A> {
    actions: Vec<Box<dyn Action<A>>>,
}

impl<A> Pipeline<A> {
    /// Build a pipeline. An empty action list is a programming error and is
    /// rejected with [`VerticeError::EmptyPipeline`].
    pub fn new(actions: Vec<Box<dyn Action<A>>>) -> Result<Self> {
        if actions.is_empty() {
            return Err(VerticeError::EmptyPipeline);
        }
        Ok(Self { actions })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Action names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    /// Run every forward step in order, threading each result into the next
    /// step. Returns the last step's result.
    ///
    /// If step `i` fails, steps `i-1..=0` are compensated in that order and
    /// the forward error is returned wrapped in [`VerticeError::Action`].
    /// Compensation errors are logged and dropped.
    pub fn execute(self, params: &mut A) -> Result<Value> {
        let mut results: Vec<Value> = Vec::with_capacity(self.actions.len());

        for (index, action) in self.actions.iter().enumerate() {
            tracing::debug!(action = action.name(), index, "forward");
            let outcome = action.forward(FwContext {
                params: &mut *params,
                previous: results.last(),
            });
            match outcome {
                Ok(value) => results.push(value),
                Err(e) => {
                    tracing::error!(
                        action = action.name(),
                        index,
                        error = %e,
                        "forward failed, unwinding"
                    );
                    self.unwind(params, &results);
                    return Err(VerticeError::Action {
                        action: action.name().to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }

        Ok(results.pop().unwrap_or(Value::Null))
    }

    /// Compensate the first `completed.len()` actions, newest first.
    fn unwind(&self, params: &mut A, completed: &[Value]) {
        for (index, fw_result) in completed.iter().enumerate().rev() {
            let action = &self.actions[index];
            tracing::debug!(action = action.name(), index, "backward");
            if let Err(e) = action.backward(BwContext {
                params: &mut *params,
                fw_result,
            }) {
                tracing::warn!(
                    action = action.name(),
                    index,
                    error = %e,
                    "compensation failed"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
