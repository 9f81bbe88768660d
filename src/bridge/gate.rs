use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, error, info};

use super::state::{BridgeState, DeferredRun};

/// A front-end procedure that backend commands can trigger by name.
pub type Procedure = Rc<dyn Fn() -> anyhow::Result<()>>;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("procedure `{0}` is not available")]
    Unavailable(String),
    #[error("procedure `{name}` failed: {source}")]
    Failed {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Ran,
    Failed,
    Deferred,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub ran: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Defers procedure runs until the procedure exists, then replays them in
/// arrival order.
pub struct ReadinessGate {
    state: Rc<BridgeState>,
    procedures: RefCell<HashMap<String, Procedure>>,
}

impl ReadinessGate {
    pub fn new(state: Rc<BridgeState>) -> Self {
        Self {
            state,
            procedures: RefCell::new(HashMap::new()),
        }
    }

    /// Makes `name` available. Queued runs wait for [`ReadinessGate::drain_queue`].
    pub fn register(&self, name: impl Into<String>, procedure: impl Fn() -> anyhow::Result<()> + 'static) {
        let procedure: Procedure = Rc::new(procedure);
        self.procedures.borrow_mut().insert(name.into(), procedure);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.procedures.borrow_mut().remove(name).is_some()
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.procedures.borrow().contains_key(name)
    }

    pub fn queued(&self) -> usize {
        self.state.queued()
    }

    /// Runs `name` now if it exists, otherwise queues the run.
    pub fn request_run(&self, name: &str) -> RunOutcome {
        match self.invoke(name) {
            Ok(()) => RunOutcome::Ran,
            Err(GateError::Unavailable(_)) => {
                info!(target = "bridge", procedure = %name, "procedure not available, adding to queue");
                self.state.enqueue(DeferredRun {
                    procedure: name.to_string(),
                });
                RunOutcome::Deferred
            }
            Err(err) => {
                error!(target = "bridge", error = %err, "procedure run failed");
                RunOutcome::Failed
            }
        }
    }

    /// Replays every queued run once, including runs queued while draining.
    /// Runs whose procedure is still missing are dropped, not re-queued.
    pub fn drain_queue(&self) -> DrainSummary {
        let mut summary = DrainSummary::default();
        while let Some(run) = self.state.pop_deferred() {
            match self.invoke(&run.procedure) {
                Ok(()) => summary.ran += 1,
                Err(GateError::Unavailable(name)) => {
                    error!(target = "bridge", procedure = %name, "procedure still not available");
                    summary.skipped += 1;
                }
                Err(err) => {
                    error!(target = "bridge", error = %err, "error executing queued procedure");
                    summary.failed += 1;
                }
            }
        }
        self.state.release_queue();
        debug!(
            target = "bridge",
            ran = summary.ran,
            skipped = summary.skipped,
            failed = summary.failed,
            "startup queue drained"
        );
        summary
    }

    fn invoke(&self, name: &str) -> Result<(), GateError> {
        let procedure = self.procedures.borrow().get(name).cloned();
        let procedure = procedure.ok_or_else(|| GateError::Unavailable(name.to_string()))?;
        procedure().map_err(|source| GateError::Failed {
            name: name.to_string(),
            source,
        })
    }
}
