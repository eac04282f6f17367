use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::exec::{ExecutionRequest, ExecutionResult, RunError};

/// In-flight run state for one workspace.
struct RunSlot {
    seq: u64,
    cancel: CancellationToken,
}

/// One editor workspace's run serialization
///
/// A workspace issues one run at a time; a new submission cancels whatever
/// is still in flight and bumps the sequence number, and a finished run is
/// surfaced only while its sequence is still current. Stale results are
/// discarded, never rendered.
pub struct Workspace {
    slot: Mutex<RunSlot>,
}

impl Workspace {
    fn new() -> Self {
        Self {
            slot: Mutex::new(RunSlot {
                seq: 0,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Supersedes any in-flight run and claims the next sequence number.
    fn begin(&self) -> (u64, CancellationToken) {
        let mut slot = self.slot.lock();
        slot.cancel.cancel();
        slot.seq += 1;
        slot.cancel = CancellationToken::new();
        (slot.seq, slot.cancel.clone())
    }

    fn is_current(&self, seq: u64) -> bool {
        self.slot.lock().seq == seq
    }
}

/// Tracks every workspace known to this process and funnels their runs
/// through the dispatcher with supersession applied.
pub struct WorkspaceRegistry {
    dispatcher: Arc<Dispatcher>,
    workspaces: Mutex<HashMap<String, Arc<Workspace>>>,
}

impl WorkspaceRegistry {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            workspaces: Mutex::new(HashMap::new()),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn workspace(&self, id: &str) -> Arc<Workspace> {
        let mut workspaces = self.workspaces.lock();
        workspaces
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Workspace::new()))
            .clone()
    }

    /// Runs a request on behalf of a workspace.
    ///
    /// Returns `Err(RunError::Superseded)` when a newer request from the
    /// same workspace arrived before this one finished; the stale result is
    /// dropped here and never reaches the caller.
    pub async fn submit(
        &self,
        workspace_id: &str,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, RunError> {
        let workspace = self.workspace(workspace_id);
        let (seq, cancel) = workspace.begin();
        log::debug!("Workspace {workspace_id} starting run #{seq}");

        let outcome = self.dispatcher.run_cancellable(request, &cancel).await;

        if cancel.is_cancelled() || !workspace.is_current(seq) {
            log::info!("Workspace {workspace_id} run #{seq} superseded, result discarded");
            return Err(RunError::Superseded);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_bumps_sequence_and_cancels_previous() {
        let workspace = Workspace::new();

        let (first_seq, first_cancel) = workspace.begin();
        assert_eq!(first_seq, 1);
        assert!(!first_cancel.is_cancelled());
        assert!(workspace.is_current(first_seq));

        let (second_seq, second_cancel) = workspace.begin();
        assert_eq!(second_seq, 2);
        assert!(first_cancel.is_cancelled());
        assert!(!second_cancel.is_cancelled());
        assert!(!workspace.is_current(first_seq));
        assert!(workspace.is_current(second_seq));
    }
}
