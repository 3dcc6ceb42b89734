/*!
 * Progress events emitted by the orchestrator.
 *
 * The orchestrator never renders anything itself; it reports snapshots to a
 * `ProgressSink`. The CLI renders them with progress bars, tests record them.
 */

use parking_lot::Mutex;
use std::time::Duration;

use super::model::{FileStatus, RunState, RunSummary};

/// Status snapshot sent to a sink
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    /// A run began with this many files still to process
    RunStarted { files: usize },

    /// A file moved to Processing
    FileStarted { name: String, total_items: usize, completed_items: usize },

    /// A batch is about to be sent
    BatchDispatched { file: String, ids: Vec<usize>, credential_index: usize },

    /// Counters changed after a merge
    Progress { file: String, completed_items: usize, total_items: usize, progress: u8 },

    /// A credential was throttled; `cooldown` is set when every credential was tried
    RateLimited { credential_index: usize, cooldown: Option<Duration> },

    /// A batch was given up on
    BatchFailed { file: String, ids: Vec<usize>, error: String },

    /// A file reached a terminal status
    FileFinished { name: String, status: FileStatus, failed_items: usize },

    /// The run ended
    RunFinished { state: RunState, summary: RunSummary },
}

/// Receiver of orchestrator status snapshots
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &OrchestratorEvent);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_event(&self, _event: &OrchestratorEvent) {}
}

/// Sink that keeps every event, for inspection in tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<OrchestratorEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OrchestratorEvent> {
        self.events.lock().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn on_event(&self, event: &OrchestratorEvent) {
        self.events.lock().push(event.clone());
    }
}
