//! Bridge to the externally-owned cue document.
//!
//! The document (the operator's cue table) lives outside this crate; the
//! server only reads snapshots and submits permission-checked mutations.
//! [`CueDocument`] is the seam: the desktop layer implements it over its own
//! document and applies mutations on its own schedule, answering through the
//! completion channel. [`MemoryCueDocument`] applies synchronously, for the
//! standalone binary and tests.

use cuelink_model::{Cue, CueMutation, CueStack, MutationOutcome, StackSnapshot};
use parking_lot::{Mutex, RwLock};
use std::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::oneshot;
use tracing::debug;

/// Result of selecting a cue stack.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedStack {
    /// The now-selected index.
    pub index: usize,
    /// Display name of the selected stack.
    pub name: String,
    /// Duration of the stack's current cue in seconds, when it has one.
    /// The caller re-arms the countdown from it.
    pub countdown_seconds: Option<f64>,
}

/// Read/write view of the cue document.
///
/// `apply` hands back a completion receiver rather than an outcome: the
/// owning layer may apply the change asynchronously, and the HTTP handler
/// awaits the receiver with a bounded timeout.
pub trait CueDocument: Send + Sync {
    /// The document's stacks, in order.
    fn stacks(&self) -> Vec<CueStack>;

    /// Snapshot of the selected stack, stamped with the given clock string.
    fn snapshot(&self, current_time: &str) -> Option<StackSnapshot>;

    /// Selects a stack by index. `None` when the index is out of bounds.
    fn select_stack(&self, index: usize) -> Option<SelectedStack>;

    /// Submits a mutation; the outcome arrives on the returned channel.
    fn apply(&self, mutation: CueMutation) -> oneshot::Receiver<MutationOutcome>;
}

#[derive(Debug)]
struct DocState {
    stacks: Vec<CueStack>,
    selected: usize,
    selected_cue: Option<usize>,
}

/// In-process cue document.
pub struct MemoryCueDocument {
    state: RwLock<DocState>,
    refresh: Mutex<Vec<Sender<()>>>,
}

impl MemoryCueDocument {
    /// Creates a document over the given stacks, first stack selected.
    pub fn new(stacks: Vec<CueStack>) -> Self {
        let selected_cue = stacks.first().and_then(|s| (!s.cues.is_empty()).then_some(0));
        Self {
            state: RwLock::new(DocState {
                stacks,
                selected: 0,
                selected_cue,
            }),
            refresh: Mutex::new(Vec::new()),
        }
    }

    /// Subscribes to refresh notifications, one per successful mutation.
    pub fn subscribe_refresh(&self) -> Receiver<()> {
        let (tx, rx) = mpsc::channel();
        self.refresh.lock().push(tx);
        rx
    }

    fn notify_refresh(&self) {
        let mut subscribers = self.refresh.lock();
        subscribers.retain(|tx| tx.send(()).is_ok());
    }

    fn apply_now(&self, mutation: CueMutation) -> MutationOutcome {
        let mut state = self.state.write();
        match mutation {
            CueMutation::SetValue {
                cue_id,
                column_index,
                value,
            } => {
                let Some(stack) = state.stacks.iter_mut().find(|s| s.cue(cue_id).is_some())
                else {
                    return MutationOutcome::CueNotFound;
                };
                if column_index >= stack.columns.len() {
                    return MutationOutcome::Rejected {
                        reason: format!("column {column_index} out of range"),
                    };
                }
                let column_count = stack.columns.len();
                if let Some(cue) = stack.cues.iter_mut().find(|c| c.id == cue_id) {
                    if cue.values.len() < column_count {
                        cue.values.resize(column_count, String::new());
                    }
                    cue.values[column_index] = value;
                }
                MutationOutcome::Applied { cue_id }
            }
            CueMutation::AddCue {
                cue_stack_id,
                mut values,
                timer_value,
            } => {
                let Some(stack) = state.stacks.iter_mut().find(|s| s.id == cue_stack_id) else {
                    return MutationOutcome::StackNotFound;
                };
                values.resize(stack.columns.len(), String::new());
                let cue = Cue::new(values, timer_value);
                let cue_id = cue.id;
                stack.cues.push(cue);
                MutationOutcome::Applied { cue_id }
            }
            CueMutation::DeleteCue { cue_id } => {
                for stack in state.stacks.iter_mut() {
                    let before = stack.cues.len();
                    stack.cues.retain(|c| c.id != cue_id);
                    if stack.cues.len() < before {
                        return MutationOutcome::Applied { cue_id };
                    }
                }
                MutationOutcome::CueNotFound
            }
        }
    }
}

impl CueDocument for MemoryCueDocument {
    fn stacks(&self) -> Vec<CueStack> {
        self.state.read().stacks.clone()
    }

    fn snapshot(&self, current_time: &str) -> Option<StackSnapshot> {
        let state = self.state.read();
        let stack = state.stacks.get(state.selected)?;
        Some(StackSnapshot::of(stack, state.selected, current_time).with_selection(state.selected_cue))
    }

    fn select_stack(&self, index: usize) -> Option<SelectedStack> {
        let mut state = self.state.write();
        let stack = state.stacks.get(index)?;
        let name = stack.name.clone();
        let countdown_seconds = stack
            .cues
            .first()
            .and_then(|cue| parse_timer_label(&cue.timer_value));
        let selected_cue = (!stack.cues.is_empty()).then_some(0);

        state.selected = index;
        state.selected_cue = selected_cue;
        debug!(index, name, "selected cue stack");
        Some(SelectedStack {
            index,
            name,
            countdown_seconds,
        })
    }

    fn apply(&self, mutation: CueMutation) -> oneshot::Receiver<MutationOutcome> {
        let (tx, rx) = oneshot::channel();
        let outcome = self.apply_now(mutation);
        if outcome.is_applied() {
            self.notify_refresh();
        }
        let _ = tx.send(outcome);
        rx
    }
}

/// Parses a cue timer label (`SS`, `M:SS`, or `H:MM:SS`) into seconds.
pub fn parse_timer_label(label: &str) -> Option<f64> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    let mut total = 0.0;
    for part in label.split(':') {
        let value: f64 = part.trim().parse().ok()?;
        if value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}
