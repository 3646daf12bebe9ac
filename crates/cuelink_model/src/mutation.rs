//! Mutation messages routed to the document layer.
//!
//! The server never edits cue data itself. A permission-checked request is
//! turned into a [`CueMutation`] and handed to the layer that owns the
//! document; the outcome comes back asynchronously.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A requested change to the cue document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CueMutation {
    /// Overwrite a single cell of an existing cue.
    #[serde(rename_all = "camelCase")]
    SetValue {
        /// Target cue.
        cue_id: Uuid,
        /// Column index within the cue's stack.
        column_index: usize,
        /// Replacement value.
        value: String,
    },
    /// Append a new cue to a stack.
    #[serde(rename_all = "camelCase")]
    AddCue {
        /// Target stack.
        cue_stack_id: Uuid,
        /// One value per column.
        values: Vec<String>,
        /// Timer label for the new cue.
        timer_value: String,
    },
    /// Remove an existing cue.
    #[serde(rename_all = "camelCase")]
    DeleteCue {
        /// Target cue.
        cue_id: Uuid,
    },
}

impl CueMutation {
    /// Returns the cue this mutation targets, when it targets one.
    pub fn cue_id(&self) -> Option<Uuid> {
        match self {
            CueMutation::SetValue { cue_id, .. } | CueMutation::DeleteCue { cue_id } => {
                Some(*cue_id)
            }
            CueMutation::AddCue { .. } => None,
        }
    }
}

/// Result of applying a [`CueMutation`], reported by the document layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationOutcome {
    /// The mutation was applied. Carries the cue id (fresh for `AddCue`).
    Applied {
        /// Identifier of the affected cue.
        cue_id: Uuid,
    },
    /// The targeted cue does not exist.
    CueNotFound,
    /// The targeted stack does not exist.
    StackNotFound,
    /// The document layer refused the change.
    Rejected {
        /// Human-readable reason.
        reason: String,
    },
}

impl MutationOutcome {
    /// Returns true if the mutation was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_target_cue() {
        let id = Uuid::new_v4();
        let set = CueMutation::SetValue {
            cue_id: id,
            column_index: 2,
            value: "Preset 5".into(),
        };
        assert_eq!(set.cue_id(), Some(id));

        let add = CueMutation::AddCue {
            cue_stack_id: Uuid::new_v4(),
            values: vec![],
            timer_value: String::new(),
        };
        assert_eq!(add.cue_id(), None);
    }

    #[test]
    fn mutation_serde_tagging() {
        let delete = CueMutation::DeleteCue {
            cue_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&delete).unwrap();
        assert!(json.contains("\"kind\":\"deleteCue\""));

        let back: CueMutation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, delete);
    }

    #[test]
    fn outcome_applied_check() {
        assert!(MutationOutcome::Applied {
            cue_id: Uuid::new_v4()
        }
        .is_applied());
        assert!(!MutationOutcome::CueNotFound.is_applied());
    }
}
