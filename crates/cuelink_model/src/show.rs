//! Show-data entities and client-facing snapshots.
//!
//! These types mirror the desktop document layer's cue table: a
//! [`CueStack`] is an ordered list of [`Cue`]s, each holding one string
//! value per [`Column`]. The server core reads column names and counts for
//! permission checks and cue identifiers for mutation routing; everything
//! else passes through untouched.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single column of the cue table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Display name. Canonical key for the permission model.
    pub name: String,
    /// Display width in points.
    pub width: f64,
}

impl Column {
    /// Creates a column with the given name and width.
    pub fn new(name: impl Into<String>, width: f64) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }
}

/// A single cue row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    /// Stable identifier, survives reordering.
    pub id: Uuid,
    /// One value per column, aligned to the stack's column order.
    pub values: Vec<String>,
    /// Timer label shown while this cue is live (e.g. "5:00").
    pub timer_value: String,
    /// Whether the cue has been struck through by the operator.
    #[serde(default)]
    pub struck_through: bool,
}

impl Cue {
    /// Creates a cue with a fresh identifier.
    pub fn new(values: Vec<String>, timer_value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            values,
            timer_value: timer_value.into(),
            struck_through: false,
        }
    }
}

/// An ordered stack of cues with its column layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CueStack {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Ordered columns.
    pub columns: Vec<Column>,
    /// Ordered cues.
    pub cues: Vec<Cue>,
}

impl CueStack {
    /// Creates an empty stack with the given name and columns.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            columns,
            cues: Vec::new(),
        }
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Looks up a cue by identifier.
    pub fn cue(&self, id: Uuid) -> Option<&Cue> {
        self.cues.iter().find(|c| c.id == id)
    }
}

/// Point-in-time view of the selected stack served to polling clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSnapshot {
    /// Identifier of the stack this snapshot was taken from.
    pub cue_stack_id: Uuid,
    /// Display name of the stack.
    pub cue_stack_name: String,
    /// Index of the stack within the document's stack list.
    pub cue_stack_index: usize,
    /// Ordered columns.
    pub columns: Vec<Column>,
    /// Ordered cues.
    pub cues: Vec<Cue>,
    /// Index of the currently selected cue, if any.
    pub selected_cue_index: Option<usize>,
    /// Operator-assigned row highlight colors, aligned to `cues`.
    #[serde(default)]
    pub highlight_colors: Vec<Option<String>>,
    /// Server wall-clock at snapshot time, `HH:MM:SS`.
    pub current_time: String,
}

impl StackSnapshot {
    /// Builds a snapshot of the given stack.
    pub fn of(stack: &CueStack, index: usize, current_time: impl Into<String>) -> Self {
        Self {
            cue_stack_id: stack.id,
            cue_stack_name: stack.name.clone(),
            cue_stack_index: index,
            columns: stack.columns.clone(),
            cues: stack.cues.clone(),
            selected_cue_index: None,
            highlight_colors: vec![None; stack.cues.len()],
            current_time: current_time.into(),
        }
    }

    /// Sets the selected cue index.
    pub fn with_selection(mut self, index: Option<usize>) -> Self {
        self.selected_cue_index = index;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_stack() -> CueStack {
        let mut stack = CueStack::new(
            "Act One",
            vec![
                Column::new("Cue", 60.0),
                Column::new("Preset", 120.0),
                Column::new("Notes", 200.0),
            ],
        );
        stack.cues.push(Cue::new(
            vec!["1".into(), "Warm wash".into(), "House out".into()],
            "5:00",
        ));
        stack
    }

    #[test]
    fn column_names_in_order() {
        let stack = demo_stack();
        assert_eq!(stack.column_names(), vec!["Cue", "Preset", "Notes"]);
    }

    #[test]
    fn cue_lookup_by_id() {
        let stack = demo_stack();
        let id = stack.cues[0].id;
        assert!(stack.cue(id).is_some());
        assert!(stack.cue(Uuid::new_v4()).is_none());
    }

    #[test]
    fn snapshot_round_trip() {
        let stack = demo_stack();
        let snapshot = StackSnapshot::of(&stack, 0, "14:30:00").with_selection(Some(0));

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"cueStackName\":\"Act One\""));
        assert!(json.contains("\"selectedCueIndex\":0"));
        assert!(json.contains("\"currentTime\":\"14:30:00\""));

        let back: StackSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn struck_through_defaults_false() {
        let json = r#"{"id":"6a3bfa51-67ac-4f6c-9a41-8f4e1d39c1bb","values":["1"],"timerValue":""}"#;
        let cue: Cue = serde_json::from_str(json).unwrap();
        assert!(!cue.struck_through);
    }
}
