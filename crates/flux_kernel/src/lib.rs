//! # Flux kernel
//!
//! Cellular-automaton style rule engine over the grids a document declares.
//!
//! - [`init_runtime_state`] seeds params and materialises grid matrices
//! - [`run_docstep_once`] is the pure `prev -> next` docstep transition
//! - [`handle_event`] is the reserved event entry point (currently a no-op)
//! - [`compute_grid_layout`] derives `(row, col)` positions for rendering
//! - [`create_runtime`] wraps the transitions in a timer-driven live runtime

pub mod state;
pub mod rules;
pub mod layout;
pub mod runtime;

pub use state::{init_runtime_state, grid_dimensions, GridState, RuntimeState};
pub use rules::{run_docstep_once, handle_event};
pub use layout::{compute_grid_layout, GridLayout, LayoutCell};
pub use runtime::{create_runtime, Runtime};

use serde::{Serialize, Deserialize};
use thiserror::Error;

use flux_lang::{OpError, Value};

/// Kernel errors; each names the rule that raised it
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("Rule '{rule}': condition must be a boolean, got {found}")]
    NonBooleanCondition { rule: String, found: &'static str },

    #[error("Rule '{rule}': invalid assignment target '{target}'")]
    InvalidAssignmentTarget { rule: String, target: String },

    #[error("Rule '{rule}': cannot write cell.{field} outside a grid-scoped rule")]
    CellWriteOutsideGrid { rule: String, field: String },

    #[error("Rule '{rule}': '{name}' is only available inside a grid-scoped rule")]
    OutsideGrid { rule: String, name: String },

    #[error("Rule '{rule}': unknown neighbors method '{method}'")]
    UnknownNeighborsMethod { rule: String, method: String },

    #[error("Rule '{rule}': unknown grid '{grid}'")]
    UnknownGrid { rule: String, grid: String },

    #[error("Rule '{rule}': unknown identifier '{name}'")]
    UnknownIdentifier { rule: String, name: String },

    #[error("Rule '{rule}': unknown parameter '{name}'")]
    UnknownParam { rule: String, name: String },

    #[error("Rule '{rule}': calls are not supported in rules ('{callee}')")]
    UnsupportedCall { rule: String, callee: String },

    #[error("Rule '{rule}': {message}")]
    Type { rule: String, message: String },

    #[error("Rule '{rule}': {source}")]
    Operator { rule: String, source: OpError },

    #[error("No docstep interval: pass one or declare runtime {{ docstepAdvance = [ timer(...) ]; }}")]
    MissingInterval,

    #[error("Docstep interval of {0}s is out of range")]
    InvalidInterval(f64),
}

/// External event delivered to [`handle_event`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub location: Option<Value>,
    pub payload: Option<Value>,
}

impl RuntimeEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            location: None,
            payload: None,
        }
    }
}
