//! Refresh windows: which `(time, docstep)` a node is evaluated at

use flux_lang::{DocumentNode, DurationUnit, RefreshPolicy};

use crate::EvalError;

/// The evaluation instant for one policy, plus the key that identifies it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshWindow {
    /// Changes exactly when the node has to be re-evaluated
    pub key: i64,
    pub time: f64,
    pub docstep: u64,
}

/// A node's own policy, else the inherited one
pub fn effective_policy(node: &DocumentNode, inherited: RefreshPolicy) -> RefreshPolicy {
    node.refresh.unwrap_or(inherited)
}

/// Bucket length of an `every(amount, unit)` policy, in seconds
pub fn interval_seconds(amount: f64, unit: DurationUnit) -> Result<f64, EvalError> {
    let factor = unit
        .seconds_per_unit()
        .ok_or_else(|| EvalError::UnsupportedRefreshUnit(unit.name().to_string()))?;
    let seconds = amount * factor;
    if seconds > 0.0 && seconds.is_finite() {
        Ok(seconds)
    } else {
        Err(EvalError::InvalidRefreshInterval(seconds))
    }
}

pub fn refresh_window(policy: &RefreshPolicy, time: f64, docstep: u64) -> Result<RefreshWindow, EvalError> {
    match *policy {
        RefreshPolicy::OnLoad | RefreshPolicy::Never => Ok(RefreshWindow {
            key: 0,
            time: 0.0,
            docstep: 0,
        }),
        RefreshPolicy::OnDocstep => Ok(RefreshWindow {
            key: docstep as i64,
            time,
            docstep,
        }),
        RefreshPolicy::Every { amount, unit } => {
            let seconds = interval_seconds(amount, unit)?;
            let bucket = (time / seconds).floor();
            Ok(RefreshWindow {
                key: bucket as i64,
                time: bucket * seconds,
                docstep,
            })
        }
    }
}
