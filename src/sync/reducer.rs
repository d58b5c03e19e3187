//! State reducer: the only code that mutates [`ObservableState`].
//!
//! # Rules
//! ```text
//! begin:                 {data: kept,  is_loading: true,  error: None}
//! Ok(v),  current gen:   {data: v,     is_loading: false, error: None}
//! Err(e), current gen:   {data: kept,  is_loading: false, error: e}
//! any,    stale gen:     no change
//! ```
//!
//! Errors never clear data: the last good value stays visible next to the
//! error.

use crate::sync::error::SyncResult;
use crate::sync::state::{Generation, ObservableState};

/// Result of one fetch, tagged with the generation it was issued under.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub generation: Generation,
    pub result: SyncResult<T>,
}

/// What the reducer did with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Written to state as data.
    Applied,
    /// Written to state as an error.
    Failed,
    /// Superseded; state untouched.
    Stale,
}

impl Disposition {
    /// True if the state was written.
    pub fn is_applied(self) -> bool {
        !matches!(self, Disposition::Stale)
    }

    /// Label used for metrics.
    pub fn label(self) -> &'static str {
        match self {
            Disposition::Applied => "applied",
            Disposition::Failed => "error",
            Disposition::Stale => "stale",
        }
    }
}

/// Pre-apply the loading state. Returns whether anything changed.
pub fn begin_loading<T>(state: &mut ObservableState<T>) -> bool {
    let changed = !state.is_loading || state.error.is_some();
    state.is_loading = true;
    state.error = None;
    changed
}

/// Apply `outcome` if it belongs to `current`.
pub fn apply<T>(
    state: &mut ObservableState<T>,
    outcome: Outcome<T>,
    current: Generation,
) -> Disposition {
    if outcome.generation != current {
        return Disposition::Stale;
    }

    match outcome.result {
        Ok(value) => {
            state.data = Some(value);
            state.is_loading = false;
            state.error = None;
            Disposition::Applied
        }
        Err(error) => {
            state.is_loading = false;
            state.error = Some(error);
            Disposition::Failed
        }
    }
}
