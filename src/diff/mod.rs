//! Diff computation between desired and observed resource state.

mod delta;
mod engine;

pub use delta::{DeltaKind, EntryChange, FieldChange, ResourceDelta, StateDelta};
pub use engine::DiffEngine;

use serde::{Deserialize, Serialize};

/// Reconciliation mode controlling how the delta is computed.
///
/// An unrecognized mode string fails at parse time (serde/clap) — there is
/// no runtime "unknown mode" path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StateMode {
    /// Fields set in `want` are applied on top of `have`; nothing is
    /// removed.
    #[default]
    Merged,
    /// Each resource named in `want` converges exactly to its declared
    /// fields: unspecified fields are cleared first, then the merge is
    /// applied.
    Replaced,
    /// Global policy: resources absent from `want` are deleted (protected
    /// defaults excepted), resources present in `want` are replaced.
    Overridden,
    /// Named resources (or selector matches) are deleted; an empty `want`
    /// deletes everything except protected defaults.
    Deleted,
}

impl std::fmt::Display for StateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Merged => "merged",
            Self::Replaced => "replaced",
            Self::Overridden => "overridden",
            Self::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}
