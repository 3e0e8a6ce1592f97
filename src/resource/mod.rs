//! Typed resource model: values, states, kinds, normalization.

mod fingerprint;
mod kind;
mod normalize;
mod state;
mod value;

pub use fingerprint::StateFingerprint;
pub use kind::{EntryKey, FactsFlavor, KindRegistry, NormalizePolicy, NullHandling, ResourceKind};
pub use normalize::{NormalizedWant, Normalizer};
pub use state::ResourceState;
pub use value::{FieldMap, FieldValue};
