//! Optimizer pass statistics.

use serde::{Deserialize, Serialize};

/// Counters reported by the type-inference pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeInferenceStats {
    /// Instructions whose annotation ended the pass different from its
    /// pre-pass value.
    pub num_type_inferred: usize,
    /// Property loads whose value was resolved from a single qualifying
    /// store.
    pub unique_property_value: usize,
    /// The largest number of local fixpoint sweeps any one function needed.
    pub max_fixpoint_iterations: usize,
}
