//! # Shrike Optimizer
//!
//! Optimizer passes for the Shrike compiler, operating on the SSA IR from
//! `shrike-ir`.
//!
//! ## Modules
//!
//! - **[`call_graph`]** - Call-graph queries for interprocedural inference
//! - **[`type_inference`]** - The type-inference pass
//! - **[`stats`]** - Pass statistics

pub mod call_graph;
pub mod stats;
pub mod type_inference;

pub use call_graph::{CallGraphProvider, ReceiverKind, SimpleCallGraphProvider};
pub use stats::TypeInferenceStats;
pub use type_inference::TypeInference;
