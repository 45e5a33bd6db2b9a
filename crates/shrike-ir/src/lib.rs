//! # Shrike IR
//!
//! The SSA-form intermediate representation of the Shrike compiler: a type
//! lattice over runtime tag sets, arena-owned modules of functions, basic
//! blocks and instructions, a builder for constructing IR, and a reverse
//! def-use index for analyses.
//!
//! ## Modules
//!
//! - **[`types`]** - The tag-set type lattice
//! - **[`instruction`]** - Instruction kinds and their static metadata
//! - **[`module`]** - Modules, functions, blocks and value arenas
//! - **[`builder`]** - IR construction
//! - **[`uses`]** - Reverse def-use index

pub mod builder;
pub mod instruction;
pub mod module;
pub mod types;
pub mod uses;

pub use builder::ModuleBuilder;
pub use instruction::{BinaryOp, InstKind, UnaryOp};
pub use module::{
    BasicBlock, BlockId, FuncId, Function, InstId, IrError, LitId, Literal, Module, ParamId,
    Terminator, ValueId, VarId,
};
pub use types::Type;
pub use uses::{Use, UseMap};
