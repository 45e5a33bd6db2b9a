//! Reverse def-use index.
//!
//! Analyses that walk a value's users (memory-slot typing, owned-property
//! lookup, call-graph resolution) consume a [`UseMap`], built in one sweep
//! over the module. Optimization passes that only rewrite annotations leave
//! the IR structurally frozen, so one build per pass run is enough.

use fnv::FnvHashMap;

use crate::module::{BlockId, FuncId, InstId, Module, ValueId};

/// A single use of a value: either an instruction operand or a terminator
/// operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Use {
    Inst(InstId),
    Term { func: FuncId, block: BlockId },
}

pub struct UseMap {
    users: FnvHashMap<ValueId, Vec<Use>>,
}

impl UseMap {
    pub fn build(module: &Module) -> UseMap {
        let mut users: FnvHashMap<ValueId, Vec<Use>> = FnvHashMap::default();
        for f in module.func_ids() {
            for (bi, block) in module.function(f).blocks.iter().enumerate() {
                for &i in &block.insts {
                    for op in module.kind(i).operands() {
                        users.entry(op).or_default().push(Use::Inst(i));
                    }
                }
                for op in block.terminator.operands() {
                    users.entry(op).or_default().push(Use::Term {
                        func: f,
                        block: BlockId(bi as u32),
                    });
                }
            }
        }
        UseMap { users }
    }

    pub fn users(&self, v: impl Into<ValueId>) -> &[Use] {
        self.users.get(&v.into()).map(Vec::as_slice).unwrap_or(&[])
    }
}
