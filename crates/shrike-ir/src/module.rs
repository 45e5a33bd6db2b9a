//! The IR object model: modules, functions, basic blocks and values.
//!
//! All IR objects live in arenas owned by the [`Module`] and are referred to
//! by index ids. Everything the optimizer annotates carries a mutable
//! [`Type`]: instructions, parameters, frame variables and functions (whose
//! annotation is their return type). Literals have a fixed type derived from
//! the literal itself.

use thiserror::Error;

use crate::instruction::InstKind;
use crate::types::Type;
use smallvec::SmallVec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParamId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LitId(pub u32);

/// A reference to any IR value that can appear as an operand or carry a
/// type annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueId {
    Inst(InstId),
    Param(ParamId),
    Var(VarId),
    Func(FuncId),
    Literal(LitId),
}

impl From<InstId> for ValueId {
    fn from(id: InstId) -> ValueId {
        ValueId::Inst(id)
    }
}

impl From<ParamId> for ValueId {
    fn from(id: ParamId) -> ValueId {
        ValueId::Param(id)
    }
}

impl From<VarId> for ValueId {
    fn from(id: VarId) -> ValueId {
        ValueId::Var(id)
    }
}

impl From<FuncId> for ValueId {
    fn from(id: FuncId) -> ValueId {
        ValueId::Func(id)
    }
}

impl From<LitId> for ValueId {
    fn from(id: LitId) -> ValueId {
        ValueId::Literal(id)
    }
}

/// A constant value. Literals are interned by the builder, so two uses of
/// the same constant (in particular property-name strings) share one id and
/// compare equal by id.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    BigInt(String),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Undefined => Type::undefined(),
            Literal::Null => Type::null(),
            Literal::Bool(_) => Type::boolean(),
            Literal::Number(_) => Type::number(),
            Literal::String(_) => Type::string(),
            Literal::BigInt(_) => Type::bigint(),
        }
    }
}

/// How a basic block ends. Terminators transfer control and produce no
/// value, so they carry no type annotation.
///
/// Terminator operands are SSA values (instruction results, literals or
/// parameters), never frame variables or stack addresses.
#[derive(Clone, Debug)]
pub enum Terminator {
    Jump {
        target: BlockId,
    },
    CondBranch {
        cond: ValueId,
        true_target: BlockId,
        false_target: BlockId,
    },
    Switch {
        disc: ValueId,
        cases: Vec<(LitId, BlockId)>,
        default: BlockId,
    },
    Return {
        value: ValueId,
    },
    Throw {
        value: ValueId,
    },
    Unreachable,
}

impl Terminator {
    /// SSA values read by this terminator.
    pub fn operands(&self) -> SmallVec<[ValueId; 2]> {
        match self {
            Terminator::Jump { .. } | Terminator::Unreachable => SmallVec::new(),
            Terminator::CondBranch { cond, .. } => [*cond].into_iter().collect(),
            Terminator::Switch { disc, cases, .. } => {
                let mut ops: SmallVec<[ValueId; 2]> = [*disc].into_iter().collect();
                ops.extend(cases.iter().map(|&(lit, _)| ValueId::Literal(lit)));
                ops
            }
            Terminator::Return { value } | Terminator::Throw { value } => {
                [*value].into_iter().collect()
            }
        }
    }

    /// Block targets this terminator can transfer control to.
    pub fn targets(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            Terminator::Jump { target } => [*target].into_iter().collect(),
            Terminator::CondBranch {
                true_target,
                false_target,
                ..
            } => [*true_target, *false_target].into_iter().collect(),
            Terminator::Switch { cases, default, .. } => {
                let mut ts: SmallVec<[BlockId; 2]> = cases.iter().map(|&(_, b)| b).collect();
                ts.push(*default);
                ts
            }
            Terminator::Return { .. } | Terminator::Throw { .. } | Terminator::Unreachable => {
                SmallVec::new()
            }
        }
    }
}

/// A sequence of instructions ending in a terminator.
#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub insts: Vec<InstId>,
    pub terminator: Terminator,
}

/// A function: blocks, dynamic formal parameters, and a scope of frame
/// variables. The function's own type annotation is its return type.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<ParamId>,
    pub variables: Vec<VarId>,
    pub blocks: Vec<BasicBlock>,
    /// Inner function of a generator; may be resumed with any value.
    pub is_generator_inner: bool,
    /// The module's top-level function, callable from outside the module.
    pub is_global_scope: bool,
    pub(crate) ty: Type,
}

pub(crate) struct InstData {
    pub(crate) kind: InstKind,
    pub(crate) ty: Type,
}

pub(crate) struct ParamData {
    pub(crate) name: String,
    pub(crate) ty: Type,
}

pub(crate) struct VarData {
    pub(crate) name: String,
    pub(crate) ty: Type,
}

/// A compilation unit owning every function and value arena.
#[derive(Default)]
pub struct Module {
    pub(crate) functions: Vec<Function>,
    pub(crate) insts: Vec<InstData>,
    pub(crate) params: Vec<ParamData>,
    pub(crate) vars: Vec<VarData>,
    pub(crate) literals: Vec<Literal>,
}

impl Module {
    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> {
        (0..self.functions.len() as u32).map(FuncId)
    }

    pub fn function(&self, f: FuncId) -> &Function {
        &self.functions[f.0 as usize]
    }

    pub fn kind(&self, i: InstId) -> &InstKind {
        &self.insts[i.0 as usize].kind
    }

    pub fn literal(&self, l: LitId) -> &Literal {
        &self.literals[l.0 as usize]
    }

    pub fn param_name(&self, p: ParamId) -> &str {
        &self.params[p.0 as usize].name
    }

    pub fn var_name(&self, v: VarId) -> &str {
        &self.vars[v.0 as usize].name
    }

    pub fn inst_type(&self, i: InstId) -> Type {
        self.insts[i.0 as usize].ty
    }

    pub fn set_inst_type(&mut self, i: InstId, ty: Type) {
        self.insts[i.0 as usize].ty = ty;
    }

    pub fn func_type(&self, f: FuncId) -> Type {
        self.functions[f.0 as usize].ty
    }

    pub fn set_func_type(&mut self, f: FuncId, ty: Type) {
        self.functions[f.0 as usize].ty = ty;
    }

    /// The current type annotation of any value.
    pub fn value_type(&self, v: ValueId) -> Type {
        match v {
            ValueId::Inst(i) => self.insts[i.0 as usize].ty,
            ValueId::Param(p) => self.params[p.0 as usize].ty,
            ValueId::Var(x) => self.vars[x.0 as usize].ty,
            ValueId::Func(f) => self.functions[f.0 as usize].ty,
            ValueId::Literal(l) => self.literals[l.0 as usize].ty(),
        }
    }

    /// Replace the type annotation of a value. Literal types are fixed by
    /// the literal; trying to change one is a programming error.
    pub fn set_value_type(&mut self, v: ValueId, ty: Type) {
        match v {
            ValueId::Inst(i) => self.insts[i.0 as usize].ty = ty,
            ValueId::Param(p) => self.params[p.0 as usize].ty = ty,
            ValueId::Var(x) => self.vars[x.0 as usize].ty = ty,
            ValueId::Func(f) => self.functions[f.0 as usize].ty = ty,
            ValueId::Literal(_) => panic!("literal types are immutable"),
        }
    }

    /// All instructions of a function, in program order (block order, then
    /// instruction order within the block).
    pub fn inst_order(&self, f: FuncId) -> Vec<InstId> {
        self.function(f)
            .blocks
            .iter()
            .flat_map(|b| b.insts.iter().copied())
            .collect()
    }

    /// Structural sanity checks: id ranges, slot-addressing shapes and
    /// terminator targets.
    pub fn verify(&self) -> Result<(), IrError> {
        for f in self.func_ids() {
            let func = self.function(f);
            for (bi, block) in func.blocks.iter().enumerate() {
                let block_id = BlockId(bi as u32);
                for &i in &block.insts {
                    let kind = self
                        .insts
                        .get(i.0 as usize)
                        .map(|d| &d.kind)
                        .ok_or(IrError::InstOutOfRange { func: f, inst: i })?;
                    for op in kind.operands() {
                        if !self.value_in_range(op) {
                            return Err(IrError::OperandOutOfRange { inst: i, operand: op });
                        }
                    }
                    match kind {
                        InstKind::LoadStack { addr } | InstKind::StoreStack { addr, .. } => {
                            if !matches!(self.kind(*addr), InstKind::AllocStack) {
                                return Err(IrError::NotAStackAddress { inst: i, addr: *addr });
                            }
                        }
                        _ => {}
                    }
                }
                for op in block.terminator.operands() {
                    if !self.value_in_range(op) {
                        return Err(IrError::TerminatorOperandOutOfRange {
                            func: f,
                            block: block_id,
                            operand: op,
                        });
                    }
                    if matches!(op, ValueId::Var(_)) {
                        return Err(IrError::TerminatorReadsSlot {
                            func: f,
                            block: block_id,
                        });
                    }
                }
                for target in block.terminator.targets() {
                    if target.0 as usize >= func.blocks.len() {
                        return Err(IrError::BadBranchTarget {
                            func: f,
                            block: block_id,
                            target,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Check the output discipline: an instruction's annotation is NoType
    /// exactly when it produces no value. Holds after type inference.
    pub fn verify_annotations(&self) -> Result<(), IrError> {
        for f in self.func_ids() {
            for i in self.inst_order(f) {
                let has_output = self.kind(i).has_output();
                if self.inst_type(i).is_no_type() == has_output {
                    return Err(IrError::OutputDiscipline { inst: i, has_output });
                }
            }
        }
        Ok(())
    }

    fn value_in_range(&self, v: ValueId) -> bool {
        match v {
            ValueId::Inst(i) => (i.0 as usize) < self.insts.len(),
            ValueId::Param(p) => (p.0 as usize) < self.params.len(),
            ValueId::Var(x) => (x.0 as usize) < self.vars.len(),
            ValueId::Func(f) => (f.0 as usize) < self.functions.len(),
            ValueId::Literal(l) => (l.0 as usize) < self.literals.len(),
        }
    }
}

#[derive(Debug, Error)]
pub enum IrError {
    #[error("function {func:?} references instruction {inst:?} out of range")]
    InstOutOfRange { func: FuncId, inst: InstId },
    #[error("instruction {inst:?}: operand {operand:?} out of range")]
    OperandOutOfRange { inst: InstId, operand: ValueId },
    #[error("instruction {inst:?}: {addr:?} is not a stack allocation")]
    NotAStackAddress { inst: InstId, addr: InstId },
    #[error("function {func:?}, block {block:?}: terminator operand {operand:?} out of range")]
    TerminatorOperandOutOfRange {
        func: FuncId,
        block: BlockId,
        operand: ValueId,
    },
    #[error("function {func:?}, block {block:?}: terminator reads a frame variable")]
    TerminatorReadsSlot { func: FuncId, block: BlockId },
    #[error("function {func:?}, block {block:?}: branch target {target:?} out of range")]
    BadBranchTarget {
        func: FuncId,
        block: BlockId,
        target: BlockId,
    },
    #[error("instruction {inst:?} violates the output discipline (has_output = {has_output})")]
    OutputDiscipline { inst: InstId, has_output: bool },
}
