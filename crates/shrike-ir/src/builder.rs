//! Builder for constructing IR modules.
//!
//! Earlier pipeline stages (and tests) assemble IR through [`ModuleBuilder`].
//! Emission assigns each instruction its construction-time annotation: the
//! opcode's inherent type when it has one, otherwise `any()`. Passes that
//! know better (or tests reproducing a pipeline state) override annotations
//! with [`ModuleBuilder::set_type`].

use std::collections::HashMap;

use crate::instruction::InstKind;
use crate::module::{
    BasicBlock, BlockId, FuncId, Function, InstData, InstId, LitId, Literal, Module, ParamData,
    ParamId, Terminator, ValueId, VarData, VarId,
};
use crate::types::Type;

/// Interning key for literals. Numbers are keyed by their bit pattern so
/// `-0.0` and `0.0` stay distinct and `NaN` is equal to itself.
#[derive(PartialEq, Eq, Hash)]
enum LitKey {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    String(String),
    BigInt(String),
}

impl LitKey {
    fn of(lit: &Literal) -> LitKey {
        match lit {
            Literal::Undefined => LitKey::Undefined,
            Literal::Null => LitKey::Null,
            Literal::Bool(b) => LitKey::Bool(*b),
            Literal::Number(n) => LitKey::Number(n.to_bits()),
            Literal::String(s) => LitKey::String(s.clone()),
            Literal::BigInt(s) => LitKey::BigInt(s.clone()),
        }
    }
}

#[derive(Default)]
pub struct ModuleBuilder {
    module: Module,
    interned: HashMap<LitKey, LitId>,
}

impl ModuleBuilder {
    pub fn new() -> ModuleBuilder {
        ModuleBuilder::default()
    }

    /// Create an empty function. Blocks, parameters and variables are added
    /// separately.
    pub fn create_function(&mut self, name: &str) -> FuncId {
        let id = FuncId(self.module.functions.len() as u32);
        self.module.functions.push(Function {
            name: name.to_string(),
            params: Vec::new(),
            variables: Vec::new(),
            blocks: Vec::new(),
            is_generator_inner: false,
            is_global_scope: false,
            ty: Type::any(),
        });
        id
    }

    /// Mark a function as the module's top level. Its call sites are by
    /// definition not all visible in the module.
    pub fn mark_global_scope(&mut self, f: FuncId) {
        self.module.functions[f.0 as usize].is_global_scope = true;
    }

    /// Mark a function as the inner function of a generator.
    pub fn mark_generator_inner(&mut self, f: FuncId) {
        self.module.functions[f.0 as usize].is_generator_inner = true;
    }

    pub fn add_param(&mut self, f: FuncId, name: &str) -> ParamId {
        let id = ParamId(self.module.params.len() as u32);
        self.module.params.push(ParamData {
            name: name.to_string(),
            ty: Type::any(),
        });
        self.module.functions[f.0 as usize].params.push(id);
        id
    }

    pub fn add_variable(&mut self, f: FuncId, name: &str) -> VarId {
        let id = VarId(self.module.vars.len() as u32);
        self.module.vars.push(VarData {
            name: name.to_string(),
            ty: Type::any(),
        });
        self.module.functions[f.0 as usize].variables.push(id);
        id
    }

    /// Append a new block to a function. The terminator starts out as
    /// `Unreachable` until [`ModuleBuilder::set_terminator`] replaces it.
    pub fn append_block(&mut self, f: FuncId) -> BlockId {
        let func = &mut self.module.functions[f.0 as usize];
        let id = BlockId(func.blocks.len() as u32);
        func.blocks.push(BasicBlock {
            insts: Vec::new(),
            terminator: Terminator::Unreachable,
        });
        id
    }

    /// Emit an instruction at the end of a block.
    pub fn emit(&mut self, f: FuncId, b: BlockId, kind: InstKind) -> InstId {
        let ty = kind.inherent_type().unwrap_or(Type::any());
        let ty = if kind.has_output() { ty } else { Type::none() };
        let id = InstId(self.module.insts.len() as u32);
        self.module.insts.push(InstData { kind, ty });
        self.module.functions[f.0 as usize].blocks[b.0 as usize]
            .insts
            .push(id);
        id
    }

    pub fn set_terminator(&mut self, f: FuncId, b: BlockId, term: Terminator) {
        self.module.functions[f.0 as usize].blocks[b.0 as usize].terminator = term;
    }

    /// Append an incoming entry to a PHI. Loop back edges carry values
    /// emitted after the PHI, so those entries are added once the value
    /// exists.
    pub fn add_phi_entry(&mut self, phi: InstId, value: impl Into<ValueId>, from: BlockId) {
        match &mut self.module.insts[phi.0 as usize].kind {
            InstKind::Phi { entries } => entries.push((value.into(), from)),
            other => panic!("add_phi_entry on {}", other.name()),
        }
    }

    /// Override a value's construction-time annotation.
    pub fn set_type(&mut self, v: impl Into<ValueId>, ty: Type) {
        self.module.set_value_type(v.into(), ty);
    }

    pub fn undefined(&mut self) -> ValueId {
        self.literal(Literal::Undefined)
    }

    pub fn null(&mut self) -> ValueId {
        self.literal(Literal::Null)
    }

    pub fn bool(&mut self, value: bool) -> ValueId {
        self.literal(Literal::Bool(value))
    }

    pub fn number(&mut self, value: f64) -> ValueId {
        self.literal(Literal::Number(value))
    }

    pub fn string(&mut self, value: &str) -> ValueId {
        self.literal(Literal::String(value.to_string()))
    }

    pub fn bigint(&mut self, digits: &str) -> ValueId {
        self.literal(Literal::BigInt(digits.to_string()))
    }

    /// Intern a literal: equal literals share one id, so id equality is
    /// value equality (property names in particular).
    pub fn literal(&mut self, lit: Literal) -> ValueId {
        let key = LitKey::of(&lit);
        let literals = &mut self.module.literals;
        let id = *self.interned.entry(key).or_insert_with(|| {
            let id = LitId(literals.len() as u32);
            literals.push(lit);
            id
        });
        ValueId::Literal(id)
    }

    /// Intern a string literal and return its id, for use as a property
    /// name or switch case.
    pub fn string_id(&mut self, value: &str) -> LitId {
        match self.string(value) {
            ValueId::Literal(id) => id,
            _ => unreachable!(),
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn build(self) -> Module {
        self.module
    }
}
