//! Instruction kinds and their static metadata.
//!
//! Everything the optimizer needs to know about an instruction without
//! interpreting it lives here: its operands, whether it produces a value,
//! and its inherent type (a type guaranteed by the opcode regardless of
//! operands, e.g. an array allocation always yields an array).

use crate::module::{BlockId, FuncId, InstId, LitId, ParamId, ValueId, VarId};
use crate::types::Type;
use smallvec::SmallVec;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// `void x`
    Void,
    /// `typeof x`
    Typeof,
    /// `-x`
    Minus,
    /// `++x`
    Inc,
    /// `--x`
    Dec,
    /// `~x`
    Tilde,
    /// `!x`
    Bang,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    InstanceOf,
    Add,
    Subtract,
    Multiply,
    Divide,
    Exponentiation,
    Modulo,
    LeftShift,
    RightShift,
    UnsignedRightShift,
    BitAnd,
    BitOr,
    BitXor,
}

#[derive(Clone, Debug)]
pub enum InstKind {
    /// SSA merge at a block head: one incoming value per predecessor.
    Phi { entries: Vec<(ValueId, BlockId)> },

    Unary {
        op: UnaryOp,
        operand: ValueId,
    },
    Binary {
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
    },

    // Moves and slot traffic.
    Mov { src: ValueId },
    ImplicitMov { src: ValueId },
    LoadConst { src: LitId },
    LoadParam { param: ParamId },
    LoadStack { addr: InstId },
    StoreStack { addr: InstId, value: ValueId },
    LoadFrame { var: VarId },
    StoreFrame { var: VarId, value: ValueId },

    // Property traffic.
    LoadProperty { object: ValueId, property: ValueId },
    TryLoadGlobalProperty { name: LitId },
    StoreProperty {
        object: ValueId,
        property: ValueId,
        value: ValueId,
    },
    StoreOwnProperty {
        object: ValueId,
        property: ValueId,
        value: ValueId,
    },
    StoreGetterSetter {
        object: ValueId,
        property: ValueId,
        getter: ValueId,
        setter: ValueId,
    },
    DeleteProperty { object: ValueId, property: ValueId },

    // Allocations and creators.
    AllocStack,
    AllocObject,
    AllocArray { size: u32 },
    AllocObjectLiteral,
    AllocObjectFromBuffer,
    GetTemplateObject,
    CreateArguments,
    CreateRegExp { pattern: LitId, flags: LitId },
    CreateFunction { func: FuncId },
    CreateGenerator { func: FuncId },
    GetBuiltinClosure { builtin: u32 },
    GetGlobalObject,
    CreateEnvironment,
    ResolveEnvironment { depth: u32 },
    GetThisNS,
    CreateThis { callee: ValueId },
    GetConstructedObject {
        this_value: ValueId,
        construct: InstId,
    },

    // Calls.
    Call { callee: ValueId, args: Vec<ValueId> },
    Construct { callee: ValueId, args: Vec<ValueId> },
    CallBuiltin { builtin: u32, args: Vec<ValueId> },

    // Coercions.
    CoerceThisNS { operand: ValueId },
    AddEmptyString { operand: ValueId },
    AsNumber { operand: ValueId },
    AsNumeric { operand: ValueId },
    AsInt32 { operand: ValueId },

    // Checked accesses.
    ThrowIfEmpty { checked: ValueId },
    PrLoad {
        object: ValueId,
        index: u32,
        checked_type: Type,
    },
    PrStore {
        object: ValueId,
        index: u32,
        value: ValueId,
    },

    // Environments, iterators, generators and the rest.
    DirectEval { code: ValueId },
    Catch,
    GetNewTarget,
    IteratorBegin { source: ValueId },
    IteratorNext { iterator: ValueId, source: ValueId },
    IteratorClose { iterator: ValueId },
    LoadFromEnvironment { env: ValueId, slot: u32 },
    StoreToEnvironment {
        env: ValueId,
        slot: u32,
        value: ValueId,
    },
    ResumeGenerator,
    GetArgumentsPropByVal { index: ValueId },
    GetArgumentsLength,
    DeclareGlobalVar { name: LitId },
    Debugger,
    TryStart,
    TryEnd,
    ProfilePoint { point: u16 },
    ReifyArguments,
}

impl InstKind {
    /// Values read by this instruction.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        use InstKind::*;
        match self {
            Phi { entries } => entries.iter().map(|&(v, _)| v).collect(),
            Unary { operand, .. }
            | CoerceThisNS { operand }
            | AddEmptyString { operand }
            | AsNumber { operand }
            | AsNumeric { operand }
            | AsInt32 { operand } => [*operand].into_iter().collect(),
            Binary { lhs, rhs, .. } => [*lhs, *rhs].into_iter().collect(),
            Mov { src } | ImplicitMov { src } => [*src].into_iter().collect(),
            LoadConst { src } => [ValueId::Literal(*src)].into_iter().collect(),
            LoadParam { param } => [ValueId::Param(*param)].into_iter().collect(),
            LoadStack { addr } => [ValueId::Inst(*addr)].into_iter().collect(),
            StoreStack { addr, value } => [ValueId::Inst(*addr), *value].into_iter().collect(),
            LoadFrame { var } => [ValueId::Var(*var)].into_iter().collect(),
            StoreFrame { var, value } => [ValueId::Var(*var), *value].into_iter().collect(),
            LoadProperty { object, property } | DeleteProperty { object, property } => {
                [*object, *property].into_iter().collect()
            }
            TryLoadGlobalProperty { name } | DeclareGlobalVar { name } => {
                [ValueId::Literal(*name)].into_iter().collect()
            }
            StoreProperty {
                object,
                property,
                value,
            }
            | StoreOwnProperty {
                object,
                property,
                value,
            } => [*object, *property, *value].into_iter().collect(),
            StoreGetterSetter {
                object,
                property,
                getter,
                setter,
            } => [*object, *property, *getter, *setter].into_iter().collect(),
            CreateRegExp { pattern, flags } => {
                [ValueId::Literal(*pattern), ValueId::Literal(*flags)]
                    .into_iter()
                    .collect()
            }
            CreateFunction { func } | CreateGenerator { func } => {
                [ValueId::Func(*func)].into_iter().collect()
            }
            CreateThis { callee } => [*callee].into_iter().collect(),
            GetConstructedObject {
                this_value,
                construct,
            } => [*this_value, ValueId::Inst(*construct)].into_iter().collect(),
            Call { callee, args } | Construct { callee, args } => {
                let mut ops: SmallVec<[ValueId; 4]> = [*callee].into_iter().collect();
                ops.extend(args.iter().copied());
                ops
            }
            CallBuiltin { args, .. } => args.iter().copied().collect(),
            ThrowIfEmpty { checked } => [*checked].into_iter().collect(),
            PrLoad { object, .. } => [*object].into_iter().collect(),
            PrStore { object, value, .. } => [*object, *value].into_iter().collect(),
            DirectEval { code } => [*code].into_iter().collect(),
            IteratorBegin { source } => [*source].into_iter().collect(),
            IteratorNext { iterator, source } => [*iterator, *source].into_iter().collect(),
            IteratorClose { iterator } => [*iterator].into_iter().collect(),
            LoadFromEnvironment { env, .. } => [*env].into_iter().collect(),
            StoreToEnvironment { env, value, .. } => [*env, *value].into_iter().collect(),
            GetArgumentsPropByVal { index } => [*index].into_iter().collect(),
            AllocStack
            | AllocObject
            | AllocArray { .. }
            | AllocObjectLiteral
            | AllocObjectFromBuffer
            | GetTemplateObject
            | CreateArguments
            | GetBuiltinClosure { .. }
            | GetGlobalObject
            | CreateEnvironment
            | ResolveEnvironment { .. }
            | GetThisNS
            | Catch
            | GetNewTarget
            | ResumeGenerator
            | GetArgumentsLength
            | Debugger
            | TryStart
            | TryEnd
            | ProfilePoint { .. }
            | ReifyArguments => SmallVec::new(),
        }
    }

    /// Whether the instruction produces a value. Instructions without an
    /// output keep a NoType annotation; everything else must end the pass
    /// with a non-NoType annotation.
    pub fn has_output(&self) -> bool {
        use InstKind::*;
        !matches!(
            self,
            StoreStack { .. }
                | StoreFrame { .. }
                | StoreProperty { .. }
                | StoreOwnProperty { .. }
                | StoreGetterSetter { .. }
                | StoreToEnvironment { .. }
                | PrStore { .. }
                | DeclareGlobalVar { .. }
                | Debugger
                | TryStart
                | TryEnd
                | ProfilePoint { .. }
                | ReifyArguments
        )
    }

    /// The type guaranteed by the opcode itself, independent of operands.
    pub fn inherent_type(&self) -> Option<Type> {
        use InstKind::*;
        match self {
            AllocArray { .. } => Some(Type::array()),
            AllocObjectLiteral | AllocObjectFromBuffer | GetTemplateObject | GetGlobalObject => {
                Some(Type::object())
            }
            CreateArguments => Some(Type::arguments()),
            CreateRegExp { .. } => Some(Type::regexp()),
            CreateFunction { .. } | CreateGenerator { .. } | GetBuiltinClosure { .. } => {
                Some(Type::closure())
            }
            CreateEnvironment | ResolveEnvironment { .. } => Some(Type::environment()),
            CoerceThisNS { .. } => Some(Type::object()),
            AddEmptyString { .. } => Some(Type::string()),
            AsNumber { .. } => Some(Type::number()),
            AsNumeric { .. } => Some(Type::number().union(Type::bigint())),
            AsInt32 { .. } => Some(Type::int32()),
            _ => None,
        }
    }

    /// A short name for logs and fatal errors.
    pub fn name(&self) -> &'static str {
        use InstKind::*;
        match self {
            Phi { .. } => "Phi",
            Unary { .. } => "Unary",
            Binary { .. } => "Binary",
            Mov { .. } => "Mov",
            ImplicitMov { .. } => "ImplicitMov",
            LoadConst { .. } => "LoadConst",
            LoadParam { .. } => "LoadParam",
            LoadStack { .. } => "LoadStack",
            StoreStack { .. } => "StoreStack",
            LoadFrame { .. } => "LoadFrame",
            StoreFrame { .. } => "StoreFrame",
            LoadProperty { .. } => "LoadProperty",
            TryLoadGlobalProperty { .. } => "TryLoadGlobalProperty",
            StoreProperty { .. } => "StoreProperty",
            StoreOwnProperty { .. } => "StoreOwnProperty",
            StoreGetterSetter { .. } => "StoreGetterSetter",
            DeleteProperty { .. } => "DeleteProperty",
            AllocStack => "AllocStack",
            AllocObject => "AllocObject",
            AllocArray { .. } => "AllocArray",
            AllocObjectLiteral => "AllocObjectLiteral",
            AllocObjectFromBuffer => "AllocObjectFromBuffer",
            GetTemplateObject => "GetTemplateObject",
            CreateArguments => "CreateArguments",
            CreateRegExp { .. } => "CreateRegExp",
            CreateFunction { .. } => "CreateFunction",
            CreateGenerator { .. } => "CreateGenerator",
            GetBuiltinClosure { .. } => "GetBuiltinClosure",
            GetGlobalObject => "GetGlobalObject",
            CreateEnvironment => "CreateEnvironment",
            ResolveEnvironment { .. } => "ResolveEnvironment",
            GetThisNS => "GetThisNS",
            CreateThis { .. } => "CreateThis",
            GetConstructedObject { .. } => "GetConstructedObject",
            Call { .. } => "Call",
            Construct { .. } => "Construct",
            CallBuiltin { .. } => "CallBuiltin",
            CoerceThisNS { .. } => "CoerceThisNS",
            AddEmptyString { .. } => "AddEmptyString",
            AsNumber { .. } => "AsNumber",
            AsNumeric { .. } => "AsNumeric",
            AsInt32 { .. } => "AsInt32",
            ThrowIfEmpty { .. } => "ThrowIfEmpty",
            PrLoad { .. } => "PrLoad",
            PrStore { .. } => "PrStore",
            DirectEval { .. } => "DirectEval",
            Catch => "Catch",
            GetNewTarget => "GetNewTarget",
            IteratorBegin { .. } => "IteratorBegin",
            IteratorNext { .. } => "IteratorNext",
            IteratorClose { .. } => "IteratorClose",
            LoadFromEnvironment { .. } => "LoadFromEnvironment",
            StoreToEnvironment { .. } => "StoreToEnvironment",
            ResumeGenerator => "ResumeGenerator",
            GetArgumentsPropByVal { .. } => "GetArgumentsPropByVal",
            GetArgumentsLength => "GetArgumentsLength",
            DeclareGlobalVar { .. } => "DeclareGlobalVar",
            Debugger => "Debugger",
            TryStart => "TryStart",
            TryEnd => "TryEnd",
            ProfilePoint { .. } => "ProfilePoint",
            ReifyArguments => "ReifyArguments",
        }
    }
}
