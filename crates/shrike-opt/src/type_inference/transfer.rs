//! Per-instruction transfer functions.
//!
//! Each rule computes an output type from the (already inferred) operand
//! types. Rules must return NoType exactly for instructions without an
//! output; the dispatcher takes care of change detection.

use tracing::{debug, trace};

use shrike_ir::instruction::{BinaryOp, InstKind, UnaryOp};
use shrike_ir::module::{InstId, Module, ValueId};
use shrike_ir::types::Type;
use shrike_ir::uses::{Use, UseMap};

use crate::call_graph::{CallGraphProvider, ReceiverKind};

use super::TypeInference;

impl TypeInference {
    pub(super) fn dispatch(
        &mut self,
        module: &Module,
        uses: &UseMap,
        cgp: &impl CallGraphProvider,
        inst: InstId,
    ) -> Type {
        match module.kind(inst) {
            InstKind::Phi { .. } => panic!("phis are resolved by infer_phi, not dispatched"),

            InstKind::Unary { op, operand } => infer_unary(module, *op, *operand),
            InstKind::Binary { op, lhs, rhs } => infer_binary(module, *op, *lhs, *rhs),

            InstKind::Mov { src } | InstKind::ImplicitMov { src } => module.value_type(*src),
            InstKind::LoadConst { src } => module.value_type(ValueId::Literal(*src)),
            // The type seeded (or since narrowed) on the parameter itself.
            InstKind::LoadParam { param } => module.value_type(ValueId::Param(*param)),
            InstKind::LoadStack { addr } => module.inst_type(*addr),
            InstKind::LoadFrame { var } => module.value_type(ValueId::Var(*var)),

            InstKind::LoadProperty { property, .. } => {
                self.infer_load_property(module, uses, cgp, inst, *property)
            }
            // Globals are not tracked.
            InstKind::TryLoadGlobalProperty { .. } => Type::any(),
            InstKind::DeleteProperty { .. } => Type::boolean(),

            // A stack slot takes the type of the values stored into it. A
            // slot with no users cannot be inferred, but a live instruction
            // must not carry NoType, so it gets any().
            InstKind::AllocStack => {
                if uses.users(inst).is_empty() {
                    Type::any()
                } else {
                    super::infer_memory_location_type(module, uses, ValueId::Inst(inst))
                }
            }
            InstKind::AllocObject => Type::object(),

            kind @ (InstKind::AllocArray { .. }
            | InstKind::AllocObjectLiteral
            | InstKind::AllocObjectFromBuffer
            | InstKind::GetTemplateObject
            | InstKind::CreateArguments
            | InstKind::CreateRegExp { .. }
            | InstKind::CreateFunction { .. }
            | InstKind::CreateGenerator { .. }
            | InstKind::GetBuiltinClosure { .. }
            | InstKind::GetGlobalObject
            | InstKind::CreateEnvironment
            | InstKind::ResolveEnvironment { .. }
            | InstKind::CoerceThisNS { .. }
            | InstKind::AddEmptyString { .. }
            | InstKind::AsNumber { .. }
            | InstKind::AsNumeric { .. }
            | InstKind::AsInt32 { .. }) => match kind.inherent_type() {
                Some(ty) => ty,
                None => panic!("{} must carry an inherent type", kind.name()),
            },

            InstKind::GetThisNS
            | InstKind::CreateThis { .. }
            | InstKind::GetConstructedObject { .. } => Type::object(),

            InstKind::Call { .. } | InstKind::Construct { .. } => {
                infer_base_call(module, cgp, inst)
            }
            InstKind::CallBuiltin { .. } => Type::any(),

            // Narrowing Empty away could leave NoType behind when the
            // operand is Empty-only (an always-throwing TDZ read), which
            // would break the output discipline; stay pessimistic.
            InstKind::ThrowIfEmpty { checked } => module.value_type(*checked),
            InstKind::PrLoad { checked_type, .. } => *checked_type,

            InstKind::DirectEval { .. }
            | InstKind::Catch
            | InstKind::GetNewTarget
            | InstKind::IteratorBegin { .. }
            | InstKind::IteratorNext { .. }
            | InstKind::IteratorClose { .. }
            | InstKind::LoadFromEnvironment { .. }
            | InstKind::ResumeGenerator
            | InstKind::GetArgumentsPropByVal { .. } => Type::any(),
            InstKind::GetArgumentsLength => Type::number(),

            InstKind::StoreStack { .. }
            | InstKind::StoreFrame { .. }
            | InstKind::StoreProperty { .. }
            | InstKind::StoreOwnProperty { .. }
            | InstKind::StoreGetterSetter { .. }
            | InstKind::StoreToEnvironment { .. }
            | InstKind::PrStore { .. }
            | InstKind::DeclareGlobalVar { .. }
            | InstKind::Debugger
            | InstKind::TryStart
            | InstKind::TryEnd
            | InstKind::ProfilePoint { .. }
            | InstKind::ReifyArguments => Type::none(),
        }
    }

    /// Resolve a property load through the receiver analysis: the union of
    /// every qualifying store's value, or `any()` as soon as anything is
    /// out of sight.
    fn infer_load_property(
        &mut self,
        module: &Module,
        uses: &UseMap,
        cgp: &impl CallGraphProvider,
        inst: InstId,
        property: ValueId,
    ) -> Type {
        if cgp.has_unknown_receivers(inst) {
            trace!("unknown receivers for property load");
            return Type::any();
        }

        let mut ty = Type::none();
        let mut qualifying = 0usize;
        for &receiver in cgp.known_receivers(inst) {
            if cgp.has_unknown_stores(receiver) {
                return Type::any();
            }
            let kind = cgp.receiver_kind(receiver);
            // A property that was never stored as an own property may come
            // from anywhere up the prototype chain.
            if kind == ReceiverKind::Object
                && !is_owned_property(module, uses, receiver, property)
            {
                return Type::any();
            }
            for &store in cgp.known_stores(receiver) {
                let (stored_prop, stored_value) = match module.kind(store) {
                    InstKind::StoreOwnProperty {
                        property, value, ..
                    }
                    | InstKind::StoreProperty {
                        property, value, ..
                    } => (*property, *value),
                    other => panic!("known store is not a property store: {}", other.name()),
                };
                // Array indices are value-level, so every array store
                // qualifies; object stores must name the loaded property.
                if kind == ReceiverKind::Object && stored_prop != property {
                    continue;
                }
                ty = ty.union(module.value_type(stored_value));
                qualifying += 1;
            }
        }

        if qualifying == 0 {
            return Type::any();
        }
        if qualifying == 1 {
            self.unique_loads.insert(inst);
        } else {
            self.unique_loads.remove(&inst);
        }
        ty
    }
}

/// Is `property` written directly onto the allocation as an own property?
fn is_owned_property(
    module: &Module,
    uses: &UseMap,
    receiver: InstId,
    property: ValueId,
) -> bool {
    uses.users(receiver).iter().any(|user| match user {
        Use::Inst(inst) => matches!(
            module.kind(*inst),
            InstKind::StoreOwnProperty { object, property: stored, .. }
                if *object == ValueId::Inst(receiver) && *stored == property
        ),
        Use::Term { .. } => false,
    })
}

/// Union of the known callees' current return annotations; `any()` when
/// callees are unknown or none of them has been inferred yet.
fn infer_base_call(module: &Module, cgp: &impl CallGraphProvider, call: InstId) -> Type {
    if cgp.has_unknown_callees(call) {
        debug!("unknown callees for call");
        return Type::any();
    }
    let callees = cgp.known_callees(call);
    debug!(callees = callees.len(), "propagating callee return types");

    let mut ty = Type::none();
    for &callee in callees {
        ty = ty.union(module.func_type(callee));
    }
    if ty.is_no_type() {
        Type::any()
    } else {
        ty
    }
}

fn infer_unary(module: &Module, op: UnaryOp, operand: ValueId) -> Type {
    match op {
        UnaryOp::Void => Type::undefined(),
        UnaryOp::Typeof => Type::string(),
        UnaryOp::Bang => Type::boolean(),
        UnaryOp::Minus | UnaryOp::Inc | UnaryOp::Dec => {
            infer_unary_arith(module, operand, Type::number())
        }
        UnaryOp::Tilde => infer_unary_arith(module, operand, Type::int32()),
    }
}

/// - Number => the op's number shape
/// - BigInt => BigInt
/// - otherwise => shape|?BigInt; bigint only stays possible when the
///   operand can be one, since nothing converts into bigint implicitly.
fn infer_unary_arith(module: &Module, operand: ValueId, number_result: Type) -> Type {
    let op_ty = module.value_type(operand);
    if op_ty.is_number_type() {
        return number_result;
    }
    if op_ty.is_bigint_type() {
        return Type::bigint();
    }
    let may_be_bigint = if op_ty.can_be_bigint() {
        Type::bigint()
    } else {
        Type::none()
    };
    number_result.union(may_be_bigint)
}

fn infer_binary(module: &Module, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> Type {
    match op {
        // Comparisons may throw or touch memory, but the result is a
        // boolean. NaN included: ECMA-262 says undefined there, every VM
        // says false, and we follow the VMs.
        BinaryOp::Equal
        | BinaryOp::NotEqual
        | BinaryOp::StrictEqual
        | BinaryOp::StrictNotEqual
        | BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual
        | BinaryOp::In
        | BinaryOp::InstanceOf => Type::boolean(),

        BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Exponentiation
        | BinaryOp::LeftShift
        | BinaryOp::RightShift => infer_binary_arith(module, lhs, rhs, Type::number()),
        BinaryOp::Modulo => infer_binary_arith(module, lhs, rhs, Type::int32()),

        BinaryOp::UnsignedRightShift => Type::uint32(),

        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
            infer_binary_arith(module, lhs, rhs, Type::int32())
        }

        BinaryOp::Add => infer_add(module, lhs, rhs),
    }
}

/// - Number op Number => the op's number shape
/// - BigInt op BigInt => BigInt
/// - otherwise => shape|?BigInt; a bigint result needs both operands to
///   possibly be bigints.
fn infer_binary_arith(module: &Module, lhs: ValueId, rhs: ValueId, number_result: Type) -> Type {
    let left = module.value_type(lhs);
    let right = module.value_type(rhs);
    if left.is_number_type() && right.is_number_type() {
        return number_result;
    }
    if left.is_bigint_type() && right.is_bigint_type() {
        return Type::bigint();
    }
    let may_be_bigint = if left.can_be_bigint() && right.can_be_bigint() {
        Type::bigint()
    } else {
        Type::none()
    };
    number_result.union(may_be_bigint)
}

fn infer_add(module: &Module, lhs: ValueId, rhs: ValueId) -> Type {
    let left = module.value_type(lhs);
    let right = module.value_type(rhs);

    // One string operand is enough to force a string result.
    if left.is_string_type() || right.is_string_type() {
        return Type::string();
    }
    if left.is_number_type() && right.is_number_type() {
        return Type::number();
    }
    if left.is_bigint_type() && right.is_bigint_type() {
        return Type::bigint();
    }

    let may_be_bigint = if left.can_be_bigint() && right.can_be_bigint() {
        Type::bigint()
    } else {
        Type::none()
    };
    let numeric = Type::number().union(may_be_bigint);

    // When neither side can be a string, and neither can convert itself
    // into one behind our back, the result must be numeric.
    if left.is_side_effect_free()
        && right.is_side_effect_free()
        && !left.can_be_string()
        && !right.can_be_string()
    {
        return numeric;
    }

    numeric.union(Type::string())
}
