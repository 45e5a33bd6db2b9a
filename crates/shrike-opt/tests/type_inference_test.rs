//! End-to-end tests for the type-inference pass over hand-built IR.

use shrike_ir::instruction::{BinaryOp, InstKind, UnaryOp};
use shrike_ir::module::{FuncId, InstId, Module, Terminator, ValueId};
use shrike_ir::types::Type;
use shrike_ir::ModuleBuilder;
use shrike_opt::TypeInference;

struct BinOpFixture {
    module: Module,
    callee: FuncId,
    result: InstId,
}

/// A global `main` invoking `binop(a, b) { return a <op> b; }` once, with
/// the actuals produced by `make_args`. Parameter types flow from the
/// actuals at the call site.
fn called_binary_op(
    op: BinaryOp,
    make_args: impl FnOnce(&mut ModuleBuilder) -> Vec<ValueId>,
) -> BinOpFixture {
    let mut b = ModuleBuilder::new();
    let main = b.create_function("main");
    b.mark_global_scope(main);
    let callee = b.create_function("binop");
    let p0 = b.add_param(callee, "a");
    let p1 = b.add_param(callee, "b");

    let entry = b.append_block(main);
    let closure = b.emit(main, entry, InstKind::CreateFunction { func: callee });
    let args = make_args(&mut b);
    let call = b.emit(
        main,
        entry,
        InstKind::Call {
            callee: ValueId::Inst(closure),
            args,
        },
    );
    b.set_terminator(
        main,
        entry,
        Terminator::Return {
            value: ValueId::Inst(call),
        },
    );

    let body = b.append_block(callee);
    let lhs = b.emit(callee, body, InstKind::LoadParam { param: p0 });
    let rhs = b.emit(callee, body, InstKind::LoadParam { param: p1 });
    let result = b.emit(
        callee,
        body,
        InstKind::Binary {
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
        },
    );
    b.set_terminator(
        callee,
        body,
        Terminator::Return {
            value: ValueId::Inst(result),
        },
    );

    let module = b.build();
    module.verify().expect("fixture must be well-formed");
    BinOpFixture {
        module,
        callee,
        result,
    }
}

/// A lone `binop(a, b) { return a <op> b; }` with no visible callers, so
/// both parameters become `any`.
fn standalone_binary_op(op: BinaryOp) -> BinOpFixture {
    let mut b = ModuleBuilder::new();
    let callee = b.create_function("binop");
    let p0 = b.add_param(callee, "a");
    let p1 = b.add_param(callee, "b");

    let body = b.append_block(callee);
    let lhs = b.emit(callee, body, InstKind::LoadParam { param: p0 });
    let rhs = b.emit(callee, body, InstKind::LoadParam { param: p1 });
    let result = b.emit(
        callee,
        body,
        InstKind::Binary {
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
        },
    );
    b.set_terminator(
        callee,
        body,
        Terminator::Return {
            value: ValueId::Inst(result),
        },
    );

    let module = b.build();
    module.verify().expect("fixture must be well-formed");
    BinOpFixture {
        module,
        callee,
        result,
    }
}

#[test]
fn test_numeric_subtraction() {
    let mut fx = called_binary_op(BinaryOp::Subtract, |b| {
        vec![b.number(1.0), b.number(2.0)]
    });
    let mut pass = TypeInference::new();
    pass.run_on_module(&mut fx.module);

    assert_eq!(fx.module.inst_type(fx.result), Type::number());
    assert_eq!(fx.module.func_type(fx.callee), Type::number());
    assert!(pass.stats().num_type_inferred > 0);
}

#[test]
fn test_add_with_string_operand() {
    let mut fx = called_binary_op(BinaryOp::Add, |b| {
        vec![b.number(1.0), b.string("one")]
    });
    TypeInference::new().run_on_module(&mut fx.module);

    assert_eq!(fx.module.inst_type(fx.result), Type::string());
    assert_eq!(fx.module.func_type(fx.callee), Type::string());
}

#[test]
fn test_bigint_multiplication_narrows() {
    let mut fx = called_binary_op(BinaryOp::Multiply, |b| {
        vec![b.bigint("3"), b.bigint("7")]
    });
    TypeInference::new().run_on_module(&mut fx.module);

    assert_eq!(fx.module.inst_type(fx.result), Type::bigint());
}

#[test]
fn test_add_of_unknown_operands() {
    let mut fx = standalone_binary_op(BinaryOp::Add);
    TypeInference::new().run_on_module(&mut fx.module);

    let expected = Type::number().union(Type::bigint()).union(Type::string());
    assert_eq!(fx.module.inst_type(fx.result), expected);
}

#[test]
fn test_missing_actual_contributes_undefined() {
    // binop is called with a single argument; the second formal sees
    // `undefined`.
    let mut fx = called_binary_op(BinaryOp::Subtract, |b| vec![b.number(1.0)]);
    TypeInference::new().run_on_module(&mut fx.module);

    let p1 = fx.module.function(fx.callee).params[1];
    assert_eq!(fx.module.value_type(p1.into()), Type::undefined());
}

#[test]
fn test_loop_phi_converges() {
    // B0 jumps into a loop whose PHI merges a number literal with the
    // loop increment feeding back from B1.
    let mut b = ModuleBuilder::new();
    let f = b.create_function("count");
    let b0 = b.append_block(f);
    let b1 = b.append_block(f);
    let b2 = b.append_block(f);

    let zero = b.number(0.0);
    let one = b.number(1.0);
    let ten = b.number(10.0);

    b.set_terminator(f, b0, Terminator::Jump { target: b1 });

    let phi = b.emit(
        f,
        b1,
        InstKind::Phi {
            entries: vec![(zero, b0)],
        },
    );
    let next = b.emit(
        f,
        b1,
        InstKind::Binary {
            op: BinaryOp::Add,
            lhs: ValueId::Inst(phi),
            rhs: one,
        },
    );
    b.add_phi_entry(phi, next, b1);
    let cmp = b.emit(
        f,
        b1,
        InstKind::Binary {
            op: BinaryOp::LessThan,
            lhs: ValueId::Inst(next),
            rhs: ten,
        },
    );
    b.set_terminator(
        f,
        b1,
        Terminator::CondBranch {
            cond: ValueId::Inst(cmp),
            true_target: b1,
            false_target: b2,
        },
    );
    b.set_terminator(
        f,
        b2,
        Terminator::Return {
            value: ValueId::Inst(next),
        },
    );

    let mut module = b.build();
    module.verify().expect("fixture must be well-formed");

    let mut pass = TypeInference::new();
    pass.run_on_module(&mut module);

    assert_eq!(module.inst_type(phi), Type::number());
    assert_eq!(module.inst_type(next), Type::number());
    assert_eq!(module.func_type(f), Type::number());
    assert!(
        pass.stats().max_fixpoint_iterations <= 3,
        "loop PHI took {} sweeps",
        pass.stats().max_fixpoint_iterations
    );
}

#[test]
fn test_property_load_with_unique_store() {
    let mut b = ModuleBuilder::new();
    let f = b.create_function("f");
    let entry = b.append_block(f);

    let obj = b.emit(f, entry, InstKind::AllocObject);
    let prop = b.string("x");
    let forty_two = b.number(42.0);
    b.emit(
        f,
        entry,
        InstKind::StoreOwnProperty {
            object: ValueId::Inst(obj),
            property: prop,
            value: forty_two,
        },
    );
    let load = b.emit(
        f,
        entry,
        InstKind::LoadProperty {
            object: ValueId::Inst(obj),
            property: prop,
        },
    );
    b.set_terminator(
        f,
        entry,
        Terminator::Return {
            value: ValueId::Inst(load),
        },
    );

    let mut module = b.build();
    module.verify().expect("fixture must be well-formed");

    let mut pass = TypeInference::new();
    pass.run_on_module(&mut module);

    assert_eq!(module.inst_type(load), Type::number());
    assert_eq!(pass.stats().unique_property_value, 1);
}

#[test]
fn test_property_load_unions_both_stores() {
    let mut b = ModuleBuilder::new();
    let f = b.create_function("f");
    let entry = b.append_block(f);

    let obj = b.emit(f, entry, InstKind::AllocObject);
    let prop = b.string("x");
    let num = b.number(1.0);
    let s = b.string("s");
    b.emit(
        f,
        entry,
        InstKind::StoreOwnProperty {
            object: ValueId::Inst(obj),
            property: prop,
            value: num,
        },
    );
    b.emit(
        f,
        entry,
        InstKind::StoreProperty {
            object: ValueId::Inst(obj),
            property: prop,
            value: s,
        },
    );
    let load = b.emit(
        f,
        entry,
        InstKind::LoadProperty {
            object: ValueId::Inst(obj),
            property: prop,
        },
    );
    b.set_terminator(
        f,
        entry,
        Terminator::Return {
            value: ValueId::Inst(load),
        },
    );

    let mut module = b.build();
    let mut pass = TypeInference::new();
    pass.run_on_module(&mut module);

    assert_eq!(
        module.inst_type(load),
        Type::number().union(Type::string())
    );
    assert_eq!(pass.stats().unique_property_value, 0);
}

#[test]
fn test_array_stores_qualify_regardless_of_index() {
    let mut b = ModuleBuilder::new();
    let f = b.create_function("f");
    let entry = b.append_block(f);

    let arr = b.emit(f, entry, InstKind::AllocArray { size: 2 });
    let idx0 = b.number(0.0);
    let idx1 = b.number(1.0);
    let num = b.number(3.0);
    let s = b.string("s");
    b.emit(
        f,
        entry,
        InstKind::StoreProperty {
            object: ValueId::Inst(arr),
            property: idx0,
            value: num,
        },
    );
    b.emit(
        f,
        entry,
        InstKind::StoreProperty {
            object: ValueId::Inst(arr),
            property: idx1,
            value: s,
        },
    );
    // Loads index 0 but still observes both stored values.
    let load = b.emit(
        f,
        entry,
        InstKind::LoadProperty {
            object: ValueId::Inst(arr),
            property: idx0,
        },
    );
    b.set_terminator(
        f,
        entry,
        Terminator::Return {
            value: ValueId::Inst(load),
        },
    );

    let mut module = b.build();
    TypeInference::new().run_on_module(&mut module);

    assert_eq!(
        module.inst_type(load),
        Type::number().union(Type::string())
    );
}

#[test]
fn test_property_not_owned_is_any() {
    let mut b = ModuleBuilder::new();
    let f = b.create_function("f");
    let entry = b.append_block(f);

    let obj = b.emit(f, entry, InstKind::AllocObject);
    let stored = b.string("x");
    let loaded = b.string("y");
    let num = b.number(1.0);
    b.emit(
        f,
        entry,
        InstKind::StoreOwnProperty {
            object: ValueId::Inst(obj),
            property: stored,
            value: num,
        },
    );
    let load = b.emit(
        f,
        entry,
        InstKind::LoadProperty {
            object: ValueId::Inst(obj),
            property: loaded,
        },
    );
    b.set_terminator(
        f,
        entry,
        Terminator::Return {
            value: ValueId::Inst(load),
        },
    );

    let mut module = b.build();
    TypeInference::new().run_on_module(&mut module);

    assert!(module.inst_type(load).is_any_type());
}

#[test]
fn test_monotonicity_guard_clamps_to_pre_pass() {
    // Inference alone would say number|bigint|string for an unknown `+`,
    // but the pre-pass annotation promises number; the guard intersects.
    let mut b = ModuleBuilder::new();
    let callee = b.create_function("binop");
    let p0 = b.add_param(callee, "a");
    let p1 = b.add_param(callee, "b");

    let body = b.append_block(callee);
    let lhs = b.emit(callee, body, InstKind::LoadParam { param: p0 });
    let rhs = b.emit(callee, body, InstKind::LoadParam { param: p1 });
    let result = b.emit(
        callee,
        body,
        InstKind::Binary {
            op: BinaryOp::Add,
            lhs: lhs.into(),
            rhs: rhs.into(),
        },
    );
    b.set_terminator(
        callee,
        body,
        Terminator::Return {
            value: ValueId::Inst(result),
        },
    );
    b.set_type(result, Type::number());

    let mut module = b.build();
    TypeInference::new().run_on_module(&mut module);

    assert_eq!(module.inst_type(result), Type::number());
}

#[test]
fn test_variable_type_is_union_of_stores() {
    let mut b = ModuleBuilder::new();
    let f = b.create_function("f");
    let var = b.add_variable(f, "x");
    let b0 = b.append_block(f);
    let b1 = b.append_block(f);
    let b2 = b.append_block(f);

    let flag = b.bool(true);
    let num = b.number(1.0);
    let s = b.string("s");

    b.emit(f, b0, InstKind::StoreFrame { var, value: num });
    b.set_terminator(
        f,
        b0,
        Terminator::CondBranch {
            cond: flag,
            true_target: b1,
            false_target: b2,
        },
    );
    b.emit(f, b1, InstKind::StoreFrame { var, value: s });
    b.set_terminator(f, b1, Terminator::Jump { target: b2 });
    let load = b.emit(f, b2, InstKind::LoadFrame { var });
    b.set_terminator(
        f,
        b2,
        Terminator::Return {
            value: ValueId::Inst(load),
        },
    );

    let mut module = b.build();
    TypeInference::new().run_on_module(&mut module);

    let expected = Type::number().union(Type::string());
    assert_eq!(module.value_type(var.into()), expected);
    assert_eq!(module.inst_type(load), expected);
}

#[test]
fn test_stack_slot_type_is_union_of_stores() {
    let mut b = ModuleBuilder::new();
    let f = b.create_function("f");
    let entry = b.append_block(f);

    let slot = b.emit(f, entry, InstKind::AllocStack);
    let num = b.number(1.0);
    b.emit(
        f,
        entry,
        InstKind::StoreStack {
            addr: slot,
            value: num,
        },
    );
    let load = b.emit(f, entry, InstKind::LoadStack { addr: slot });
    b.set_terminator(
        f,
        entry,
        Terminator::Return {
            value: ValueId::Inst(load),
        },
    );

    let mut module = b.build();
    TypeInference::new().run_on_module(&mut module);

    assert_eq!(module.inst_type(slot), Type::number());
    assert_eq!(module.inst_type(load), Type::number());
}

#[test]
fn test_unused_stack_slot_is_any() {
    let mut b = ModuleBuilder::new();
    let f = b.create_function("f");
    let entry = b.append_block(f);

    let slot = b.emit(f, entry, InstKind::AllocStack);
    let undef = b.undefined();
    b.set_terminator(f, entry, Terminator::Return { value: undef });

    let mut module = b.build();
    TypeInference::new().run_on_module(&mut module);

    assert!(module.inst_type(slot).is_any_type());
}

#[test]
fn test_call_return_type_propagates_interprocedurally() {
    let mut fx = called_binary_op(BinaryOp::Subtract, |b| {
        vec![b.number(1.0), b.number(2.0)]
    });
    let mut pass = TypeInference::new();
    assert!(pass.run_to_fixpoint(&mut fx.module, 10));

    // main's call instruction has picked up binop's inferred return type.
    let main = fx
        .module
        .func_ids()
        .find(|&f| fx.module.function(f).name == "main")
        .unwrap();
    let call = fx
        .module
        .inst_order(main)
        .into_iter()
        .find(|&i| matches!(fx.module.kind(i), InstKind::Call { .. }))
        .unwrap();
    assert_eq!(fx.module.inst_type(call), Type::number());
}

#[test]
fn test_generator_inner_function_returns_any() {
    let mut b = ModuleBuilder::new();
    let f = b.create_function("gen_inner");
    b.mark_generator_inner(f);
    let entry = b.append_block(f);
    let num = b.number(1.0);
    b.set_terminator(f, entry, Terminator::Return { value: num });

    let mut module = b.build();
    TypeInference::new().run_on_module(&mut module);

    assert!(module.func_type(f).is_any_type());
}

#[test]
fn test_misc_transfer_rules() {
    let mut b = ModuleBuilder::new();
    let f = b.create_function("f");
    let entry = b.append_block(f);

    let s = b.string("s");
    let not = b.emit(
        f,
        entry,
        InstKind::Unary {
            op: UnaryOp::Bang,
            operand: s,
        },
    );
    let type_of = b.emit(
        f,
        entry,
        InstKind::Unary {
            op: UnaryOp::Typeof,
            operand: ValueId::Inst(not),
        },
    );
    let deleted = b.emit(
        f,
        entry,
        InstKind::DeleteProperty {
            object: ValueId::Inst(type_of),
            property: s,
        },
    );
    let args_len = b.emit(f, entry, InstKind::GetArgumentsLength);
    let catch = b.emit(f, entry, InstKind::Catch);
    let checked = b.emit(f, entry, InstKind::ThrowIfEmpty { checked: s });
    let pr = b.emit(
        f,
        entry,
        InstKind::PrLoad {
            object: ValueId::Inst(catch),
            index: 0,
            checked_type: Type::int32(),
        },
    );
    b.set_terminator(
        f,
        entry,
        Terminator::Return {
            value: ValueId::Inst(pr),
        },
    );

    let mut module = b.build();
    TypeInference::new().run_on_module(&mut module);

    assert_eq!(module.inst_type(not), Type::boolean());
    assert_eq!(module.inst_type(type_of), Type::string());
    assert_eq!(module.inst_type(deleted), Type::boolean());
    assert_eq!(module.inst_type(args_len), Type::number());
    assert!(module.inst_type(catch).is_any_type());
    // ThrowIfEmpty deliberately keeps its operand's type.
    assert_eq!(module.inst_type(checked), Type::string());
    assert_eq!(module.inst_type(pr), Type::int32());
}
