//! Invariants the pass must uphold on any well-formed module: no widening,
//! the output discipline, idempotence at the interprocedural fixpoint, and
//! the PHI/return fixpoint equations.

use shrike_ir::instruction::{BinaryOp, InstKind};
use shrike_ir::module::{Module, Terminator, ValueId};
use shrike_ir::types::Type;
use shrike_ir::ModuleBuilder;
use shrike_opt::TypeInference;

/// A module exercising calls, property traffic, frame variables, a loop
/// PHI and multiple returns at once.
fn mixed_module() -> Module {
    let mut b = ModuleBuilder::new();

    let main = b.create_function("main");
    b.mark_global_scope(main);
    let worker = b.create_function("worker");
    let p0 = b.add_param(worker, "n");

    // main: o = {}; o.x = 1; r = worker(o.x); return r
    let entry = b.append_block(main);
    let obj = b.emit(main, entry, InstKind::AllocObject);
    let prop = b.string("x");
    let one = b.number(1.0);
    b.emit(
        main,
        entry,
        InstKind::StoreOwnProperty {
            object: ValueId::Inst(obj),
            property: prop,
            value: one,
        },
    );
    let x = b.emit(
        main,
        entry,
        InstKind::LoadProperty {
            object: ValueId::Inst(obj),
            property: prop,
        },
    );
    let closure = b.emit(main, entry, InstKind::CreateFunction { func: worker });
    let call = b.emit(
        main,
        entry,
        InstKind::Call {
            callee: ValueId::Inst(closure),
            args: vec![ValueId::Inst(x)],
        },
    );
    b.set_terminator(
        main,
        entry,
        Terminator::Return {
            value: ValueId::Inst(call),
        },
    );

    // worker(n): counts up to n through a frame variable and a loop PHI,
    // then returns either the counter or a string.
    let var = b.add_variable(worker, "acc");
    let b0 = b.append_block(worker);
    let b1 = b.append_block(worker);
    let b2 = b.append_block(worker);
    let b3 = b.append_block(worker);
    let b4 = b.append_block(worker);

    let zero = b.number(0.0);
    let step = b.number(1.0);
    let n = b.emit(worker, b0, InstKind::LoadParam { param: p0 });
    b.emit(worker, b0, InstKind::StoreFrame { var, value: zero });
    b.set_terminator(worker, b0, Terminator::Jump { target: b1 });

    let phi = b.emit(
        worker,
        b1,
        InstKind::Phi {
            entries: vec![(zero, b0)],
        },
    );
    let next = b.emit(
        worker,
        b1,
        InstKind::Binary {
            op: BinaryOp::Add,
            lhs: ValueId::Inst(phi),
            rhs: step,
        },
    );
    b.add_phi_entry(phi, next, b1);
    b.emit(
        worker,
        b1,
        InstKind::StoreFrame {
            var,
            value: ValueId::Inst(next),
        },
    );
    let cmp = b.emit(
        worker,
        b1,
        InstKind::Binary {
            op: BinaryOp::LessThan,
            lhs: ValueId::Inst(next),
            rhs: ValueId::Inst(n),
        },
    );
    b.set_terminator(
        worker,
        b1,
        Terminator::CondBranch {
            cond: ValueId::Inst(cmp),
            true_target: b1,
            false_target: b2,
        },
    );

    let acc = b.emit(worker, b2, InstKind::LoadFrame { var });
    let overflowed = b.emit(
        worker,
        b2,
        InstKind::Binary {
            op: BinaryOp::GreaterThan,
            lhs: ValueId::Inst(acc),
            rhs: ValueId::Inst(n),
        },
    );
    b.set_terminator(
        worker,
        b2,
        Terminator::CondBranch {
            cond: ValueId::Inst(overflowed),
            true_target: b3,
            false_target: b4,
        },
    );
    let label = b.string("overflow");
    let picked = b.emit(worker, b3, InstKind::Mov { src: label });
    b.set_terminator(
        worker,
        b3,
        Terminator::Return {
            value: ValueId::Inst(picked),
        },
    );
    b.set_terminator(
        worker,
        b4,
        Terminator::Return {
            value: ValueId::Inst(acc),
        },
    );

    let module = b.build();
    module.verify().expect("fixture must be well-formed");
    module
}

/// Snapshot every annotation in the module.
fn snapshot(module: &Module) -> Vec<(ValueId, Type)> {
    let mut values = Vec::new();
    for f in module.func_ids() {
        for inst in module.inst_order(f) {
            values.push((ValueId::Inst(inst), module.inst_type(inst)));
        }
        let func = module.function(f);
        for &p in &func.params {
            values.push((ValueId::Param(p), module.value_type(p.into())));
        }
        for &v in &func.variables {
            values.push((ValueId::Var(v), module.value_type(v.into())));
        }
        values.push((ValueId::Func(f), module.func_type(f)));
    }
    values
}

#[test]
fn test_no_annotation_widens() {
    let mut module = mixed_module();
    let before = snapshot(&module);

    TypeInference::new().run_on_module(&mut module);

    for (value, pre) in before {
        let post = module.value_type(value);
        assert!(
            post.is_subset_of(pre),
            "{value:?} widened from {pre} to {post}"
        );
    }
}

#[test]
fn test_output_discipline() {
    let mut module = mixed_module();
    TypeInference::new().run_on_module(&mut module);

    module
        .verify_annotations()
        .expect("instructions are NoType iff they have no output");
}

#[test]
fn test_idempotent_at_fixpoint() {
    let mut module = mixed_module();
    let mut pass = TypeInference::new();
    assert!(
        pass.run_to_fixpoint(&mut module, 16),
        "interprocedural fixpoint not reached"
    );

    let settled = snapshot(&module);
    let changed = pass.run_on_module(&mut module);

    assert!(!changed, "a converged module reported changes");
    assert_eq!(snapshot(&module), settled);
}

#[test]
fn test_phi_matches_union_of_inputs() {
    let mut module = mixed_module();
    TypeInference::new().run_on_module(&mut module);

    for f in module.func_ids() {
        for inst in module.inst_order(f) {
            let InstKind::Phi { entries } = module.kind(inst) else {
                continue;
            };
            let mut expected = Type::none();
            for &(value, _) in entries {
                // No nested PHIs in this fixture, so direct inputs suffice.
                expected = expected.union(module.value_type(value));
            }
            assert_eq!(module.inst_type(inst), expected);
        }
    }
}

#[test]
fn test_return_type_covers_every_return() {
    let mut module = mixed_module();
    TypeInference::new().run_on_module(&mut module);

    for f in module.func_ids() {
        let func_ty = module.func_type(f);
        for block in &module.function(f).blocks {
            if let Terminator::Return { value } = block.terminator {
                let returned = module.value_type(value);
                assert!(
                    returned.is_subset_of(func_ty),
                    "{} returns {returned} but is annotated {func_ty}",
                    module.function(f).name
                );
            }
        }
    }
}

#[test]
fn test_second_run_reports_no_change_for_single_function() {
    // A self-contained function converges in one module pass.
    let mut b = ModuleBuilder::new();
    let f = b.create_function("f");
    let entry = b.append_block(f);
    let one = b.number(1.0);
    let two = b.number(2.0);
    let sum = b.emit(
        f,
        entry,
        InstKind::Binary {
            op: BinaryOp::Add,
            lhs: one,
            rhs: two,
        },
    );
    b.set_terminator(
        f,
        entry,
        Terminator::Return {
            value: ValueId::Inst(sum),
        },
    );

    let mut module = b.build();
    let mut pass = TypeInference::new();
    assert!(pass.run_on_module(&mut module));
    assert!(!pass.run_on_module(&mut module));
    assert_eq!(module.inst_type(sum), Type::number());
}
