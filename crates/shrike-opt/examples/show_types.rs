//! Demo: show the annotations produced by type inference.

use shrike_ir::instruction::{BinaryOp, InstKind};
use shrike_ir::module::{Terminator, ValueId};
use shrike_ir::ModuleBuilder;
use shrike_opt::TypeInference;

fn main() -> anyhow::Result<()> {
    // Roughly:
    //
    //   function add(a, b) { return a + b; }
    //   add(1, 2);
    //   add(3, "four");
    let mut b = ModuleBuilder::new();

    let main_fn = b.create_function("main");
    b.mark_global_scope(main_fn);
    let add_fn = b.create_function("add");
    let p0 = b.add_param(add_fn, "a");
    let p1 = b.add_param(add_fn, "b");

    let entry = b.append_block(main_fn);
    let closure = b.emit(main_fn, entry, InstKind::CreateFunction { func: add_fn });
    let one = b.number(1.0);
    let two = b.number(2.0);
    let three = b.number(3.0);
    let four = b.string("four");
    let first = b.emit(
        main_fn,
        entry,
        InstKind::Call {
            callee: ValueId::Inst(closure),
            args: vec![one, two],
        },
    );
    let _second = b.emit(
        main_fn,
        entry,
        InstKind::Call {
            callee: ValueId::Inst(closure),
            args: vec![three, four],
        },
    );
    b.set_terminator(
        main_fn,
        entry,
        Terminator::Return {
            value: ValueId::Inst(first),
        },
    );

    let add_entry = b.append_block(add_fn);
    let a = b.emit(add_fn, add_entry, InstKind::LoadParam { param: p0 });
    let b_val = b.emit(add_fn, add_entry, InstKind::LoadParam { param: p1 });
    let sum = b.emit(
        add_fn,
        add_entry,
        InstKind::Binary {
            op: BinaryOp::Add,
            lhs: ValueId::Inst(a),
            rhs: ValueId::Inst(b_val),
        },
    );
    b.set_terminator(
        add_fn,
        add_entry,
        Terminator::Return {
            value: ValueId::Inst(sum),
        },
    );

    let mut module = b.build();
    module.verify()?;

    let mut pass = TypeInference::new();
    pass.run_to_fixpoint(&mut module, 10);

    println!("=== Type Inference Results ===\n");
    for f in module.func_ids() {
        let func = module.function(f);
        println!("Function: {}", func.name);
        println!("{}", "-".repeat(40));
        for &p in &func.params {
            println!("  param {}: {}", module.param_name(p), module.value_type(p.into()));
        }
        for (bi, block) in func.blocks.iter().enumerate() {
            println!("  block {}:", bi);
            for &i in &block.insts {
                println!("    {:<24} {}", module.kind(i).name(), module.inst_type(i));
            }
        }
        println!("  return type: {}\n", module.func_type(f));
    }
    println!("stats: {}", serde_json::to_string_pretty(pass.stats())?);

    Ok(())
}
