//! Type inference over the SSA IR.
//!
//! The pass decorates every value in a module (instruction results,
//! parameters, frame variables, and each function's return channel) with a
//! conservative type from the tag-set lattice. Downstream passes use the
//! annotations to pick specialized operations and drop runtime checks.
//!
//! Per function the pass works in four steps:
//! 1. **Clear**: record every pre-pass annotation, then reset instructions
//!    to their inherent type (or NoType) and everything else to NoType, so
//!    no stale looseness from earlier pipeline states survives.
//! 2. **Seed parameters**: when every call site is known, each formal gets
//!    the union of the actuals passed for it (missing actuals contribute
//!    `undefined`); otherwise formals are `any()`.
//! 3. **Iterate**: sweep all instructions in program order, then the return
//!    channel, then the frame variables, until a full sweep changes
//!    nothing. PHIs are resolved over their transitive non-PHI inputs so a
//!    cyclic merge cannot deadlock on its own pending type.
//! 4. **Guard**: intersect every annotation with its pre-pass value. The
//!    pass may only narrow; doing this once at the end (rather than inside
//!    the loop) keeps the fixpoint from oscillating around the envelope.
//!
//! Function order within the module is arbitrary; calls read whatever their
//! callees are currently annotated with, so callers wanting the full
//! interprocedural fixpoint re-run the module pass until it reports no
//! change (see [`TypeInference::run_to_fixpoint`]).

mod transfer;

use fnv::{FnvHashMap, FnvHashSet};
use tracing::{debug, trace};

use shrike_ir::instruction::InstKind;
use shrike_ir::module::{FuncId, InstId, Module, Terminator, ValueId};
use shrike_ir::types::Type;
use shrike_ir::uses::{Use, UseMap};

use crate::call_graph::{CallGraphProvider, SimpleCallGraphProvider};
use crate::stats::TypeInferenceStats;

/// Bound on local fixpoint sweeps. Well-formed IR converges long before
/// this; malformed IR degrades to a conservative result instead of hanging.
const MAX_ITERATIONS: usize = 1000;

/// The type-inference pass. One instance may be reused across modules; the
/// statistics accumulate.
pub struct TypeInference {
    stats: TypeInferenceStats,
    /// Annotations as they were before the pass, for the current function.
    pre_pass: FnvHashMap<ValueId, Type>,
    /// Property loads whose latest inference saw exactly one qualifying
    /// store, drained into the statistics per function.
    unique_loads: FnvHashSet<InstId>,
}

impl Default for TypeInference {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInference {
    pub fn new() -> TypeInference {
        TypeInference {
            stats: TypeInferenceStats::default(),
            pre_pass: FnvHashMap::default(),
            unique_loads: FnvHashSet::default(),
        }
    }

    pub fn stats(&self) -> &TypeInferenceStats {
        &self.stats
    }

    /// Run type inference on every function in the module. Returns whether
    /// any annotation ended up different from its pre-pass value.
    pub fn run_on_module(&mut self, module: &mut Module) -> bool {
        debug!("start type inference on module");
        let uses = UseMap::build(module);
        let funcs: Vec<FuncId> = module.func_ids().collect();
        let mut changed = false;
        for func in funcs {
            let cgp = SimpleCallGraphProvider::for_function(module, &uses, func);
            changed |= self.run_on_function(module, &uses, &cgp, func);
        }
        changed
    }

    /// Re-run the module pass until nothing moves, letting interprocedural
    /// information propagate between functions. Returns `true` when a run
    /// reported no change within `max_passes`.
    pub fn run_to_fixpoint(&mut self, module: &mut Module, max_passes: usize) -> bool {
        for _ in 0..max_passes {
            if !self.run_on_module(module) {
                return true;
            }
        }
        false
    }

    fn run_on_function(
        &mut self,
        module: &mut Module,
        uses: &UseMap,
        cgp: &impl CallGraphProvider,
        func: FuncId,
    ) -> bool {
        debug!(function = %module.function(func).name, "start type inference");

        self.pre_pass.clear();
        self.unique_loads.clear();
        self.clear_types_in_function(module, func);

        // Parameter types depend on call sites in other functions, which
        // the local loop cannot change; seed them once up front.
        self.infer_params(module, cgp, func);

        let order = module.inst_order(func);
        let variables = module.function(func).variables.clone();

        // Instruction types feed variable types, typed variables feed the
        // loads reading them; iterate the three inferences to convergence.
        let mut iterations = 0;
        loop {
            iterations += 1;
            let mut local_changed = false;
            for &inst in &order {
                local_changed |= self.infer_instruction(module, uses, cgp, inst);
            }
            local_changed |= infer_function_return_type(module, func);
            for &var in &variables {
                local_changed |= infer_memory_type(module, uses, ValueId::Var(var));
            }
            if !local_changed {
                break;
            }
            if iterations >= MAX_ITERATIONS {
                debug!(
                    function = %module.function(func).name,
                    "fixpoint iteration bound hit"
                );
                break;
            }
        }
        self.stats.max_fixpoint_iterations = self.stats.max_fixpoint_iterations.max(iterations);

        // The monotonicity guard: no annotation may end up wider than it
        // started. Intersecting inside the loop instead could oscillate, so
        // it happens once, here.
        let mut changed = false;
        for &inst in &order {
            if self.check_and_set_pre_pass_type(module, ValueId::Inst(inst)) {
                self.stats.num_type_inferred += 1;
                changed = true;
            }
        }
        changed |= self.check_and_set_pre_pass_type(module, ValueId::Func(func));
        let params = module.function(func).params.clone();
        for param in params {
            changed |= self.check_and_set_pre_pass_type(module, ValueId::Param(param));
        }
        for &var in &variables {
            changed |= self.check_and_set_pre_pass_type(module, ValueId::Var(var));
        }

        self.stats.unique_property_value += self.unique_loads.len();

        if cfg!(debug_assertions) {
            for &inst in &order {
                debug_assert!(
                    module.inst_type(inst).is_no_type() != module.kind(inst).has_output(),
                    "instructions are NoType iff they have no output: {}",
                    module.kind(inst).name()
                );
            }
        }

        changed
    }

    /// Record every annotation in the function and reset it: instructions
    /// fall back to their inherent type (or NoType), parameters, variables
    /// and the return channel to NoType.
    fn clear_types_in_function(&mut self, module: &mut Module, func: FuncId) {
        for inst in module.inst_order(func) {
            self.pre_pass
                .insert(ValueId::Inst(inst), module.inst_type(inst));
            let cleared = module.kind(inst).inherent_type().unwrap_or(Type::none());
            module.set_inst_type(inst, cleared);
        }
        let function = module.function(func);
        let params = function.params.clone();
        let variables = function.variables.clone();
        for param in params {
            let value = ValueId::Param(param);
            self.pre_pass.insert(value, module.value_type(value));
            module.set_value_type(value, Type::none());
        }
        for var in variables {
            let value = ValueId::Var(var);
            self.pre_pass.insert(value, module.value_type(value));
            module.set_value_type(value, Type::none());
        }
        self.pre_pass
            .insert(ValueId::Func(func), module.func_type(func));
        module.set_func_type(func, Type::none());
    }

    /// Propagate actuals to formals when the full set of call sites is
    /// known; otherwise every formal becomes `any()`.
    fn infer_params(&self, module: &mut Module, cgp: &impl CallGraphProvider, func: FuncId) {
        let params = module.function(func).params.clone();
        if cgp.has_unknown_callsites(func) {
            debug!(
                function = %module.function(func).name,
                "unknown call sites, parameters become any"
            );
            for param in params {
                module.set_value_type(ValueId::Param(param), Type::any());
            }
            return;
        }

        let callsites = cgp.known_callsites(func).to_vec();
        debug!(
            function = %module.function(func).name,
            callsites = callsites.len(),
            "propagating actuals to formals"
        );
        for (index, param) in params.into_iter().enumerate() {
            let mut ty = Type::none();
            let mut first = true;
            for &site in &callsites {
                let arg_ty = call_argument_type(module, site, index);
                if first {
                    ty = arg_ty;
                    first = false;
                } else {
                    ty = ty.union(arg_ty);
                }
            }
            if first {
                // No call sites at all: nothing to learn from.
                module.set_value_type(ValueId::Param(param), Type::any());
            } else {
                trace!(param = module.param_name(param), %ty, "parameter type");
                module.set_value_type(ValueId::Param(param), ty);
            }
        }
    }

    /// Infer one instruction. Returns true when another sweep is needed:
    /// either the type changed, or an operand is still untyped and the
    /// result could not be computed yet.
    fn infer_instruction(
        &mut self,
        module: &mut Module,
        uses: &UseMap,
        cgp: &impl CallGraphProvider,
        inst: InstId,
    ) -> bool {
        // PHIs may legitimately see NoType operands mid-iteration (a loop
        // feeds the PHI its own downstream value), so they bypass the
        // operand check below and resolve over their non-PHI inputs.
        if matches!(module.kind(inst), InstKind::Phi { .. }) {
            return infer_phi(module, inst);
        }

        for op in module.kind(inst).operands() {
            if module.value_type(op).is_no_type() {
                trace!(inst = module.kind(inst).name(), "operand not yet inferred");
                return true;
            }
        }

        let original = module.inst_type(inst);
        let inferred = self.dispatch(module, uses, cgp, inst);
        if inferred == original {
            return false;
        }
        trace!(
            inst = module.kind(inst).name(),
            from = %original,
            to = %inferred,
            "inferred"
        );
        module.set_inst_type(inst, inferred);
        true
    }

    /// Intersect a value's annotation with its pre-pass type. Returns
    /// whether the final annotation differs from the pre-pass one.
    fn check_and_set_pre_pass_type(&mut self, module: &mut Module, value: ValueId) -> bool {
        let Some(&pre) = self.pre_pass.get(&value) else {
            return false;
        };
        let current = module.value_type(value);
        if current == pre {
            return false;
        }
        let narrowed = pre.intersect(current);
        trace!(from = %current, to = %narrowed, "narrowing to pre-pass envelope");
        module.set_value_type(value, narrowed);
        narrowed != pre
    }
}

/// Resolve a PHI over the transitive non-PHI inputs of its PHI tree.
/// Returns true when the type changed or when an input is still untyped
/// (another sweep may tighten the result).
fn infer_phi(module: &mut Module, phi: InstId) -> bool {
    let num_entries = match module.kind(phi) {
        InstKind::Phi { entries } => entries.len(),
        other => panic!("infer_phi on {}", other.name()),
    };
    if num_entries == 0 {
        return false;
    }

    let mut visited = FnvHashSet::default();
    let mut inputs = FnvHashSet::default();
    collect_phi_inputs(module, &mut visited, &mut inputs, phi);

    let original = module.inst_type(phi);
    let mut new_ty = Type::none();
    let mut unresolved = false;
    for &input in &inputs {
        let ty = module.value_type(input);
        if ty.is_no_type() {
            unresolved = true;
        }
        new_ty = new_ty.union(ty);
    }

    module.set_inst_type(phi, new_ty);
    new_ty != original || unresolved
}

/// Collect all non-PHI values feeding a tree of PHIs. The visited set
/// terminates PHI cycles.
fn collect_phi_inputs(
    module: &Module,
    visited: &mut FnvHashSet<InstId>,
    inputs: &mut FnvHashSet<ValueId>,
    phi: InstId,
) {
    if !visited.insert(phi) {
        return;
    }
    let InstKind::Phi { entries } = module.kind(phi) else {
        panic!("collect_phi_inputs on a non-PHI");
    };
    for &(value, _) in entries {
        match value {
            ValueId::Inst(inner) if matches!(module.kind(inner), InstKind::Phi { .. }) => {
                collect_phi_inputs(module, visited, inputs, inner);
            }
            _ => {
                inputs.insert(value);
            }
        }
    }
}

/// The type of a memory slot (frame variable or stack allocation): the
/// union of every value stored into it. Any user other than a plain load
/// or store defeats the analysis.
fn infer_memory_location_type(module: &Module, uses: &UseMap, slot: ValueId) -> Type {
    let mut ty = Type::none();
    for user in uses.users(slot) {
        let stored = match user {
            Use::Inst(inst) => match module.kind(*inst) {
                InstKind::StoreFrame { var, value } if ValueId::Var(*var) == slot => *value,
                InstKind::StoreStack { addr, value } if ValueId::Inst(*addr) == slot => *value,
                // Loads do not change the type of the location.
                InstKind::LoadFrame { .. } | InstKind::LoadStack { .. } => continue,
                _ => return Type::any(),
            },
            // The address escaped into a terminator.
            Use::Term { .. } => return Type::any(),
        };
        ty = ty.union(module.value_type(stored));
    }
    ty
}

/// Re-infer a memory slot's annotation. Returns true when it changed.
fn infer_memory_type(module: &mut Module, uses: &UseMap, slot: ValueId) -> bool {
    let ty = infer_memory_location_type(module, uses, slot);
    if ty != module.value_type(slot) {
        module.set_value_type(slot, ty);
        return true;
    }
    false
}

/// Union the types returned by the function's `Return` terminators into its
/// return channel. Generator-inner functions may be resumed with
/// `.return()` and any value, so they are unconditionally `any()`.
fn infer_function_return_type(module: &mut Module, func: FuncId) -> bool {
    let original = module.func_type(func);
    let new_ty = if module.function(func).is_generator_inner {
        Type::any()
    } else {
        let mut ty = Type::none();
        for block in &module.function(func).blocks {
            if let Terminator::Return { value } = block.terminator {
                ty = ty.union(module.value_type(value));
            }
        }
        ty
    };
    if new_ty != original {
        module.set_func_type(func, new_ty);
        return true;
    }
    false
}

/// The type of the `index`-th actual at a call site; absent actuals default
/// to `undefined`.
fn call_argument_type(module: &Module, call: InstId, index: usize) -> Type {
    match module.kind(call) {
        InstKind::Call { args, .. } | InstKind::Construct { args, .. } => args
            .get(index)
            .map(|&arg| module.value_type(arg))
            .unwrap_or(Type::undefined()),
        other => panic!("call site is not a call: {}", other.name()),
    }
}
