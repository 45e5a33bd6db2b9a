//! Call-graph queries for interprocedural inference.
//!
//! The type-inference pass treats the call graph as an oracle answering a
//! small set of questions: which call sites reach a function, which
//! functions a call can dispatch to, which allocations a property load can
//! observe, and which stores write to such an allocation. Every question
//! may also be answered with "unknown", which the pass translates into
//! `any()`.
//!
//! The analysis proceeds in phases:
//! 1. **Call-site resolution**: find every closure materializing the
//!    function and check that each one is only ever used as a callee.
//! 2. **Callee resolution**: resolve the callee operand of each call in the
//!    function to a closure-creation instruction.
//! 3. **Receiver resolution**: resolve the object operand of each property
//!    load in the function to an object or array allocation.
//! 4. **Store resolution**: collect the property stores reaching each known
//!    receiver, or mark the receiver unknown if it escapes.

use fnv::FnvHashMap;
use tracing::trace;

use shrike_ir::instruction::InstKind;
use shrike_ir::module::{FuncId, InstId, Module, ValueId};
use shrike_ir::uses::{Use, UseMap};

/// What kind of allocation a property-load receiver is. Object stores are
/// matched by property name; array stores contribute their value for any
/// index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiverKind {
    Object,
    Array,
}

/// The oracle interface consumed by the type-inference pass. A provider is
/// scoped to a single function: calls, property loads and receivers are the
/// ones appearing in that function.
pub trait CallGraphProvider {
    fn has_unknown_callsites(&self, func: FuncId) -> bool;
    fn known_callsites(&self, func: FuncId) -> &[InstId];

    fn has_unknown_callees(&self, call: InstId) -> bool;
    fn known_callees(&self, call: InstId) -> &[FuncId];

    fn has_unknown_receivers(&self, load: InstId) -> bool;
    fn known_receivers(&self, load: InstId) -> &[InstId];

    fn has_unknown_stores(&self, receiver: InstId) -> bool;
    fn known_stores(&self, receiver: InstId) -> &[InstId];

    /// The allocation kind of a receiver previously reported by
    /// [`CallGraphProvider::known_receivers`].
    fn receiver_kind(&self, receiver: InstId) -> ReceiverKind;
}

/// A conservative, purely syntactic provider: values are resolved only when
/// the defining instruction is directly visible, and anything that escapes
/// is unknown.
pub struct SimpleCallGraphProvider {
    func: FuncId,
    callsites: Option<Vec<InstId>>,
    callees: FnvHashMap<InstId, Option<Vec<FuncId>>>,
    receivers: FnvHashMap<InstId, Option<Vec<InstId>>>,
    stores: FnvHashMap<InstId, Option<Vec<InstId>>>,
    kinds: FnvHashMap<InstId, ReceiverKind>,
}

impl SimpleCallGraphProvider {
    pub fn for_function(module: &Module, uses: &UseMap, func: FuncId) -> SimpleCallGraphProvider {
        let callsites = resolve_callsites(module, uses, func);
        trace!(
            function = %module.function(func).name,
            callsites = callsites.as_ref().map(Vec::len).unwrap_or(0),
            unknown = callsites.is_none(),
            "resolved call sites"
        );

        let mut callees = FnvHashMap::default();
        let mut receivers = FnvHashMap::default();
        let mut kinds = FnvHashMap::default();
        for inst in module.inst_order(func) {
            match module.kind(inst) {
                InstKind::Call { callee, .. } | InstKind::Construct { callee, .. } => {
                    callees.insert(inst, resolve_callees(module, *callee));
                }
                InstKind::LoadProperty { object, .. } => {
                    let resolved = match object {
                        ValueId::Inst(alloc) => match module.kind(*alloc) {
                            InstKind::AllocObject => {
                                kinds.insert(*alloc, ReceiverKind::Object);
                                Some(vec![*alloc])
                            }
                            InstKind::AllocArray { .. } => {
                                kinds.insert(*alloc, ReceiverKind::Array);
                                Some(vec![*alloc])
                            }
                            _ => None,
                        },
                        _ => None,
                    };
                    receivers.insert(inst, resolved);
                }
                _ => {}
            }
        }

        let mut stores = FnvHashMap::default();
        for resolved in receivers.values().flatten() {
            for &receiver in resolved {
                stores
                    .entry(receiver)
                    .or_insert_with(|| resolve_stores(module, uses, receiver));
            }
        }

        SimpleCallGraphProvider {
            func,
            callsites,
            callees,
            receivers,
            stores,
            kinds,
        }
    }

    /// The function this provider is scoped to.
    pub fn function(&self) -> FuncId {
        self.func
    }
}

/// Find the call sites of `func`, anywhere in the module. Known only when
/// every closure materializing `func` is used exclusively as the callee of
/// a call or construct.
fn resolve_callsites(module: &Module, uses: &UseMap, func: FuncId) -> Option<Vec<InstId>> {
    if module.function(func).is_global_scope {
        // The top level is invoked from outside the module.
        return None;
    }

    let mut sites = Vec::new();
    for f in module.func_ids() {
        for closure in module.inst_order(f) {
            match module.kind(closure) {
                InstKind::CreateFunction { func: target } if *target == func => {}
                // Generator closures reach the inner function through the
                // resume machinery, which we do not track.
                InstKind::CreateGenerator { func: target } if *target == func => return None,
                _ => continue,
            }
            for user in uses.users(closure) {
                let Use::Inst(call) = user else { return None };
                match module.kind(*call) {
                    InstKind::Call { callee, args } | InstKind::Construct { callee, args }
                        if *callee == ValueId::Inst(closure)
                            && !args.contains(&ValueId::Inst(closure)) =>
                    {
                        sites.push(*call);
                    }
                    _ => return None,
                }
            }
        }
    }
    Some(sites)
}

fn resolve_callees(module: &Module, callee: ValueId) -> Option<Vec<FuncId>> {
    match callee {
        ValueId::Inst(closure) => match module.kind(closure) {
            InstKind::CreateFunction { func } => Some(vec![*func]),
            _ => None,
        },
        _ => None,
    }
}

/// Collect the property stores writing to `receiver`. Known only while the
/// allocation is used exclusively by property loads and property stores
/// targeting it; any other use means it escapes.
fn resolve_stores(module: &Module, uses: &UseMap, receiver: InstId) -> Option<Vec<InstId>> {
    let mut out = Vec::new();
    for user in uses.users(receiver) {
        let Use::Inst(inst) = user else { return None };
        match module.kind(*inst) {
            InstKind::StoreOwnProperty { object, value, .. }
            | InstKind::StoreProperty { object, value, .. }
                if *object == ValueId::Inst(receiver) && *value != ValueId::Inst(receiver) =>
            {
                out.push(*inst);
            }
            InstKind::LoadProperty { object, .. } if *object == ValueId::Inst(receiver) => {}
            _ => return None,
        }
    }
    Some(out)
}

impl CallGraphProvider for SimpleCallGraphProvider {
    fn has_unknown_callsites(&self, func: FuncId) -> bool {
        debug_assert_eq!(func, self.func, "provider is scoped to one function");
        self.callsites.is_none()
    }

    fn known_callsites(&self, func: FuncId) -> &[InstId] {
        debug_assert_eq!(func, self.func, "provider is scoped to one function");
        self.callsites.as_deref().unwrap_or(&[])
    }

    fn has_unknown_callees(&self, call: InstId) -> bool {
        self.callees.get(&call).map_or(true, Option::is_none)
    }

    fn known_callees(&self, call: InstId) -> &[FuncId] {
        self.callees
            .get(&call)
            .and_then(Option::as_deref)
            .unwrap_or(&[])
    }

    fn has_unknown_receivers(&self, load: InstId) -> bool {
        self.receivers.get(&load).map_or(true, Option::is_none)
    }

    fn known_receivers(&self, load: InstId) -> &[InstId] {
        self.receivers
            .get(&load)
            .and_then(Option::as_deref)
            .unwrap_or(&[])
    }

    fn has_unknown_stores(&self, receiver: InstId) -> bool {
        self.stores.get(&receiver).map_or(true, Option::is_none)
    }

    fn known_stores(&self, receiver: InstId) -> &[InstId] {
        self.stores
            .get(&receiver)
            .and_then(Option::as_deref)
            .unwrap_or(&[])
    }

    fn receiver_kind(&self, receiver: InstId) -> ReceiverKind {
        match self.kinds.get(&receiver) {
            Some(kind) => *kind,
            None => panic!("{receiver:?} was not reported as a receiver by this provider"),
        }
    }
}
