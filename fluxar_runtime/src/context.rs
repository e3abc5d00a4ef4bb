use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::{Rc, Weak},
};

use log::debug;

use crate::value::Value;

/// The immutable root scope holding the built-ins and constants
pub type Globals = HashMap<String, Value>;

/// Finished scopes kept alive before a collection is attempted
const MIN_COLLECT: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextKind {
    /// Program or call scope, where assignments create new names
    Frame,
    /// Loop scope, transparent to assignment
    Block,
}

/// A function value's hold on the scope it was defined in
#[derive(Clone, Debug)]
pub struct EnvRef {
    id: ContextId,
    hold: Rc<()>,
}

impl EnvRef {
    pub fn id(&self) -> ContextId {
        self.id
    }
}

impl PartialEq for EnvRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Debug)]
struct Context {
    label: String,
    symbols: HashMap<String, Value>,
    parent: Option<ContextId>,
    kind: ContextKind,
    /// The call or loop that owns this scope is still running
    active: bool,
    /// Cloned into every [`EnvRef`] on this scope
    anchor: Rc<()>,
    /// Live scopes naming this one as their parent
    children: usize,
}

impl Context {
    fn unreferenced(&self) -> bool {
        !self.active && self.children == 0 && Rc::strong_count(&self.anchor) == 1
    }
}

/// Arena of scopes addressed by [`ContextId`]. A scope is released when
/// its call or loop finishes and nothing refers to it. Scopes kept by
/// closures are reclaimed by [`Contexts::collect`] once no live scope
/// or outstanding value can reach them.
#[derive(Debug)]
pub struct Contexts {
    slots: Vec<Option<Context>>,
    free: Vec<usize>,
    globals: Rc<Globals>,
    /// Finished scopes still in the arena
    retained: usize,
    next_collect: usize,
}

impl Contexts {
    pub fn new(globals: Rc<Globals>) -> Self {
        Self {
            slots: Vec::default(),
            free: Vec::default(),
            globals,
            retained: 0,
            next_collect: MIN_COLLECT,
        }
    }

    pub fn push(&mut self, label: &str, parent: Option<ContextId>, kind: ContextKind) -> ContextId {
        if let Some(ctx) = parent.and_then(|id| self.slot_mut(id)) {
            ctx.children += 1;
        }
        let ctx = Context {
            label: label.to_string(),
            symbols: HashMap::default(),
            parent,
            kind,
            active: true,
            anchor: Rc::new(()),
            children: 0,
        };
        match self.free.pop() {
            Some(i) => {
                self.slots[i] = Some(ctx);
                ContextId(i)
            }
            None => {
                self.slots.push(Some(ctx));
                ContextId(self.slots.len() - 1)
            }
        }
    }

    /// Marks the scope of a finished call or loop, releasing it and any
    /// finished ancestors that nothing refers to anymore
    pub fn pop(&mut self, id: ContextId) {
        let Some(ctx) = self.slot_mut(id) else {
            return;
        };
        ctx.active = false;
        if !ctx.unreferenced() {
            self.retained += 1;
            if self.retained >= self.next_collect {
                self.collect();
            }
            return;
        }
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !self.slot(current).is_some_and(Context::unreferenced) {
                break;
            }
            if current != id {
                self.retained = self.retained.saturating_sub(1);
            }
            cursor = self.release(current);
        }
    }

    /// Takes a hold on a scope for a function defined in it
    pub fn hold(&self, id: ContextId) -> EnvRef {
        let hold = match self.slot(id) {
            Some(ctx) => Rc::clone(&ctx.anchor),
            None => Rc::new(()),
        };
        EnvRef { id, hold }
    }

    /// Frees every finished scope that neither a running scope nor a
    /// value held outside the arena can reach
    pub fn collect(&mut self) {
        let mut refs = References::default();
        for ctx in self.slots.iter().flatten() {
            for value in ctx.symbols.values() {
                refs.count(value);
            }
        }

        // Roots are running scopes and anything with more holders than
        // the arena itself accounts for
        let mut pending = Vec::default();
        for (i, slot) in self.slots.iter().enumerate() {
            let Some(ctx) = slot else {
                continue;
            };
            let internal = refs.holds.get(&i).copied().unwrap_or(0);
            if ctx.active || Rc::strong_count(&ctx.anchor) - 1 > internal {
                pending.push(i);
            }
        }
        let mut visited = HashSet::default();
        for seen in refs.lists.values() {
            if seen.strong > seen.internal {
                if let Some(list) = seen.list.upgrade() {
                    reach(&Value::List(list), &mut visited, &mut pending);
                }
            }
        }

        let mut marked = vec![false; self.slots.len()];
        while let Some(i) = pending.pop() {
            if marked[i] {
                continue;
            }
            marked[i] = true;
            let Some(ctx) = self.slots[i].as_ref() else {
                continue;
            };
            for value in ctx.symbols.values() {
                reach(value, &mut visited, &mut pending);
            }
            if let Some(ContextId(parent)) = ctx.parent {
                pending.push(parent);
            }
        }

        let mut freed = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some() && !marked[i] {
                *slot = None;
                self.free.push(i);
                freed += 1;
            }
        }
        for ctx in self.slots.iter_mut().flatten() {
            ctx.children = 0;
        }
        for i in 0..self.slots.len() {
            if let Some(ContextId(parent)) = self.slots[i].as_ref().and_then(|ctx| ctx.parent) {
                if let Some(ctx) = self.slots[parent].as_mut() {
                    ctx.children += 1;
                }
            }
        }
        self.retained = self.slots.iter().flatten().filter(|ctx| !ctx.active).count();
        self.next_collect = MIN_COLLECT.max(self.retained * 2);
        debug!("Collected {freed} scopes, {} retained", self.retained);
    }

    /// Binds `name` in exactly this scope, shadowing outer bindings
    pub fn define(&mut self, id: ContextId, name: &str, value: Value) {
        if let Some(ctx) = self.slot_mut(id) {
            debug!("Define {name} -> {value} in {}", ctx.label);
            ctx.symbols.insert(name.to_string(), value);
        }
    }

    pub fn get(&self, id: ContextId, name: &str) -> Option<Value> {
        debug!("Get {name}");
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(ctx) = self.slot(current) else {
                break;
            };
            if let Some(value) = ctx.symbols.get(name) {
                return Some(value.clone());
            }
            cursor = ctx.parent;
        }
        self.globals.get(name).cloned()
    }

    /// Updates the nearest binding of `name` between this scope and the
    /// enclosing frame, or creates it in that frame
    pub fn assign(&mut self, id: ContextId, name: &str, value: Value) {
        let mut target = id;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(ctx) = self.slot(current) else {
                break;
            };
            target = current;
            if ctx.symbols.contains_key(name) || ctx.kind == ContextKind::Frame {
                break;
            }
            cursor = ctx.parent;
        }
        self.define(target, name, value);
    }

    /// Deletes `name` from this scope only
    pub fn remove(&mut self, id: ContextId, name: &str) -> Option<Value> {
        let ctx = self.slot_mut(id)?;
        debug!("Remove {name} from {}", ctx.label);
        ctx.symbols.remove(name)
    }

    pub fn label(&self, id: ContextId) -> Option<&str> {
        self.slot(id).map(|ctx| ctx.label.as_str())
    }

    /// Number of scopes currently alive
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Frees a slot, returning its parent
    fn release(&mut self, id: ContextId) -> Option<ContextId> {
        let ctx = self.slots.get_mut(id.0).and_then(Option::take)?;
        if let Some(parent) = ctx.parent.and_then(|p| self.slot_mut(p)) {
            parent.children = parent.children.saturating_sub(1);
        }
        self.free.push(id.0);
        ctx.parent
    }

    fn slot(&self, id: ContextId) -> Option<&Context> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: ContextId) -> Option<&mut Context> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }
}

type ListPtr = *const RefCell<Vec<Value>>;

/// A list met while counting, with how many of its holders live in the arena
struct SeenList {
    list: Weak<RefCell<Vec<Value>>>,
    strong: usize,
    internal: usize,
}

/// Holds on scopes and lists found inside the arena
#[derive(Default)]
struct References {
    holds: HashMap<usize, usize>,
    lists: HashMap<ListPtr, SeenList>,
}

impl References {
    fn count(&mut self, value: &Value) {
        match value {
            Value::Func(func) => *self.holds.entry(func.env.id().0).or_default() += 1,
            Value::List(items) => {
                let ptr = Rc::as_ptr(items);
                if let Some(seen) = self.lists.get_mut(&ptr) {
                    seen.internal += 1;
                    return;
                }
                self.lists.insert(
                    ptr,
                    SeenList {
                        list: Rc::downgrade(items),
                        strong: Rc::strong_count(items),
                        internal: 1,
                    },
                );
                // A list borrowed elsewhere is left uncounted, keeping what it holds
                if let Ok(items) = items.try_borrow() {
                    for item in items.iter() {
                        self.count(item);
                    }
                }
            }
            _ => (),
        }
    }
}

/// Queues every scope a value can reach
fn reach(value: &Value, visited: &mut HashSet<ListPtr>, pending: &mut Vec<usize>) {
    match value {
        Value::Func(func) => pending.push(func.env.id().0),
        Value::List(items) => {
            if !visited.insert(Rc::as_ptr(items)) {
                return;
            }
            if let Ok(items) = items.try_borrow() {
                for item in items.iter() {
                    reach(item, visited, pending);
                }
            }
        }
        _ => (),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Func;
    use fluxar_syntax::{
        ast::{FuncDecl, Node, NodeKind},
        token::{Position, Span},
    };
    use pretty_assertions::assert_eq;

    fn contexts() -> Contexts {
        let mut globals = Globals::default();
        globals.insert("pi".to_string(), Value::Number(3.0));
        Contexts::new(Rc::new(globals))
    }

    fn closure(ctxs: &Contexts, env: ContextId) -> Value {
        let at = Position::default();
        let decl = FuncDecl {
            name: None,
            params: vec![],
            body: Node::new(NodeKind::Number(1.0), Span::new(Rc::from("t"), at, at)),
            auto_return: true,
        };
        Value::Func(Func {
            decl: Rc::new(decl),
            env: ctxs.hold(env),
        })
    }

    #[test]
    fn lookup_walks_parents_then_globals() {
        let mut ctxs = contexts();
        let root = ctxs.push("<program>", None, ContextKind::Frame);
        let inner = ctxs.push("f", Some(root), ContextKind::Frame);
        ctxs.define(root, "x", Value::Number(1.0));
        assert_eq!(ctxs.get(inner, "x"), Some(Value::Number(1.0)));
        assert_eq!(ctxs.get(inner, "pi"), Some(Value::Number(3.0)));
        assert_eq!(ctxs.get(inner, "missing"), None);
    }

    #[test]
    fn define_shadows() {
        let mut ctxs = contexts();
        let root = ctxs.push("<program>", None, ContextKind::Frame);
        let inner = ctxs.push("f", Some(root), ContextKind::Frame);
        ctxs.define(root, "x", Value::Number(1.0));
        ctxs.define(inner, "x", Value::Number(2.0));
        assert_eq!(ctxs.get(inner, "x"), Some(Value::Number(2.0)));
        assert_eq!(ctxs.get(root, "x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn assign_through_blocks() {
        let mut ctxs = contexts();
        let root = ctxs.push("<program>", None, ContextKind::Frame);
        ctxs.define(root, "x", Value::Number(1.0));
        let block = ctxs.push("<for>", Some(root), ContextKind::Block);
        ctxs.assign(block, "x", Value::Number(5.0));
        ctxs.assign(block, "fresh", Value::Number(6.0));
        assert_eq!(ctxs.get(root, "x"), Some(Value::Number(5.0)));
        // New names land in the enclosing frame, not the block
        assert_eq!(ctxs.get(root, "fresh"), Some(Value::Number(6.0)));
    }

    #[test]
    fn assign_stops_at_frame() {
        let mut ctxs = contexts();
        let root = ctxs.push("<program>", None, ContextKind::Frame);
        ctxs.define(root, "x", Value::Number(1.0));
        let call = ctxs.push("f", Some(root), ContextKind::Frame);
        ctxs.assign(call, "x", Value::Number(2.0));
        assert_eq!(ctxs.get(root, "x"), Some(Value::Number(1.0)));
        assert_eq!(ctxs.get(call, "x"), Some(Value::Number(2.0)));
    }

    #[test]
    fn remove_only_touches_current_scope() {
        let mut ctxs = contexts();
        let root = ctxs.push("<program>", None, ContextKind::Frame);
        let inner = ctxs.push("f", Some(root), ContextKind::Frame);
        ctxs.define(root, "x", Value::Number(1.0));
        assert_eq!(ctxs.remove(inner, "x"), None);
        assert_eq!(ctxs.remove(root, "x"), Some(Value::Number(1.0)));
        assert_eq!(ctxs.get(inner, "x"), None);
    }

    #[test]
    fn pop_reuses_unreferenced_slots() {
        let mut ctxs = contexts();
        let root = ctxs.push("<program>", None, ContextKind::Frame);
        let call = ctxs.push("f", Some(root), ContextKind::Frame);
        ctxs.pop(call);
        assert_eq!(ctxs.live(), 1);
        let reused = ctxs.push("g", Some(root), ContextKind::Frame);
        assert_eq!(reused, call);
        assert_eq!(ctxs.label(reused), Some("g"));
    }

    #[test]
    fn held_scopes_outlive_their_call() {
        let mut ctxs = contexts();
        let root = ctxs.push("<program>", None, ContextKind::Frame);
        let call = ctxs.push("make", Some(root), ContextKind::Frame);
        let inner = ctxs.push("<for>", Some(call), ContextKind::Block);
        let func = closure(&ctxs, inner);
        ctxs.pop(inner);
        ctxs.pop(call);
        assert_eq!(ctxs.live(), 3);

        // Held from outside the arena
        ctxs.collect();
        assert_eq!(ctxs.live(), 3);

        // Reachable from the program scope
        ctxs.define(root, "g", func);
        ctxs.collect();
        assert_eq!(ctxs.live(), 3);
        assert_eq!(ctxs.label(inner), Some("<for>"));

        ctxs.remove(root, "g");
        ctxs.collect();
        assert_eq!(ctxs.live(), 1);
    }

    #[test]
    fn closures_stored_in_their_own_scope_are_collected() {
        let mut ctxs = contexts();
        let root = ctxs.push("<program>", None, ContextKind::Frame);
        let call = ctxs.push("outer", Some(root), ContextKind::Frame);
        let helper = closure(&ctxs, call);
        ctxs.define(call, "helper", helper);
        ctxs.pop(call);
        assert_eq!(ctxs.live(), 2);
        ctxs.collect();
        assert_eq!(ctxs.live(), 1);
        assert_eq!(ctxs.label(call), None);
    }

    #[test]
    fn lists_held_outside_keep_their_closures() {
        let mut ctxs = contexts();
        let root = ctxs.push("<program>", None, ContextKind::Frame);
        let call = ctxs.push("outer", Some(root), ContextKind::Frame);
        let list = Value::list(vec![closure(&ctxs, call)]);
        ctxs.define(call, "fs", list.clone());
        ctxs.pop(call);
        ctxs.collect();
        assert_eq!(ctxs.live(), 2);

        drop(list);
        ctxs.collect();
        assert_eq!(ctxs.live(), 1);
    }

    #[test]
    fn retained_scopes_trigger_collection() {
        let mut ctxs = contexts();
        let root = ctxs.push("<program>", None, ContextKind::Frame);
        for _ in 0..1000 {
            let call = ctxs.push("outer", Some(root), ContextKind::Frame);
            let helper = closure(&ctxs, call);
            ctxs.define(call, "helper", helper);
            ctxs.pop(call);
        }
        assert!(ctxs.live() <= MIN_COLLECT + 1);
    }
}
