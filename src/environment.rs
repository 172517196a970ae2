use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::value::Value;

/// One lexical scope: an append-only slot array plus a link to the
/// enclosing scope.
///
/// There is no name map.  Slots are indexed contiguously from 0 and their
/// assignment order is fixed by the resolver, which mirrors every runtime
/// `define` with its own per-scope counter.  Correctness of `get_at` /
/// `assign_at` therefore depends on the resolver producing valid
/// coordinates.
#[derive(Debug, Default)]
pub struct Environment {
    values: Vec<Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: Vec::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: Vec::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn enclosing(&self) -> Option<Rc<RefCell<Environment>>> {
        self.enclosing.clone()
    }

    /// Appends a value, returning the slot it landed in.
    pub fn define(&mut self, value: Value) -> usize {
        let slot: usize = self.values.len();

        self.values.push(value);

        slot
    }

    /// Writes a value at a resolver-assigned slot, growing the array as
    /// needed.  Used for global definitions, whose slots are fixed by the
    /// registry rather than by execution order.
    pub fn define_at(&mut self, slot: usize, value: Value) {
        if slot >= self.values.len() {
            self.values.resize(slot + 1, Value::Nil);
        }

        self.values[slot] = value;
    }

    /// Checked single-frame read; `None` when the slot was never defined.
    pub fn read_slot(&self, slot: usize) -> Option<Value> {
        self.values.get(slot).cloned()
    }

    /// Checked single-frame write; `false` when the slot was never defined.
    pub fn write_slot(&mut self, slot: usize, value: Value) -> bool {
        match self.values.get_mut(slot) {
            Some(cell) => {
                *cell = value;
                true
            }

            None => false,
        }
    }

    /// Follows `enclosing` exactly `depth` times.
    fn ancestor(env: &Rc<RefCell<Environment>>, depth: usize) -> Rc<RefCell<Environment>> {
        let mut current: Rc<RefCell<Environment>> = Rc::clone(env);

        for _ in 0..depth {
            let next: Rc<RefCell<Environment>> = current
                .borrow()
                .enclosing
                .clone()
                .expect("resolver produced a depth past the end of the environment chain");

            current = next;
        }

        current
    }

    /// Reads the slot `depth` scopes up the chain.
    pub fn get_at(env: &Rc<RefCell<Environment>>, depth: usize, slot: usize) -> Value {
        debug!("get_at depth={}, slot={}", depth, slot);

        Environment::ancestor(env, depth).borrow().values[slot].clone()
    }

    /// Writes the slot `depth` scopes up the chain.
    pub fn assign_at(env: &Rc<RefCell<Environment>>, depth: usize, slot: usize, value: Value) {
        debug!("assign_at depth={}, slot={}", depth, slot);

        Environment::ancestor(env, depth).borrow_mut().values[slot] = value;
    }
}
