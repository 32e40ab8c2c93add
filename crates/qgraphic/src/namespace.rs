//! Lexically scoped environments.
//!
//! Environments form a tree through single parent links: the global
//! environment (always id 0) holds built-ins, function values and
//! top-level variables; every function call and every `For` iteration gets
//! a fresh child. All environments live in one central arena and are
//! addressed by [`EnvId`], with released slots recycled through a free
//! list — a child never outlives the statement that created it because
//! closures only ever capture the global environment.

use std::rc::Rc;

use ahash::AHashMap;

use crate::value::Value;

/// Identifier of an environment in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvId(u32);

/// The global (module-level) environment, created first.
pub const GLOBAL_ENV: EnvId = EnvId(0);

#[derive(Debug, Default)]
struct Environment {
    values: AHashMap<Rc<str>, Value>,
    parent: Option<EnvId>,
}

/// Storage for all environments during one run.
#[derive(Debug)]
pub(crate) struct Environments {
    stack: Vec<Environment>,
    /// Released slots available for reuse.
    reuse_ids: Vec<EnvId>,
}

impl Environments {
    /// Creates the arena with an empty global environment at id 0.
    pub fn new() -> Self {
        Self {
            stack: vec![Environment::default()],
            reuse_ids: Vec::new(),
        }
    }

    /// Creates (or recycles) a child environment of `parent`.
    pub fn child(&mut self, parent: EnvId) -> EnvId {
        if let Some(id) = self.reuse_ids.pop() {
            let env = &mut self.stack[id.0 as usize];
            env.values.clear();
            env.parent = Some(parent);
            return id;
        }
        let id = EnvId(u32::try_from(self.stack.len()).expect("environment arena overflow"));
        self.stack.push(Environment {
            values: AHashMap::new(),
            parent: Some(parent),
        });
        id
    }

    /// Returns a non-global environment's slot to the free list.
    pub fn release(&mut self, id: EnvId) {
        debug_assert_ne!(id, GLOBAL_ENV, "the global environment is never released");
        self.stack[id.0 as usize].values.clear();
        self.reuse_ids.push(id);
    }

    /// Declares `name` in `env` itself, shadowing any parent binding.
    pub fn define(&mut self, env: EnvId, name: Rc<str>, value: Value) {
        self.stack[env.0 as usize].values.insert(name, value);
    }

    /// Assigns to an existing binding, walking parents to find the owning
    /// environment. Returns false when no environment holds `name`.
    pub fn set(&mut self, env: EnvId, name: &str, value: Value) -> bool {
        let mut current = Some(env);
        while let Some(id) = current {
            let environment = &mut self.stack[id.0 as usize];
            if let Some(slot) = environment.values.get_mut(name) {
                *slot = value;
                return true;
            }
            current = environment.parent;
        }
        false
    }

    /// Reads `name`, walking parents.
    pub fn get(&self, env: EnvId, name: &str) -> Option<Value> {
        let mut current = Some(env);
        while let Some(id) = current {
            let environment = &self.stack[id.0 as usize];
            if let Some(value) = environment.values.get(name) {
                return Some(value.clone());
            }
            current = environment.parent;
        }
        None
    }
}
