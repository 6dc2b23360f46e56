//! Minimal publish/subscribe capability composed into the root context.
//!
//! The engine publishes a single hook point today: `"help"`, emitted just
//! before help output is computed. Consumers may observe it to decorate or
//! log help generation.

use std::cell::RefCell;

use indexmap::IndexMap;

use crate::value::Value;

type Listener = Box<dyn Fn(&Value)>;

#[derive(Default)]
pub struct Hooks {
    listeners: RefCell<IndexMap<String, Vec<Listener>>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `event`. Listeners run in registration order.
    pub fn on(&self, event: &str, listener: impl Fn(&Value) + 'static) {
        self.listeners
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(Box::new(listener));
    }

    pub fn emit(&self, event: &str, payload: &Value) {
        let listeners = self.listeners.borrow();
        if let Some(set) = listeners.get(event) {
            for listener in set {
                listener(payload);
            }
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.borrow();
        f.debug_struct("Hooks")
            .field("events", &listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn listeners_fire_in_order() {
        let hooks = Hooks::new();
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        hooks.on("help", move |_| h.set(h.get() * 10 + 1));
        let h = hits.clone();
        hooks.on("help", move |_| h.set(h.get() * 10 + 2));

        hooks.emit("help", &Value::Null);
        assert_eq!(hits.get(), 12);

        hooks.emit("other", &Value::Null);
        assert_eq!(hits.get(), 12);
    }
}
