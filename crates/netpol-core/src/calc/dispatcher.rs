//! Routing of the typed update stream into its consumers.

use crate::model::Update;

/// A consumer of update-stream records.
pub trait UpdateHandler {
    /// Applies one record.
    fn on_update(&mut self, update: &Update);
}

/// Fans the update stream out to registered handlers, in registration order.
///
/// This is pure glue between the datastore watcher and the calculator; it
/// holds no state of its own beyond the handler list.
#[derive(Default)]
pub struct Dispatcher {
    handlers: Vec<Box<dyn UpdateHandler>>,
}

impl Dispatcher {
    /// Creates a dispatcher with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler to the end of the routing list.
    pub fn register(&mut self, handler: Box<dyn UpdateHandler>) {
        self.handlers.push(handler);
    }

    /// Routes one record to every handler.
    pub fn dispatch(&mut self, update: &Update) {
        for handler in &mut self.handlers {
            handler.on_update(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::model::{EndpointKey, Key};

    #[derive(Clone, Default)]
    struct Counter {
        seen: Rc<RefCell<Vec<String>>>,
        tag: &'static str,
    }

    impl UpdateHandler for Counter {
        fn on_update(&mut self, update: &Update) {
            self.seen
                .borrow_mut()
                .push(format!("{}:{}", self.tag, update.key));
        }
    }

    #[test]
    fn dispatch_reaches_handlers_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Box::new(Counter {
            seen: seen.clone(),
            tag: "a",
        }));
        dispatcher.register(Box::new(Counter {
            seen: seen.clone(),
            tag: "b",
        }));

        dispatcher.dispatch(&Update::delete(Key::Endpoint(EndpointKey::Host {
            host: "node1".to_string(),
            name: "eth0".to_string(),
        })));

        assert_eq!(
            *seen.borrow(),
            vec![
                "a:HostEndpoint(host=node1, name=eth0)".to_string(),
                "b:HostEndpoint(host=node1, name=eth0)".to_string(),
            ]
        );
    }
}
