use crate::host::SetterHandle;
use crate::loader::LoaderState;
use crate::namespace::Namespace;
use crate::record::ModuleId;
use crate::record::ModuleState;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Weak;

/// Publishes a module's bindings into its namespace.
///
/// Every export call updates the namespace in place and, when a binding actually changed, notifies
/// the setters of every importing module. Once the module has executed, existing bindings can
/// still be updated but new names are ignored.
#[derive(Clone)]
pub struct Exporter {
  loader: Weak<LoaderState>,
  module: ModuleId,
}

impl Exporter {
  pub(crate) fn new(loader: Weak<LoaderState>, module: ModuleId) -> Self {
    Self { loader, module }
  }

  pub fn export(&self, name: impl Into<String>, value: impl Into<Value>) {
    self.export_all([(name.into(), value.into())]);
  }

  /// Applies several bindings before notifying importers once.
  pub fn export_all<N: Into<String>>(&self, entries: impl IntoIterator<Item = (N, Value)>) {
    let Some(state) = self.loader.upgrade() else {
      tracing::debug!("export after the loader was dropped");
      return;
    };

    let notify = {
      let mut registry = state.registry.borrow_mut();
      let record = registry.record_mut(self.module);
      record.has_hoisted_exports = true;
      let executed = record.state == ModuleState::Executed;
      let mut changed = false;
      for (name, value) in entries {
        let name = name.into();
        if executed && !record.namespace.contains(&name) {
          tracing::warn!(module = %record.url, %name, "ignoring new export after execution");
          continue;
        }
        changed |= record.namespace.write(name, value);
      }
      changed.then(|| (record.importer_setters.clone(), record.namespace.clone()))
    };

    if let Some((setters, namespace)) = notify {
      propagate(&state.propagation, setters, &namespace);
    }
  }
}

impl fmt::Debug for Exporter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Exporter").field("module", &self.module).finish()
  }
}

/// Setter notifications waiting to run.
///
/// Notifications raised while a setter is running are queued and drained by the outermost call,
/// so no setter is ever re-entered.
#[derive(Default)]
pub(crate) struct Propagation {
  queue: VecDeque<(SetterHandle, Namespace)>,
  draining: bool,
}

struct DrainGuard<'a>(&'a RefCell<Propagation>);

impl Drop for DrainGuard<'_> {
  fn drop(&mut self) {
    let mut propagation = self.0.borrow_mut();
    propagation.draining = false;
    propagation.queue.clear();
  }
}

pub(crate) fn propagate(
  propagation: &RefCell<Propagation>,
  setters: Vec<SetterHandle>,
  namespace: &Namespace,
) {
  {
    let mut propagation = propagation.borrow_mut();
    propagation
      .queue
      .extend(setters.into_iter().map(|setter| (setter, namespace.clone())));
    if propagation.draining {
      return;
    }
    propagation.draining = true;
  }

  let _guard = DrainGuard(propagation);
  loop {
    let next = propagation.borrow_mut().queue.pop_front();
    let Some((setter, namespace)) = next else {
      break;
    };
    match setter.try_borrow_mut() {
      Ok(mut setter) => {
        tracing::trace!(exports = namespace.len(), "notifying setter");
        setter.set(&namespace);
      }
      Err(_) => tracing::warn!("skipping notification of a setter that is already running"),
    };
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::host::Setter;
  use std::cell::Cell;
  use std::rc::Rc;

  fn handle(setter: impl Setter + 'static) -> SetterHandle {
    Rc::new(RefCell::new(Box::new(setter)))
  }

  #[test]
  fn nested_notifications_are_queued() {
    let propagation = Rc::new(RefCell::new(Propagation::default()));
    let order = Rc::new(RefCell::new(Vec::new()));
    let running = Rc::new(Cell::new(false));

    let second = handle({
      let order = order.clone();
      let running = running.clone();
      move |_: &Namespace| {
        assert!(!running.get());
        order.borrow_mut().push("second");
      }
    });
    let first = handle({
      let order = order.clone();
      let running = running.clone();
      let propagation = propagation.clone();
      let second = second.clone();
      move |ns: &Namespace| {
        running.set(true);
        order.borrow_mut().push("first:start");
        propagate(&propagation, vec![second.clone()], ns);
        order.borrow_mut().push("first:end");
        running.set(false);
      }
    });

    propagate(&propagation, vec![first], &Namespace::default());
    assert_eq!(*order.borrow(), ["first:start", "first:end", "second"]);
    assert!(!propagation.borrow().draining);
  }
}
