use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A module namespace: the live view of a module's exports.
///
/// The loader creates exactly one namespace per module record and mutates it in place as the module
/// exports, so every holder of the handle observes updates. Export names iterate in ascending
/// order. Equality is identity.
#[derive(Clone, Default)]
pub struct Namespace(Rc<RefCell<BTreeMap<String, Value>>>);

impl Namespace {
  pub fn get(&self, name: &str) -> Option<Value> {
    self.0.borrow().get(name).cloned()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.0.borrow().contains_key(name)
  }

  pub fn names(&self) -> Vec<String> {
    self.0.borrow().keys().cloned().collect()
  }

  /// A copy of the current bindings.
  pub fn snapshot(&self) -> Vec<(String, Value)> {
    self
      .0
      .borrow()
      .iter()
      .map(|(name, value)| (name.clone(), value.clone()))
      .collect()
  }

  pub fn len(&self) -> usize {
    self.0.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.borrow().is_empty()
  }

  pub fn ptr_eq(&self, other: &Namespace) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }

  /// Stable identity for the lifetime of the namespace.
  pub(crate) fn identity(&self) -> usize {
    Rc::as_ptr(&self.0) as *const () as usize
  }

  /// Binds `name` to `value`, returning whether the binding changed.
  pub(crate) fn write(&self, name: String, value: Value) -> bool {
    let mut bindings = self.0.borrow_mut();
    match bindings.get_mut(&name) {
      Some(existing) if existing.same_value(&value) => false,
      Some(existing) => {
        *existing = value;
        true
      }
      None => {
        bindings.insert(name, value);
        true
      }
    }
  }
}

impl PartialEq for Namespace {
  fn eq(&self, other: &Self) -> bool {
    self.ptr_eq(other)
  }
}

impl Eq for Namespace {}

impl fmt::Debug for Namespace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Names only; namespaces can contain each other.
    match self.0.try_borrow() {
      Ok(bindings) => f.debug_set().entries(bindings.keys()).finish(),
      Err(_) => f.write_str("Namespace { .. }"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn writes_report_changes() {
    let ns = Namespace::default();
    assert!(ns.write("b".to_string(), Value::from(1)));
    assert!(!ns.write("b".to_string(), Value::from(1)));
    assert!(ns.write("a".to_string(), Value::Undefined));
    assert!(!ns.write("a".to_string(), Value::Undefined));
    assert!(ns.write("b".to_string(), Value::from(2)));
    assert_eq!(ns.names(), ["a", "b"]);
    assert_eq!(ns.get("b"), Some(Value::from(2)));
    assert_eq!(ns.get("c"), None);
  }

  #[test]
  fn handles_share_bindings() {
    let ns = Namespace::default();
    let other = ns.clone();
    ns.write("x".to_string(), Value::from("y"));
    assert_eq!(other.get("x"), Some(Value::from("y")));
    assert_eq!(ns, other);
    assert_ne!(ns, Namespace::default());
  }
}
