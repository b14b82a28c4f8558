use crate::namespace::Namespace;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A value bound to an export name.
///
/// Module bodies are opaque to the loader, so this only models what the loader has to compare and
/// report. Anything else a host wants to export goes in [`Value::Host`].
#[derive(Clone, Default)]
pub enum Value {
  #[default]
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  String(Rc<str>),
  Namespace(Namespace),
  Host(Rc<dyn Any>),
}

impl Value {
  pub fn host<T: Any>(value: T) -> Self {
    Value::Host(Rc::new(value))
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      Value::Number(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_namespace(&self) -> Option<&Namespace> {
    match self {
      Value::Namespace(ns) => Some(ns),
      _ => None,
    }
  }

  pub fn downcast_host<T: Any>(&self) -> Option<&T> {
    match self {
      Value::Host(value) => value.downcast_ref::<T>(),
      _ => None,
    }
  }

  /// ECMA-262 `SameValue`: `NaN` equals itself, `+0` and `-0` differ, and reference values
  /// compare by identity.
  pub fn same_value(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Number(a), Value::Number(b)) => {
        if a.is_nan() && b.is_nan() {
          true
        } else {
          a == b && a.is_sign_negative() == b.is_sign_negative()
        }
      }
      (Value::String(a), Value::String(b)) => a == b,
      (Value::Namespace(a), Value::Namespace(b)) => a.ptr_eq(b),
      (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(a, b),
      _ => false,
    }
  }
}

impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    self.same_value(other)
  }
}

impl fmt::Debug for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Undefined => f.write_str("undefined"),
      Value::Null => f.write_str("null"),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Number(n) => write!(f, "{n}"),
      Value::String(s) => write!(f, "{s:?}"),
      Value::Namespace(ns) => fmt::Debug::fmt(ns, f),
      Value::Host(value) => f
        .debug_struct("Host")
        .field("type_id", &(**value).type_id())
        .finish(),
    }
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Value::Bool(value)
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Value::Number(value)
  }
}

impl From<i32> for Value {
  fn from(value: i32) -> Self {
    Value::Number(value.into())
  }
}

impl From<u32> for Value {
  fn from(value: u32) -> Self {
    Value::Number(value.into())
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::String(value.into())
  }
}

impl From<String> for Value {
  fn from(value: String) -> Self {
    Value::String(value.into())
  }
}

impl From<Namespace> for Value {
  fn from(value: Namespace) -> Self {
    Value::Namespace(value)
  }
}
