//! JSON encoding of namespaces and loader errors, for reporting them to another process.
//!
//! Namespaces can contain each other (including cyclically), so each encoding call keeps a side
//! table from namespace identity to the index it was first encoded under. The first occurrence is
//! written as `{"$namespace": n, "exports": {...}}` and every later one as `{"$ref": n}`.

use crate::error::LoaderError;
use crate::loader::Loader;
use crate::namespace::Namespace;
use crate::value::Value;
use ahash::HashMap;
use serde_json::json;
use serde_json::Map;
use serde_json::Value as Json;
use std::error::Error;

pub fn namespace_to_json(namespace: &Namespace) -> Json {
  Encoder::default().namespace(namespace)
}

pub fn value_to_json(value: &Value) -> Json {
  Encoder::default().value(value)
}

/// Encodes `error` as `{kind, message, module, referrer, causes}`.
pub fn error_to_json(error: &LoaderError) -> Json {
  let mut causes = Vec::new();
  let mut source = error.source();
  while let Some(cause) = source {
    causes.push(Json::String(cause.to_string()));
    source = cause.source();
  }
  json!({
    "kind": error.kind().as_str(),
    "message": error.to_string(),
    "module": error.module().map(|url| url.as_str()),
    "referrer": error.referrer().map(|url| url.as_str()),
    "causes": causes,
  })
}

/// Encodes the loader's registry as `[{url, state, error?}]`, in registration order.
pub fn registry_to_json(loader: &Loader) -> Json {
  let entries = loader
    .entries()
    .into_iter()
    .map(|(url, state)| {
      let mut entry = json!({ "url": url.as_str(), "state": state });
      if let Some(error) = loader.error(&url) {
        entry["error"] = error_to_json(&error);
      }
      entry
    })
    .collect();
  Json::Array(entries)
}

fn non_finite_name(n: f64) -> &'static str {
  if n.is_nan() {
    "NaN"
  } else if n.is_sign_positive() {
    "Infinity"
  } else {
    "-Infinity"
  }
}

#[derive(Default)]
struct Encoder {
  ids: HashMap<usize, usize>,
}

impl Encoder {
  fn value(&mut self, value: &Value) -> Json {
    match value {
      Value::Undefined => json!({ "$type": "undefined" }),
      Value::Null => Json::Null,
      Value::Bool(b) => Json::Bool(*b),
      Value::Number(n) => match serde_json::Number::from_f64(*n) {
        Some(number) => Json::Number(number),
        None => json!({ "$type": "number", "value": non_finite_name(*n) }),
      },
      Value::String(s) => Json::String(s.to_string()),
      Value::Namespace(namespace) => self.namespace(namespace),
      Value::Host(_) => json!({ "$type": "host" }),
    }
  }

  fn namespace(&mut self, namespace: &Namespace) -> Json {
    let next = self.ids.len();
    let id = *self.ids.entry(namespace.identity()).or_insert(next);
    if id != next {
      return json!({ "$ref": id });
    }
    // Encode from a copy so that no borrow is held while nested namespaces are visited.
    let exports: Map<String, Json> = namespace
      .snapshot()
      .into_iter()
      .map(|(name, value)| (name, self.value(&value)))
      .collect();
    json!({ "$namespace": id, "exports": exports })
  }
}
