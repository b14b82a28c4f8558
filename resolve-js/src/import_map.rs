//! Import map normalization, composition and serialization.
//!
//! A raw import map document looks like:
//!
//! ```json
//! { "imports": { "<specifier>": "<address>" },
//!   "scopes": { "<scope-prefix>": { "<specifier>": "<address>" } } }
//! ```
//!
//! Normalization resolves every URL-like key, every address and every scope prefix against the
//! document's base URL, drops entries that cannot be made absolute (emitting a [`Diagnostic`]
//! for each), and sorts every mapping so that longest-prefix-wins lookups are a linear scan.

use crate::diagnostic::codes;
use crate::diagnostic::Diagnostic;
use crate::error::InvalidDocument;
use crate::specifier::relative_url;
use crate::specifier::resolve_specifier;
use crate::specifier::resolve_url;
use serde::Serialize;
use serde::Serializer;
use serde_json::Map;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use url::Url;

/// Ordering used for mapping keys and scope prefixes: longer keys first, ties broken
/// lexicographically.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
  b.len().cmp(&a.len()).then_with(|| a.cmp(b))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecifierMapEntry {
  /// A bare specifier or an absolute URL (for URL-like keys).
  pub key: String,
  pub address: Url,
}

/// A sorted specifier → address mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpecifierMap {
  entries: Vec<SpecifierMapEntry>,
}

impl SpecifierMap {
  fn from_keyed(keyed: BTreeMap<String, Url>) -> Self {
    let mut entries: Vec<_> = keyed
      .into_iter()
      .map(|(key, address)| SpecifierMapEntry { key, address })
      .collect();
    entries.sort_by(|a, b| compare_keys(&a.key, &b.key));
    Self { entries }
  }

  fn to_keyed(&self) -> BTreeMap<String, Url> {
    self
      .entries
      .iter()
      .map(|entry| (entry.key.clone(), entry.address.clone()))
      .collect()
  }

  /// Returns a new mapping with `other`'s entries taking precedence over this one's.
  pub fn overlay(&self, other: &SpecifierMap) -> SpecifierMap {
    let mut keyed = self.to_keyed();
    keyed.extend(other.to_keyed());
    Self::from_keyed(keyed)
  }

  pub fn entries(&self) -> &[SpecifierMapEntry] {
    &self.entries
  }

  pub fn get(&self, key: &str) -> Option<&Url> {
    self
      .entries
      .iter()
      .find(|entry| entry.key == key)
      .map(|entry| &entry.address)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  fn to_document(&self, relative_to: Option<&Url>) -> Map<String, Value> {
    self
      .entries
      .iter()
      .map(|entry| {
        let key = match (relative_to, Url::parse(&entry.key)) {
          (Some(base), Ok(key_url)) => relative_url(&key_url, base),
          _ => entry.key.clone(),
        };
        let address = match relative_to {
          Some(base) => relative_url(&entry.address, base),
          None => entry.address.to_string(),
        };
        (key, Value::String(address))
      })
      .collect()
  }
}

/// Remappings that only apply to referrers under `prefix`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
  pub prefix: Url,
  pub imports: SpecifierMap,
}

/// A normalized, immutable import map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportMap {
  pub(crate) imports: SpecifierMap,
  pub(crate) scopes: Vec<Scope>,
}

/// The result of normalizing a document: the map plus every dropped-entry diagnostic.
#[derive(Clone, Debug)]
pub struct Normalized {
  pub import_map: ImportMap,
  pub diagnostics: Vec<Diagnostic>,
}

impl ImportMap {
  /// Parses and normalizes an import map document located at (or relative to) `base_url`.
  pub fn from_json(text: &str, base_url: &Url) -> Result<Normalized, InvalidDocument> {
    let document: Value =
      serde_json::from_str(text).map_err(|err| InvalidDocument::Json(err.to_string()))?;
    Self::normalize(&document, base_url)
  }

  /// Normalizes a raw import map document against `base_url`.
  pub fn normalize(document: &Value, base_url: &Url) -> Result<Normalized, InvalidDocument> {
    let Value::Object(document) = document else {
      return Err(InvalidDocument::NotAnObject {
        found: json_type_name(document),
      });
    };

    let mut diagnostics = Vec::new();

    let imports = match document.get("imports") {
      None => SpecifierMap::default(),
      Some(Value::Object(mappings)) => {
        normalize_mappings(mappings, base_url, "imports", &mut diagnostics)
      }
      Some(other) => {
        report(
          &mut diagnostics,
          Diagnostic::warning(
            codes::TOP_LEVEL_MEMBER_NOT_OBJECT,
            format!("\"imports\" must be an object, found {}", json_type_name(other)),
            "imports",
          ),
        );
        SpecifierMap::default()
      }
    };

    let scopes = match document.get("scopes") {
      None => Vec::new(),
      Some(Value::Object(scopes)) => normalize_scopes(scopes, base_url, &mut diagnostics),
      Some(other) => {
        report(
          &mut diagnostics,
          Diagnostic::warning(
            codes::TOP_LEVEL_MEMBER_NOT_OBJECT,
            format!("\"scopes\" must be an object, found {}", json_type_name(other)),
            "scopes",
          ),
        );
        Vec::new()
      }
    };

    Ok(Normalized {
      import_map: ImportMap { imports, scopes },
      diagnostics,
    })
  }

  pub fn imports(&self) -> &SpecifierMap {
    &self.imports
  }

  /// Scopes ordered from the longest (most specific) prefix to the shortest.
  pub fn scopes(&self) -> &[Scope] {
    &self.scopes
  }

  pub fn is_empty(&self) -> bool {
    self.imports.is_empty() && self.scopes.is_empty()
  }

  /// Composes two import maps into a new one. Entries of `other` win over entries of `self`,
  /// both at the top level and inside scopes sharing a prefix.
  pub fn compose(&self, other: &ImportMap) -> ImportMap {
    let imports = self.imports.overlay(&other.imports);
    let mut scopes: BTreeMap<String, Scope> = self
      .scopes
      .iter()
      .map(|scope| (scope.prefix.to_string(), scope.clone()))
      .collect();
    for scope in &other.scopes {
      match scopes.get_mut(scope.prefix.as_str()) {
        Some(existing) => existing.imports = existing.imports.overlay(&scope.imports),
        None => {
          scopes.insert(scope.prefix.to_string(), scope.clone());
        }
      }
    }
    ImportMap {
      imports,
      scopes: sort_scopes(scopes.into_values().collect()),
    }
  }

  /// Serializes the normalized map back into the document shape.
  ///
  /// When `relative_to` is given, addresses, URL keys and scope prefixes sharing its origin are
  /// written relative to it, which is what a map written next to `relative_to` should contain.
  pub fn to_document(&self, relative_to: Option<&Url>) -> Value {
    let mut document = Map::new();
    document.insert(
      "imports".to_string(),
      Value::Object(self.imports.to_document(relative_to)),
    );
    if !self.scopes.is_empty() {
      let scopes = self
        .scopes
        .iter()
        .map(|scope| {
          let prefix = match relative_to {
            Some(base) => relative_url(&scope.prefix, base),
            None => scope.prefix.to_string(),
          };
          (prefix, Value::Object(scope.imports.to_document(relative_to)))
        })
        .collect();
      document.insert("scopes".to_string(), Value::Object(scopes));
    }
    Value::Object(document)
  }
}

impl Serialize for ImportMap {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.to_document(None).serialize(serializer)
  }
}

fn report(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
  tracing::warn!(
    code = diagnostic.code,
    path = %diagnostic.path,
    "{}",
    diagnostic.message
  );
  diagnostics.push(diagnostic);
}

fn normalize_mappings(
  mappings: &Map<String, Value>,
  base_url: &Url,
  path: &str,
  diagnostics: &mut Vec<Diagnostic>,
) -> SpecifierMap {
  let mut keyed = BTreeMap::<String, Url>::new();

  for (specifier, address) in mappings {
    let entry_path = format!("{path}[{specifier:?}]");

    if specifier.is_empty() {
      report(
        diagnostics,
        Diagnostic::warning(
          codes::EMPTY_SPECIFIER_KEY,
          "specifier keys cannot be empty",
          entry_path,
        ),
      );
      continue;
    }

    let Value::String(address) = address else {
      report(
        diagnostics,
        Diagnostic::warning(
          codes::ADDRESS_NOT_STRING,
          format!(
            "address for {specifier:?} must be a string, found {}",
            json_type_name(address)
          ),
          entry_path,
        ),
      );
      continue;
    };

    let address_url = match resolve_url(address, base_url) {
      Ok(url) => url,
      Err(err) => {
        report(
          diagnostics,
          Diagnostic::warning(
            codes::ADDRESS_NOT_URL,
            format!("address {address:?} for {specifier:?} is not a valid URL"),
            entry_path,
          )
          .with_note(err.to_string()),
        );
        continue;
      }
    };

    if specifier.ends_with('/') && !address_url.as_str().ends_with('/') {
      report(
        diagnostics,
        Diagnostic::warning(
          codes::TRAILING_SLASH_MISMATCH,
          format!("address {address:?} must end with \"/\" because {specifier:?} does"),
          entry_path,
        ),
      );
      continue;
    }

    // URL-like keys are matched against resolved specifiers, so they are stored absolute. Keys
    // that fail to parse as URLs are kept as bare keys.
    let key = match resolve_specifier(specifier, Some(base_url)) {
      Ok(Some(url)) => url.to_string(),
      Ok(None) | Err(_) => specifier.clone(),
    };

    if let Some(previous) = keyed.insert(key.clone(), address_url) {
      report(
        diagnostics,
        Diagnostic::warning(
          codes::DUPLICATE_KEY,
          format!("{specifier:?} normalizes to {key:?}, which is already mapped"),
          entry_path,
        )
        .with_note(format!("replaced previous address {previous}")),
      );
    }
  }

  SpecifierMap::from_keyed(keyed)
}

fn normalize_scopes(
  scopes: &Map<String, Value>,
  base_url: &Url,
  diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Scope> {
  let mut normalized = BTreeMap::<String, Scope>::new();

  for (prefix, body) in scopes {
    let scope_path = format!("scopes[{prefix:?}]");

    let Value::Object(body) = body else {
      report(
        diagnostics,
        Diagnostic::warning(
          codes::SCOPE_NOT_OBJECT,
          format!("scope {prefix:?} must be an object, found {}", json_type_name(body)),
          scope_path,
        ),
      );
      continue;
    };

    let prefix_url = match resolve_url(prefix, base_url) {
      Ok(url) => url,
      Err(err) => {
        report(
          diagnostics,
          Diagnostic::warning(
            codes::SCOPE_PREFIX_NOT_URL,
            format!("scope prefix {prefix:?} is not a valid URL"),
            scope_path,
          )
          .with_note(err.to_string()),
        );
        continue;
      }
    };

    // Scope bodies resolve against the document base, not the scope prefix.
    let imports = normalize_mappings(body, base_url, &scope_path, diagnostics);
    match normalized.get_mut(prefix_url.as_str()) {
      Some(existing) => existing.imports = existing.imports.overlay(&imports),
      None => {
        normalized.insert(
          prefix_url.to_string(),
          Scope {
            prefix: prefix_url,
            imports,
          },
        );
      }
    }
  }

  sort_scopes(normalized.into_values().collect())
}

fn sort_scopes(mut scopes: Vec<Scope>) -> Vec<Scope> {
  scopes.sort_by(|a, b| compare_keys(a.prefix.as_str(), b.prefix.as_str()));
  scopes
}

fn json_type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
