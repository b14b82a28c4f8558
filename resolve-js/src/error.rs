use crate::specifier::SpecifierError;
use url::Url;

/// The top-level shape of an import map document is unusable.
///
/// This is the only fatal normalization error; problems with individual entries are reported as
/// [`Diagnostic`](crate::Diagnostic)s and the entry is dropped.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidDocument {
  #[error("import map is not valid JSON: {0}")]
  Json(String),
  #[error("import map must be a JSON object, found {found}")]
  NotAnObject { found: &'static str },
}

/// Errors produced when resolving a module specifier.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
  #[error(transparent)]
  InvalidSpecifier(#[from] SpecifierError),

  /// A bare specifier had no matching import map entry.
  #[error("bare specifier {specifier:?} is not remapped by the import map{}", describe_referrer(.referrer))]
  UnmappedSpecifier {
    specifier: String,
    referrer: Option<Url>,
  },

  /// A prefix mapping matched but the substituted address is not a valid URL.
  #[error("{specifier:?} matched {key:?} but {candidate:?} is not a valid URL")]
  InvalidMapping {
    specifier: String,
    key: String,
    candidate: String,
  },

  /// A prefix mapping matched but the remainder of the specifier escapes the mapped address.
  #[error("{specifier:?} backtracks above {address} (mapped by {key:?})")]
  Backtracking {
    specifier: String,
    key: String,
    address: Url,
  },
}

fn describe_referrer(referrer: &Option<Url>) -> String {
  match referrer {
    Some(referrer) => format!(" (imported from {referrer})"),
    None => String::new(),
  }
}
