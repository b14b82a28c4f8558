//! URL and module specifier utilities.
//!
//! These are small pure functions shared by the import map normalizer, the resolver and the module
//! loader. A *specifier* is the string a module uses to reference another module; it is either
//! URL-like (relative, root-relative or absolute) or *bare* (e.g. `"lodash"` or `"lib/util.js"`).

use url::Url;

/// Errors produced when turning a URL-like specifier into an absolute URL.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SpecifierError {
  #[error("relative specifier {0:?} cannot be resolved without a base URL")]
  RelativeWithoutBase(String),
  #[error("{specifier:?} is not a valid URL: {reason}")]
  InvalidUrl { specifier: String, reason: String },
}

/// Returns true if `value` starts with a URL scheme (`https:`, `file:`, `data:`...).
///
/// Schemes must be at least two characters long so Windows drive letters (`C:\foo`) are not
/// mistaken for URLs.
pub fn has_scheme(value: &str) -> bool {
  let Some(colon) = value.find(':') else {
    return false;
  };
  let scheme = &value[..colon];
  let mut chars = scheme.chars();
  match chars.next() {
    Some(first) if first.is_ascii_alphabetic() => {}
    _ => return false,
  }
  scheme.len() >= 2
    && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Returns true if `specifier` is resolvable as a URL on its own or relative to a base URL.
pub fn is_url_like(specifier: &str) -> bool {
  specifier == "."
    || specifier == ".."
    || specifier.starts_with('/')
    || specifier.starts_with("./")
    || specifier.starts_with("../")
    || has_scheme(specifier)
}

/// Resolves `specifier` against `base` with WHATWG URL semantics (`new URL(specifier, base)`).
///
/// Unlike [`resolve_specifier`], bare strings are treated as path-relative.
pub fn resolve_url(specifier: &str, base: &Url) -> Result<Url, SpecifierError> {
  base.join(specifier).map_err(|err| SpecifierError::InvalidUrl {
    specifier: specifier.to_string(),
    reason: err.to_string(),
  })
}

/// Resolves a URL-like specifier to an absolute URL.
///
/// Returns `Ok(None)` for bare specifiers, which have no directly resolvable form.
pub fn resolve_specifier(specifier: &str, base: Option<&Url>) -> Result<Option<Url>, SpecifierError> {
  if has_scheme(specifier) {
    return Url::parse(specifier)
      .map(Some)
      .map_err(|err| SpecifierError::InvalidUrl {
        specifier: specifier.to_string(),
        reason: err.to_string(),
      });
  }
  if !is_url_like(specifier) {
    return Ok(None);
  }
  match base {
    Some(base) => resolve_url(specifier, base).map(Some),
    None => Err(SpecifierError::RelativeWithoutBase(specifier.to_string())),
  }
}

/// The origin of `url`, with `file:` URLs reported as `file://` rather than an opaque origin.
pub fn url_to_origin(url: &Url) -> String {
  if url.scheme() == "file" {
    return "file://".to_string();
  }
  url.origin().ascii_serialization()
}

pub fn url_to_pathname(url: &Url) -> &str {
  url.path()
}

/// Returns the extension of the last path segment including the leading dot, or `""`.
pub fn pathname_to_extension(pathname: &str) -> &str {
  let filename = match pathname.rfind('/') {
    Some(slash) => &pathname[slash + 1..],
    None => pathname,
  };
  match filename.rfind('.') {
    Some(dot) => &filename[dot..],
    None => "",
  }
}

/// Returns true if `prefix` is a `/`-terminated prefix of `specifier`.
pub fn specifier_is_prefix_of(prefix: &str, specifier: &str) -> bool {
  prefix.ends_with('/') && specifier.starts_with(prefix)
}

/// Returns true if `url` is strictly inside the directory URL `parent`.
pub fn url_is_inside_of(url: &Url, parent: &Url) -> bool {
  let parent = parent.as_str();
  let url = url.as_str();
  parent.ends_with('/') && url.len() > parent.len() && url.starts_with(parent)
}

/// Writes `url` relative to `base` when both share an origin, keeping the result URL-like
/// (`./x`, `../x`). Otherwise returns the absolute URL.
pub fn relative_url(url: &Url, base: &Url) -> String {
  if url_to_origin(url) != url_to_origin(base) {
    return url.to_string();
  }
  match base.make_relative(url) {
    // `make_relative` reports the base's own directory as "/".
    Some(relative) if relative.is_empty() || relative == "/" => "./".to_string(),
    Some(relative) if relative.starts_with("../") => relative,
    Some(relative) if relative.starts_with('?') || relative.starts_with('#') => url.to_string(),
    Some(relative) => format!("./{relative}"),
    None => url.to_string(),
  }
}
