use crate::error::ResolveError;
use crate::extension::apply_default_extension;
use crate::extension::DefaultExtension;
use crate::import_map::ImportMap;
use crate::import_map::SpecifierMap;
use crate::specifier::has_scheme;
use crate::specifier::resolve_specifier;
use crate::specifier::resolve_url;
use crate::specifier::specifier_is_prefix_of;
use crate::specifier::SpecifierError;
use std::borrow::Cow;
use url::Url;

impl ImportMap {
  /// Resolves `specifier`, imported from `referrer`, to an absolute URL.
  ///
  /// Scopes matching the referrer are consulted from the most specific prefix to the least
  /// specific, then the top-level `imports`. A scope prefix equal to the referrer URL counts as a
  /// match. URL-like specifiers that no mapping rewrites resolve to their own absolute form; bare
  /// specifiers that no mapping rewrites fail with [`ResolveError::UnmappedSpecifier`].
  pub fn resolve(&self, specifier: &str, referrer: Option<&Url>) -> Result<Url, ResolveError> {
    let as_url = resolve_specifier(specifier, referrer)?;
    let normalized: Cow<'_, str> = match &as_url {
      Some(url) => Cow::Owned(url.to_string()),
      None => Cow::Borrowed(specifier),
    };

    if let Some(referrer) = referrer {
      for scope in &self.scopes {
        if !scope_matches(&scope.prefix, referrer) {
          continue;
        }
        if let Some(url) = apply_mappings(&scope.imports, &normalized)? {
          tracing::trace!(%specifier, %referrer, scope = %scope.prefix, %url, "scoped mapping");
          return Ok(url);
        }
      }
    }

    if let Some(url) = apply_mappings(&self.imports, &normalized)? {
      tracing::trace!(%specifier, %url, "top-level mapping");
      return Ok(url);
    }

    match as_url {
      Some(url) => Ok(url),
      None => Err(ResolveError::UnmappedSpecifier {
        specifier: specifier.to_string(),
        referrer: referrer.cloned(),
      }),
    }
  }
}

fn scope_matches(prefix: &Url, referrer: &Url) -> bool {
  prefix.as_str() == referrer.as_str() || specifier_is_prefix_of(prefix.as_str(), referrer.as_str())
}

/// Finds the entry for `specifier` in `mappings`: an exact key, otherwise the longest
/// `/`-terminated key prefixing it. Entries are sorted longest first so the first hit wins.
fn apply_mappings(mappings: &SpecifierMap, specifier: &str) -> Result<Option<Url>, ResolveError> {
  for entry in mappings.entries() {
    if entry.key == specifier {
      return Ok(Some(entry.address.clone()));
    }
    if !specifier_is_prefix_of(&entry.key, specifier) {
      continue;
    }

    let candidate = format!("{}{}", entry.address, &specifier[entry.key.len()..]);
    let resolved = Url::parse(&candidate).map_err(|_| ResolveError::InvalidMapping {
      specifier: specifier.to_string(),
      key: entry.key.clone(),
      candidate: candidate.clone(),
    })?;
    if !resolved.as_str().starts_with(entry.address.as_str()) {
      return Err(ResolveError::Backtracking {
        specifier: specifier.to_string(),
        key: entry.key.clone(),
        address: entry.address.clone(),
      });
    }
    return Ok(Some(resolved));
  }
  Ok(None)
}

/// Resolves specifiers with an optional import map and a default extension policy.
///
/// Without an import map, specifiers resolve with plain URL semantics (`new URL(specifier,
/// referrer)`), so bare specifiers are treated as path-relative.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolver {
  import_map: Option<ImportMap>,
  default_extension: DefaultExtension,
}

impl Resolver {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_import_map(mut self, import_map: ImportMap) -> Self {
    self.import_map = Some(import_map);
    self
  }

  pub fn with_default_extension(mut self, default_extension: DefaultExtension) -> Self {
    self.default_extension = default_extension;
    self
  }

  pub fn import_map(&self) -> Option<&ImportMap> {
    self.import_map.as_ref()
  }

  pub fn default_extension(&self) -> &DefaultExtension {
    &self.default_extension
  }

  pub fn resolve(&self, specifier: &str, referrer: Option<&Url>) -> Result<Url, ResolveError> {
    let url = match &self.import_map {
      Some(import_map) => import_map.resolve(specifier, referrer)?,
      None => resolve_plain(specifier, referrer)?,
    };
    Ok(apply_default_extension(url, referrer, &self.default_extension))
  }
}

fn resolve_plain(specifier: &str, referrer: Option<&Url>) -> Result<Url, ResolveError> {
  if has_scheme(specifier) {
    if let Some(url) = resolve_specifier(specifier, None)? {
      return Ok(url);
    }
  }
  match referrer {
    Some(referrer) => Ok(resolve_url(specifier, referrer)?),
    None => Err(SpecifierError::RelativeWithoutBase(specifier.to_string()).into()),
  }
}
