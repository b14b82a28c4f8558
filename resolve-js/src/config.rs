use crate::diagnostic::Diagnostic;
use crate::error::InvalidDocument;
use crate::extension::DefaultExtension;
use crate::import_map::ImportMap;
use crate::resolve::Resolver;
use serde::Deserialize;
use url::Url;

/// Resolver configuration as written in a project's JSON config.
///
/// ```json
/// { "importMap": { "imports": { "lib/": "./vendor/lib/" } },
///   "importMapUrl": "file:///project/importmap.json",
///   "defaultExtension": ".js" }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
  /// Raw import map document; normalized when the resolver is built.
  #[serde(default)]
  pub import_map: Option<serde_json::Value>,
  /// Base URL of the import map document. Defaults to the base URL passed to
  /// [`ResolverConfig::build`].
  #[serde(default)]
  pub import_map_url: Option<Url>,
  #[serde(default)]
  pub default_extension: DefaultExtension,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("invalid configuration: {0}")]
  Parse(#[from] serde_json::Error),
  #[error(transparent)]
  ImportMap(#[from] InvalidDocument),
  #[error("an import map was configured without a base URL to resolve it against")]
  MissingBaseUrl,
}

impl ResolverConfig {
  pub fn from_json(text: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(text)?)
  }

  /// Builds a [`Resolver`], returning the diagnostics for any import map entries that were dropped.
  ///
  /// The import map is resolved against `importMapUrl`, falling back to `base_url`.
  pub fn build(&self, base_url: Option<&Url>) -> Result<(Resolver, Vec<Diagnostic>), ConfigError> {
    let mut resolver = Resolver::new().with_default_extension(self.default_extension.clone());
    let mut diagnostics = Vec::new();
    if let Some(document) = &self.import_map {
      let map_base = self
        .import_map_url
        .as_ref()
        .or(base_url)
        .ok_or(ConfigError::MissingBaseUrl)?;
      let normalized = ImportMap::normalize(document, map_base)?;
      resolver = resolver.with_import_map(normalized.import_map);
      diagnostics = normalized.diagnostics;
    }
    Ok((resolver, diagnostics))
  }
}
