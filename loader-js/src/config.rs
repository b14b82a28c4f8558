use crate::loader::LoaderOptions;
use resolve_js::Diagnostic;
use resolve_js::ResolverConfig;
use serde::Deserialize;
use url::Url;

/// Loader configuration as written in a project's JSON config.
///
/// ```json
/// { "baseUrl": "file:///project/",
///   "importMap": { "imports": { "lib/": "./vendor/lib/" } },
///   "defaultExtension": ".js" }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderConfig {
  #[serde(default)]
  pub base_url: Option<Url>,
  #[serde(flatten)]
  pub resolver: ResolverConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("invalid loader configuration: {0}")]
  Parse(#[from] serde_json::Error),
  #[error(transparent)]
  Resolver(#[from] resolve_js::ConfigError),
}

impl LoaderConfig {
  pub fn from_json(text: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(text)?)
  }

  /// Builds loader options, returning the diagnostics for any import map entries that were dropped.
  pub fn build(&self) -> Result<(LoaderOptions, Vec<Diagnostic>), ConfigError> {
    let (resolver, diagnostics) = self.resolver.build(self.base_url.as_ref())?;
    for diagnostic in &diagnostics {
      tracing::debug!(%diagnostic, "import map entry dropped");
    }
    let options = LoaderOptions {
      base_url: self.base_url.clone(),
      resolver,
    };
    Ok((options, diagnostics))
  }
}
