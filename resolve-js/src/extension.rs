use crate::specifier::pathname_to_extension;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

/// Policy for extension-less resolved URLs.
///
/// In configuration this is written as `false` (disabled), `true` (reuse the referrer's
/// extension) or a string such as `".js"` (append verbatim).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawDefaultExtension", into = "RawDefaultExtension")]
pub enum DefaultExtension {
  #[default]
  Disabled,
  InferFromReferrer,
  Fixed(String),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDefaultExtension {
  Flag(bool),
  Extension(String),
}

impl From<RawDefaultExtension> for DefaultExtension {
  fn from(raw: RawDefaultExtension) -> Self {
    match raw {
      RawDefaultExtension::Flag(false) => DefaultExtension::Disabled,
      RawDefaultExtension::Flag(true) => DefaultExtension::InferFromReferrer,
      RawDefaultExtension::Extension(ext) if ext.is_empty() => DefaultExtension::Disabled,
      RawDefaultExtension::Extension(ext) => DefaultExtension::Fixed(ext),
    }
  }
}

impl From<DefaultExtension> for RawDefaultExtension {
  fn from(value: DefaultExtension) -> Self {
    match value {
      DefaultExtension::Disabled => RawDefaultExtension::Flag(false),
      DefaultExtension::InferFromReferrer => RawDefaultExtension::Flag(true),
      DefaultExtension::Fixed(ext) => RawDefaultExtension::Extension(ext),
    }
  }
}

/// Appends the policy's extension to `url` when its path has no extension and is not a directory.
///
/// Opaque URLs such as `data:` and `node:fs` are returned unchanged.
///
/// This runs after import map matching and never influences which mapping is chosen.
pub fn apply_default_extension(
  url: Url,
  referrer: Option<&Url>,
  default_extension: &DefaultExtension,
) -> Url {
  if url.cannot_be_a_base() {
    return url;
  }
  let path = url.path();
  if path.ends_with('/') || !pathname_to_extension(path).is_empty() {
    return url;
  }

  let extension = match default_extension {
    DefaultExtension::Disabled => return url,
    DefaultExtension::Fixed(extension) => extension.as_str(),
    DefaultExtension::InferFromReferrer => match referrer {
      Some(referrer) => pathname_to_extension(referrer.path()),
      None => return url,
    },
  };
  if extension.is_empty() {
    return url;
  }

  let extended = format!("{path}{extension}");
  let mut url = url;
  url.set_path(&extended);
  url
}
