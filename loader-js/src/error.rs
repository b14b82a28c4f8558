use resolve_js::ResolveError;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// An error returned by host code (instantiation hooks, module bodies, fetchers).
///
/// Failed records hand the same error to every waiter, so the underlying [`anyhow::Error`] is
/// shared rather than cloned. The cause chain is preserved through [`std::error::Error::source`].
#[derive(Clone)]
pub struct HostError(Arc<anyhow::Error>);

impl HostError {
  pub fn new(error: anyhow::Error) -> Self {
    Self(Arc::new(error))
  }

  pub fn inner(&self) -> &anyhow::Error {
    &self.0
  }

  /// The host error followed by each of its causes.
  pub fn chain(&self) -> anyhow::Chain<'_> {
    self.0.chain()
  }
}

impl From<anyhow::Error> for HostError {
  fn from(error: anyhow::Error) -> Self {
    Self::new(error)
  }
}

impl fmt::Debug for HostError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.0, f)
  }
}

impl fmt::Display for HostError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&*self.0, f)
  }
}

impl std::error::Error for HostError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    self.0.source()
  }
}

/// Errors produced by the module loader.
///
/// A failed module record keeps its error forever; every later import of it (or of a module that
/// depends on it) returns a clone of the same error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoaderError {
  /// A specifier could not be resolved to a URL.
  #[error("cannot resolve {specifier:?}{}", describe_referrer(.referrer))]
  Resolution {
    specifier: String,
    referrer: Option<Url>,
    #[source]
    source: ResolveError,
  },

  /// The host failed to instantiate a module or returned an invalid registration.
  #[error("failed to instantiate {module}{}", describe_referrer(.referrer))]
  Instantiation {
    module: Url,
    referrer: Option<Url>,
    #[source]
    source: HostError,
  },

  /// A module body failed.
  #[error("error while executing {module}{}", describe_referrer(.referrer))]
  Execution {
    module: Url,
    referrer: Option<Url>,
    #[source]
    source: HostError,
  },

  /// The loader was dropped while a module still needed it.
  #[error("the module loader has been dropped")]
  LoaderDropped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Resolution,
  Instantiation,
  Execution,
  LoaderDropped,
}

impl ErrorKind {
  pub const fn as_str(&self) -> &'static str {
    match self {
      ErrorKind::Resolution => "resolution",
      ErrorKind::Instantiation => "instantiation",
      ErrorKind::Execution => "execution",
      ErrorKind::LoaderDropped => "loader_dropped",
    }
  }
}

impl LoaderError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      LoaderError::Resolution { .. } => ErrorKind::Resolution,
      LoaderError::Instantiation { .. } => ErrorKind::Instantiation,
      LoaderError::Execution { .. } => ErrorKind::Execution,
      LoaderError::LoaderDropped => ErrorKind::LoaderDropped,
    }
  }

  /// The module the error originated in, if any.
  pub fn module(&self) -> Option<&Url> {
    match self {
      LoaderError::Instantiation { module, .. } | LoaderError::Execution { module, .. } => {
        Some(module)
      }
      LoaderError::Resolution { .. } | LoaderError::LoaderDropped => None,
    }
  }

  pub fn referrer(&self) -> Option<&Url> {
    match self {
      LoaderError::Resolution { referrer, .. }
      | LoaderError::Instantiation { referrer, .. }
      | LoaderError::Execution { referrer, .. } => referrer.as_ref(),
      LoaderError::LoaderDropped => None,
    }
  }

  pub(crate) fn instantiation(module: &Url, referrer: Option<&Url>, error: anyhow::Error) -> Self {
    LoaderError::Instantiation {
      module: module.clone(),
      referrer: referrer.cloned(),
      source: error.into(),
    }
  }

  pub(crate) fn execution(module: &Url, referrer: Option<&Url>, error: anyhow::Error) -> Self {
    LoaderError::Execution {
      module: module.clone(),
      referrer: referrer.cloned(),
      source: error.into(),
    }
  }
}

fn describe_referrer(referrer: &Option<Url>) -> String {
  match referrer {
    Some(referrer) => format!(" (imported from {referrer})"),
    None => String::new(),
  }
}
