//! Interfaces between the loader and the code it loads.
//!
//! The loader never fetches, parses or runs anything itself. For every module it calls
//! [`ModuleHost::instantiate`], which returns a [`Registration`]: the module's dependency
//! specifiers, one optional [`Setter`] per dependency, and an optional [`Execute`] body. Module
//! code publishes bindings through the [`Exporter`](crate::Exporter) on its [`ModuleContext`].

use crate::error::LoaderError;
use crate::export::Exporter;
use crate::loader::Loader;
use crate::loader::LoaderState;
use crate::namespace::Namespace;
use crate::value::Value;
use anyhow::Context;
use futures::future;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::rc::Weak;
use url::Url;

/// Instantiates modules for a [`Loader`].
pub trait ModuleHost {
  /// Produces the registration for `context.url()`.
  ///
  /// Hoisted exports (function declarations and the like) can be published through `context`
  /// before returning.
  fn instantiate(&self, context: ModuleContext) -> LocalBoxFuture<'static, anyhow::Result<Registration>>;
}

/// Receives a dependency's namespace whenever its bindings change.
pub trait Setter {
  fn set(&mut self, namespace: &Namespace);
}

impl<F: FnMut(&Namespace)> Setter for F {
  fn set(&mut self, namespace: &Namespace) {
    self(namespace)
  }
}

/// A module body. Runs at most once.
pub trait Execute {
  fn execute(self: Box<Self>) -> LocalBoxFuture<'static, anyhow::Result<()>>;
}

impl<F, Fut> Execute for F
where
  F: FnOnce() -> Fut,
  Fut: Future<Output = anyhow::Result<()>> + 'static,
{
  fn execute(self: Box<Self>) -> LocalBoxFuture<'static, anyhow::Result<()>> {
    (*self)().boxed_local()
  }
}

pub(crate) type SetterHandle = Rc<RefCell<Box<dyn Setter>>>;

/// What a host returns for one module.
///
/// `setters` must be parallel to `dependencies`; a `None` setter marks an import that is only
/// needed for its side effects. A module without a body executes as a no-op.
#[derive(Default)]
pub struct Registration {
  pub dependencies: Vec<String>,
  pub setters: Vec<Option<Box<dyn Setter>>>,
  pub execute: Option<Box<dyn Execute>>,
}

impl Registration {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_dependency(mut self, specifier: impl Into<String>, setter: impl Setter + 'static) -> Self {
    self.dependencies.push(specifier.into());
    self.setters.push(Some(Box::new(setter)));
    self
  }

  pub fn with_side_effect_dependency(mut self, specifier: impl Into<String>) -> Self {
    self.dependencies.push(specifier.into());
    self.setters.push(None);
    self
  }

  pub fn with_execute(mut self, body: impl Execute + 'static) -> Self {
    self.execute = Some(Box::new(body));
    self
  }

  /// A body that completes synchronously.
  pub fn with_sync_execute(self, body: impl FnOnce() -> anyhow::Result<()> + 'static) -> Self {
    self.with_execute(move || future::ready(body()))
  }
}

impl fmt::Debug for Registration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registration")
      .field("dependencies", &self.dependencies)
      .field("setters", &self.setters.iter().map(Option::is_some).collect::<Vec<_>>())
      .field("execute", &self.execute.is_some())
      .finish()
  }
}

/// Per-module handle given to the host at instantiation.
///
/// It only holds a weak reference to the loader, so module code that keeps it around does not keep
/// the loader alive.
#[derive(Clone)]
pub struct ModuleContext {
  url: Url,
  referrer: Option<Url>,
  exporter: Exporter,
  loader: Weak<LoaderState>,
}

impl ModuleContext {
  pub(crate) fn new(url: Url, referrer: Option<Url>, exporter: Exporter, loader: Weak<LoaderState>) -> Self {
    Self {
      url,
      referrer,
      exporter,
      loader,
    }
  }

  pub fn url(&self) -> &Url {
    &self.url
  }

  /// The module whose import first created this module, if any.
  pub fn referrer(&self) -> Option<&Url> {
    self.referrer.as_ref()
  }

  pub fn exporter(&self) -> &Exporter {
    &self.exporter
  }

  pub fn export(&self, name: impl Into<String>, value: impl Into<Value>) {
    self.exporter.export(name, value);
  }

  /// Resolves `specifier` relative to this module (`import.meta.resolve`).
  pub fn resolve(&self, specifier: &str) -> Result<Url, LoaderError> {
    match self.loader.upgrade() {
      Some(state) => Loader::from_state(state).resolve(specifier, Some(&self.url)),
      None => Err(LoaderError::LoaderDropped),
    }
  }

  /// Dynamically imports `specifier` relative to this module.
  pub fn import(&self, specifier: &str) -> LocalBoxFuture<'static, Result<Namespace, LoaderError>> {
    match self.loader.upgrade() {
      Some(state) => Loader::from_state(state).import(specifier, Some(&self.url)),
      None => future::ready(Err(LoaderError::LoaderDropped)).boxed_local(),
    }
  }
}

impl fmt::Debug for ModuleContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ModuleContext")
      .field("url", &self.url.as_str())
      .field("referrer", &self.referrer.as_ref().map(Url::as_str))
      .finish()
  }
}

/// Retrieves module source text.
pub trait Fetch {
  fn fetch(&self, url: &Url) -> LocalBoxFuture<'static, anyhow::Result<String>>;
}

/// Turns fetched source text into a registration.
pub trait Transform {
  fn instantiate_from_source(&self, source: String, context: &ModuleContext) -> anyhow::Result<Registration>;
}

/// A [`ModuleHost`] built from a [`Fetch`] and a [`Transform`].
pub struct PipelineHost<F, T> {
  fetch: F,
  transform: Rc<T>,
}

impl<F: Fetch, T: Transform + 'static> PipelineHost<F, T> {
  pub fn new(fetch: F, transform: T) -> Self {
    Self {
      fetch,
      transform: Rc::new(transform),
    }
  }
}

impl<F: Fetch, T: Transform + 'static> ModuleHost for PipelineHost<F, T> {
  fn instantiate(&self, context: ModuleContext) -> LocalBoxFuture<'static, anyhow::Result<Registration>> {
    let source = self.fetch.fetch(context.url());
    let transform = Rc::clone(&self.transform);
    async move {
      let source = source
        .await
        .with_context(|| format!("failed to fetch {}", context.url()))?;
      tracing::trace!(module = %context.url(), bytes = source.len(), "fetched");
      transform.instantiate_from_source(source, &context)
    }
    .boxed_local()
  }
}
