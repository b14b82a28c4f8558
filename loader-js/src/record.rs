use crate::error::LoaderError;
use crate::host::Execute;
use crate::host::SetterHandle;
use crate::namespace::Namespace;
use futures::future;
use futures::future::LocalBoxFuture;
use futures::future::Shared;
use futures::FutureExt;
use serde::Serialize;
use std::fmt;
use url::Url;

/// A cached, shareable completion of one loading phase of a record.
pub(crate) type Completion = Shared<LocalBoxFuture<'static, Result<(), LoaderError>>>;

pub(crate) fn ready_completion() -> Completion {
  future::ready(Ok(())).boxed_local().shared()
}

/// Arena handle of a module record. Only meaningful to the registry that issued it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ModuleId(u32);

impl ModuleId {
  pub(crate) fn from_index(index: usize) -> Self {
    Self(index as u32)
  }

  pub(crate) fn index(self) -> usize {
    self.0 as usize
  }
}

impl fmt::Debug for ModuleId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("ModuleId").field(&self.0).finish()
  }
}

/// Lifecycle of a module record.
///
/// `Unlinked → Instantiating → Linked → Executing → Executed`, or `Failed` from any state except
/// `Executed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
  #[default]
  Unlinked,
  Instantiating,
  Linked,
  Executing,
  Executed,
  Failed,
}

impl ModuleState {
  pub const fn as_str(&self) -> &'static str {
    match self {
      ModuleState::Unlinked => "unlinked",
      ModuleState::Instantiating => "instantiating",
      ModuleState::Linked => "linked",
      ModuleState::Executing => "executing",
      ModuleState::Executed => "executed",
      ModuleState::Failed => "failed",
    }
  }
}

impl fmt::Display for ModuleState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

pub(crate) struct ModuleRecord {
  pub url: Url,
  pub first_referrer: Option<Url>,
  pub namespace: Namespace,
  pub state: ModuleState,
  pub error: Option<LoaderError>,
  /// Set once the module has exported anything, hoisted or not.
  pub has_hoisted_exports: bool,

  pub dependency_specifiers: Vec<String>,
  /// Setters from the registration, parallel to `dependency_specifiers` until linking registers
  /// them with the dependencies.
  pub pending_setters: Vec<Option<SetterHandle>>,
  pub dependency_ids: Vec<ModuleId>,
  /// Setters this record registered with each of its dependencies, parallel to `dependency_ids`.
  pub dependency_setters: Vec<Option<SetterHandle>>,
  /// Setters dependents registered with this record.
  pub importer_setters: Vec<SetterHandle>,

  /// Taken on first execution.
  pub execute: Option<Box<dyn Execute>>,

  pub instantiated: Completion,
  pub linked: Completion,
  /// Pending execution of a body that did not finish on its first poll, or that waits on one.
  pub evaluated: Option<Completion>,
  pub top_level: Option<Completion>,
}

impl ModuleRecord {
  pub fn new(url: Url, first_referrer: Option<Url>) -> Self {
    Self {
      url,
      first_referrer,
      namespace: Namespace::default(),
      state: ModuleState::Unlinked,
      error: None,
      has_hoisted_exports: false,
      dependency_specifiers: Vec::new(),
      pending_setters: Vec::new(),
      dependency_ids: Vec::new(),
      dependency_setters: Vec::new(),
      importer_setters: Vec::new(),
      execute: None,
      instantiated: ready_completion(),
      linked: ready_completion(),
      evaluated: None,
      top_level: None,
    }
  }

  /// Marks the record as failed with `error`.
  ///
  /// Executed records are never rolled back, and a record that already failed keeps its first
  /// error. Returns the error the record now carries (if it failed).
  pub fn poison(&mut self, error: &LoaderError) -> Option<LoaderError> {
    match self.state {
      ModuleState::Executed => None,
      ModuleState::Failed => self.error.clone(),
      _ => {
        tracing::debug!(module = %self.url, from = %self.state, error = %error, "module failed");
        self.state = ModuleState::Failed;
        self.error = Some(error.clone());
        self.execute = None;
        self.pending_setters.clear();
        self.error.clone()
      }
    }
  }

  pub fn transition(&mut self, to: ModuleState) {
    if self.state == to || self.state == ModuleState::Failed {
      return;
    }
    tracing::debug!(module = %self.url, from = %self.state, to = %to, "module state");
    self.state = to;
  }
}
