use crate::error::LoaderError;
use crate::export::propagate;
use crate::export::Exporter;
use crate::export::Propagation;
use crate::host::Execute;
use crate::host::ModuleContext;
use crate::host::ModuleHost;
use crate::host::Registration;
use crate::host::SetterHandle;
use crate::namespace::Namespace;
use crate::record::ready_completion;
use crate::record::Completion;
use crate::record::ModuleId;
use crate::record::ModuleRecord;
use crate::record::ModuleState;
use crate::registry::Registry;
use crate::value::Value;
use ahash::HashSet;
use anyhow::anyhow;
use futures::future;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use resolve_js::Resolver;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::rc::Weak;
use tracing::Instrument;
use url::Url;

#[derive(Clone, Debug, Default)]
pub struct LoaderOptions {
  /// Referrer for imports that have none.
  pub base_url: Option<Url>,
  pub resolver: Resolver,
}

impl LoaderOptions {
  pub fn new(base_url: Url) -> Self {
    Self {
      base_url: Some(base_url),
      resolver: Resolver::new(),
    }
  }

  pub fn with_resolver(mut self, resolver: Resolver) -> Self {
    self.resolver = resolver;
    self
  }
}

pub(crate) struct LoaderState {
  pub options: LoaderOptions,
  pub host: Rc<dyn ModuleHost>,
  pub registry: RefCell<Registry>,
  pub propagation: RefCell<Propagation>,
}

/// A module loader with its own registry.
///
/// Every module URL is instantiated, linked and executed at most once per loader. Clones share the
/// same registry. The loader is single-threaded: futures it returns must be driven on one thread,
/// and nothing is loaded unless they are polled.
#[derive(Clone)]
pub struct Loader {
  state: Rc<LoaderState>,
}

impl Loader {
  pub fn new(options: LoaderOptions, host: impl ModuleHost + 'static) -> Self {
    Self {
      state: Rc::new(LoaderState {
        options,
        host: Rc::new(host),
        registry: RefCell::new(Registry::default()),
        propagation: RefCell::new(Propagation::default()),
      }),
    }
  }

  pub(crate) fn from_state(state: Rc<LoaderState>) -> Self {
    Self { state }
  }

  pub fn options(&self) -> &LoaderOptions {
    &self.state.options
  }

  /// Resolves `specifier` against `referrer`, or against the base URL when there is no referrer.
  pub fn resolve(&self, specifier: &str, referrer: Option<&Url>) -> Result<Url, LoaderError> {
    resolve(&self.state, specifier, referrer)
  }

  /// Loads `specifier` and everything it depends on, executes the graph in dependency order, and
  /// returns the module's namespace.
  ///
  /// Concurrent and repeated imports of a module share its in-flight or cached result. Dropping the
  /// returned future does not cancel anything; a later import picks up where it left off.
  pub fn import(
    &self,
    specifier: &str,
    referrer: Option<&Url>,
  ) -> LocalBoxFuture<'static, Result<Namespace, LoaderError>> {
    let span = tracing::debug_span!("import", %specifier, referrer = referrer.map(Url::as_str));
    let started = span.in_scope(|| {
      let url = resolve(&self.state, specifier, referrer)?;
      let id = get_or_create(&self.state, url, referrer);
      top_level(&self.state, id)
    });
    match started {
      Ok((namespace, completion)) => async move {
        completion.await?;
        Ok::<_, LoaderError>(namespace)
      }
      .instrument(span)
      .boxed_local(),
      Err(err) => future::ready(Err(err)).boxed_local(),
    }
  }

  pub fn has(&self, url: &Url) -> bool {
    self.state.registry.borrow().lookup(url).is_some()
  }

  /// The namespace of the module registered under `url`, once it has executed.
  pub fn get(&self, url: &Url) -> Option<Namespace> {
    let registry = self.state.registry.borrow();
    let record = registry.lookup_record(url)?;
    (record.state == ModuleState::Executed).then(|| record.namespace.clone())
  }

  pub fn state(&self, url: &Url) -> Option<ModuleState> {
    let registry = self.state.registry.borrow();
    registry.lookup_record(url).map(|record| record.state)
  }

  /// The error a failed module is poisoned with.
  pub fn error(&self, url: &Url) -> Option<LoaderError> {
    let registry = self.state.registry.borrow();
    registry.lookup_record(url).and_then(|record| record.error.clone())
  }

  /// Every registered module and its state, in registration order.
  pub fn entries(&self) -> Vec<(Url, ModuleState)> {
    let registry = self.state.registry.borrow();
    registry
      .registered()
      .map(|record| (record.url.clone(), record.state))
      .collect()
  }

  /// Registers an already-executed module with fixed exports, replacing any module registered
  /// under `url`.
  pub fn define<N: Into<String>>(
    &self,
    url: Url,
    exports: impl IntoIterator<Item = (N, Value)>,
  ) -> Namespace {
    self.delete(&url);
    let mut record = ModuleRecord::new(url, None);
    for (name, value) in exports {
      record.namespace.write(name.into(), value);
    }
    record.has_hoisted_exports = true;
    record.state = ModuleState::Executed;
    let namespace = record.namespace.clone();
    tracing::debug!(module = %record.url, exports = namespace.len(), "defined module");
    self.state.registry.borrow_mut().insert(record);
    namespace
  }

  /// Removes the module registered under `url` so that the next import creates a fresh record.
  ///
  /// Modules that already linked against the old record keep it. Returns whether a module was
  /// registered.
  pub fn delete(&self, url: &Url) -> bool {
    let mut registry = self.state.registry.borrow_mut();
    let Some(id) = registry.detach(url) else {
      return false;
    };
    let record = registry.record_mut(id);
    let dependencies = record.dependency_ids.clone();
    let setters = std::mem::take(&mut record.dependency_setters);
    for (dependency, setter) in dependencies.into_iter().zip(setters) {
      if let Some(setter) = setter {
        registry
          .record_mut(dependency)
          .importer_setters
          .retain(|registered| !Rc::ptr_eq(registered, &setter));
      }
    }
    tracing::debug!(module = %url, "deleted module");
    true
  }
}

impl fmt::Debug for Loader {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Loader")
      .field("options", &self.state.options)
      .field("modules", &self.entries())
      .finish()
  }
}

fn upgrade(loader: &Weak<LoaderState>) -> Result<Rc<LoaderState>, LoaderError> {
  loader.upgrade().ok_or(LoaderError::LoaderDropped)
}

fn resolve(state: &LoaderState, specifier: &str, referrer: Option<&Url>) -> Result<Url, LoaderError> {
  let referrer = referrer.or(state.options.base_url.as_ref());
  state
    .options
    .resolver
    .resolve(specifier, referrer)
    .map_err(|source| LoaderError::Resolution {
      specifier: specifier.to_string(),
      referrer: referrer.cloned(),
      source,
    })
}

/// Poisons the record and returns the error it now carries.
fn fail(state: &LoaderState, id: ModuleId, error: LoaderError) -> LoaderError {
  let mut registry = state.registry.borrow_mut();
  let poisoned = registry.record_mut(id).poison(&error);
  poisoned.unwrap_or(error)
}

/// Looks up the record for `url`, creating it (with its instantiation and linking scheduled) if it
/// does not exist yet.
fn get_or_create(state: &Rc<LoaderState>, url: Url, referrer: Option<&Url>) -> ModuleId {
  let mut registry = state.registry.borrow_mut();
  if let Some(id) = registry.lookup(&url) {
    return id;
  }

  tracing::debug!(module = %url, referrer = referrer.map(Url::as_str), "registering module");
  let id = registry.insert(ModuleRecord::new(url, referrer.cloned()));
  let loader = Rc::downgrade(state);
  let instantiated = instantiate(loader.clone(), id).boxed_local().shared();
  let linked = link(loader, id, instantiated.clone()).boxed_local().shared();
  let record = registry.record_mut(id);
  record.instantiated = instantiated;
  record.linked = linked;
  id
}

fn top_level(state: &Rc<LoaderState>, id: ModuleId) -> Result<(Namespace, Completion), LoaderError> {
  let mut registry = state.registry.borrow_mut();
  let record = registry.record_mut(id);
  if let Some(err) = &record.error {
    return Err(err.clone());
  }
  let namespace = record.namespace.clone();
  if record.state == ModuleState::Executed {
    return Ok((namespace, ready_completion()));
  }
  let completion = record
    .top_level
    .get_or_insert_with(|| evaluate(Rc::downgrade(state), id).boxed_local().shared())
    .clone();
  Ok((namespace, completion))
}

fn validate(registration: Registration) -> anyhow::Result<Registration> {
  if registration.setters.len() != registration.dependencies.len() {
    return Err(anyhow!(
      "registration lists {} dependencies but {} setters",
      registration.dependencies.len(),
      registration.setters.len()
    ));
  }
  Ok(registration)
}

/// Asks the host for the module's registration.
async fn instantiate(loader: Weak<LoaderState>, id: ModuleId) -> Result<(), LoaderError> {
  let (pending, url, referrer) = {
    let state = upgrade(&loader)?;
    let context = {
      let mut registry = state.registry.borrow_mut();
      let record = registry.record_mut(id);
      if let Some(err) = &record.error {
        return Err(err.clone());
      }
      record.transition(ModuleState::Instantiating);
      ModuleContext::new(
        record.url.clone(),
        record.first_referrer.clone(),
        Exporter::new(loader.clone(), id),
        loader.clone(),
      )
    };
    let url = context.url().clone();
    let referrer = context.referrer().cloned();
    (state.host.instantiate(context), url, referrer)
  };

  let registration = pending.await.and_then(validate);

  let state = upgrade(&loader)?;
  let registration = match registration {
    Ok(registration) => registration,
    Err(err) => {
      let err = LoaderError::instantiation(&url, referrer.as_ref(), err);
      return Err(fail(&state, id, err));
    }
  };

  let mut registry = state.registry.borrow_mut();
  let record = registry.record_mut(id);
  if let Some(err) = &record.error {
    return Err(err.clone());
  }
  tracing::debug!(
    module = %url,
    dependencies = registration.dependencies.len(),
    "instantiated"
  );
  record.dependency_specifiers = registration.dependencies;
  record.pending_setters = registration
    .setters
    .into_iter()
    .map(|setter| setter.map(|setter| Rc::new(RefCell::new(setter))))
    .collect();
  record.execute = registration.execute;
  Ok(())
}

/// Resolves the module's dependencies, waits for each to be instantiated (not linked, so cycles
/// cannot deadlock), and registers the module's setters with them.
async fn link(
  loader: Weak<LoaderState>,
  id: ModuleId,
  instantiated: Completion,
) -> Result<(), LoaderError> {
  instantiated.await?;

  let dependencies = {
    let state = upgrade(&loader)?;
    let (url, specifiers, setters) = {
      let mut registry = state.registry.borrow_mut();
      let record = registry.record_mut(id);
      if let Some(err) = &record.error {
        return Err(err.clone());
      }
      (
        record.url.clone(),
        record.dependency_specifiers.clone(),
        std::mem::take(&mut record.pending_setters),
      )
    };

    let mut dependencies = Vec::with_capacity(specifiers.len());
    for (specifier, setter) in specifiers.iter().zip(setters) {
      let dependency_url = match resolve(&state, specifier, Some(&url)) {
        Ok(dependency_url) => dependency_url,
        Err(err) => return Err(fail(&state, id, err)),
      };
      let dependency = get_or_create(&state, dependency_url, Some(&url));
      let instantiated = state.registry.borrow().record(dependency).instantiated.clone();
      dependencies.push((dependency, instantiated, setter));
    }
    dependencies
  };

  let results = future::join_all(
    dependencies
      .iter()
      .map(|(_, instantiated, _)| instantiated.clone()),
  )
  .await;

  let state = upgrade(&loader)?;
  // Nothing is registered unless every dependency instantiated.
  if let Some(err) = results.into_iter().find_map(Result::err) {
    return Err(fail(&state, id, err));
  }
  let mut dependency_ids = Vec::with_capacity(dependencies.len());
  let mut dependency_setters = Vec::with_capacity(dependencies.len());
  for (dependency, _, setter) in dependencies {
    if let Some(setter) = &setter {
      register_setter(&state, dependency, setter);
    }
    dependency_ids.push(dependency);
    dependency_setters.push(setter);
  }

  let mut registry = state.registry.borrow_mut();
  let record = registry.record_mut(id);
  record.dependency_ids = dependency_ids;
  record.dependency_setters = dependency_setters;
  record.transition(ModuleState::Linked);
  Ok(())
}

/// Registers `setter` with `dependency`, invoking it right away when the dependency already has
/// bindings to observe.
fn register_setter(state: &LoaderState, dependency: ModuleId, setter: &SetterHandle) {
  let namespace = {
    let mut registry = state.registry.borrow_mut();
    let record = registry.record_mut(dependency);
    record.importer_setters.push(Rc::clone(setter));
    if record.has_hoisted_exports || record.state == ModuleState::Executed {
      Some(record.namespace.clone())
    } else {
      tracing::trace!(module = %record.url, "imported namespace is still empty");
      None
    }
  };
  if let Some(namespace) = namespace {
    propagate(&state.propagation, vec![Rc::clone(setter)], &namespace);
  }
}

/// Links every record reachable from `id`. `seen` is shared by the whole walk.
fn link_all(
  loader: Weak<LoaderState>,
  id: ModuleId,
  seen: Rc<RefCell<HashSet<ModuleId>>>,
) -> LocalBoxFuture<'static, Result<(), LoaderError>> {
  async move {
    if !seen.borrow_mut().insert(id) {
      return Ok(());
    }

    let linked = {
      let state = upgrade(&loader)?;
      let registry = state.registry.borrow();
      let record = registry.record(id);
      if record.state == ModuleState::Executed {
        return Ok(());
      }
      if let Some(err) = &record.error {
        return Err(err.clone());
      }
      record.linked.clone()
    };
    linked.await?;

    let dependencies = {
      let state = upgrade(&loader)?;
      let registry = state.registry.borrow();
      registry.record(id).dependency_ids.clone()
    };
    let linking = dependencies
      .into_iter()
      .map(|dependency| link_all(loader.clone(), dependency, Rc::clone(&seen)));
    if let Err(err) = future::try_join_all(linking).await {
      let state = upgrade(&loader)?;
      return Err(fail(&state, id, err));
    }
    Ok(())
  }
  .boxed_local()
}

/// Executes `id` after its dependencies, depth first.
///
/// Records already visited by this walk are skipped, which is what breaks cycles: a cycle member
/// runs with whatever its not-yet-executed peers have exported so far. Returns the completion to
/// wait on when a body (this one or a dependency's) has not finished.
fn post_order_exec(
  state: &Rc<LoaderState>,
  id: ModuleId,
  seen: &mut HashSet<ModuleId>,
) -> Result<Option<Completion>, LoaderError> {
  if !seen.insert(id) {
    // Still on the stack (a cycle) unless it already deferred.
    let registry = state.registry.borrow();
    return Ok(registry.record(id).evaluated.clone());
  }

  let dependencies = {
    let registry = state.registry.borrow();
    let record = registry.record(id);
    if let Some(err) = &record.error {
      return Err(err.clone());
    }
    match record.state {
      ModuleState::Executed => return Ok(None),
      ModuleState::Executing => return Ok(record.evaluated.clone()),
      ModuleState::Unlinked | ModuleState::Instantiating => {
        tracing::debug!(module = %record.url, state = %record.state, "skipping unlinked module");
        return Ok(None);
      }
      ModuleState::Linked | ModuleState::Failed => {}
    }
    if let Some(evaluated) = &record.evaluated {
      return Ok(Some(evaluated.clone()));
    }
    record.dependency_ids.clone()
  };

  let mut pending = Vec::new();
  for dependency in dependencies {
    match post_order_exec(state, dependency, seen) {
      Ok(Some(completion)) => pending.push(completion),
      Ok(None) => {}
      Err(err) => return Err(fail(state, id, err)),
    }
  }

  if !pending.is_empty() {
    tracing::debug!(waiting_on = pending.len(), "deferring execution");
    let completion = execute_after(Rc::downgrade(state), id, pending)
      .boxed_local()
      .shared();
    state.registry.borrow_mut().record_mut(id).evaluated = Some(completion.clone());
    return Ok(Some(completion));
  }

  let body = {
    let mut registry = state.registry.borrow_mut();
    let record = registry.record_mut(id);
    record.transition(ModuleState::Executing);
    record.execute.take()
  };
  let completion = run_body(Rc::downgrade(state), id, body)
    .boxed_local()
    .shared();
  match completion.clone().now_or_never() {
    Some(result) => result.map(|()| None),
    None => {
      tracing::debug!("module body suspended");
      state.registry.borrow_mut().record_mut(id).evaluated = Some(completion.clone());
      Ok(Some(completion))
    }
  }
}

/// Runs the body once the deferred dependencies it waits on have finished.
async fn execute_after(
  loader: Weak<LoaderState>,
  id: ModuleId,
  pending: Vec<Completion>,
) -> Result<(), LoaderError> {
  if let Err(err) = future::try_join_all(pending).await {
    let state = upgrade(&loader)?;
    return Err(fail(&state, id, err));
  }
  let body = {
    let state = upgrade(&loader)?;
    let mut registry = state.registry.borrow_mut();
    let record = registry.record_mut(id);
    if let Some(err) = &record.error {
      return Err(err.clone());
    }
    record.transition(ModuleState::Executing);
    record.execute.take()
  };
  run_body(loader, id, body).await
}

async fn run_body(
  loader: Weak<LoaderState>,
  id: ModuleId,
  body: Option<Box<dyn Execute>>,
) -> Result<(), LoaderError> {
  let result = match body {
    Some(body) => body.execute().await,
    None => Ok(()),
  };

  let state = upgrade(&loader)?;
  let mut registry = state.registry.borrow_mut();
  let record = registry.record_mut(id);
  record.evaluated = None;
  match result {
    Ok(()) => {
      record.transition(ModuleState::Executed);
      Ok(())
    }
    Err(err) => {
      let err = LoaderError::execution(&record.url, record.first_referrer.as_ref(), err);
      let poisoned = record.poison(&err);
      Err(poisoned.unwrap_or(err))
    }
  }
}

/// Links and executes the graph rooted at `id`.
async fn evaluate(loader: Weak<LoaderState>, id: ModuleId) -> Result<(), LoaderError> {
  link_all(loader.clone(), id, Rc::default()).await?;
  let pending = {
    let state = upgrade(&loader)?;
    let mut seen = HashSet::default();
    post_order_exec(&state, id, &mut seen)?
  };
  if let Some(pending) = pending {
    pending.await?;
  }
  Ok(())
}
