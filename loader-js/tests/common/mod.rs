#![allow(dead_code)]

use anyhow::anyhow;
use futures::future;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use loader_js::Loader;
use loader_js::LoaderOptions;
use loader_js::ModuleContext;
use loader_js::ModuleHost;
use loader_js::Registration;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use url::Url;

pub const BASE: &str = "file:///app/";

type Define = Rc<dyn Fn(&ModuleContext) -> anyhow::Result<Registration>>;

/// In-memory modules keyed by URL, plus a shared event log.
#[derive(Clone, Default)]
pub struct MemoryHost {
  modules: Rc<RefCell<HashMap<String, Define>>>,
  log: Rc<RefCell<Vec<String>>>,
  instantiations: Rc<RefCell<Vec<String>>>,
}

impl MemoryHost {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn module(
    &self,
    url: &str,
    define: impl Fn(&ModuleContext) -> anyhow::Result<Registration> + 'static,
  ) {
    self.modules.borrow_mut().insert(url.to_string(), Rc::new(define));
  }

  /// A module that depends on `dependencies` for their side effects and logs its name when it runs.
  pub fn logging_module(&self, url: &str, dependencies: &[&str]) {
    let name = name_of(url);
    let dependencies: Vec<String> = dependencies.iter().map(|d| d.to_string()).collect();
    let log = self.log.clone();
    self.module(url, move |_| {
      let mut registration = Registration::new();
      for dependency in &dependencies {
        registration = registration.with_side_effect_dependency(dependency.clone());
      }
      let log = log.clone();
      let name = name.clone();
      Ok(registration.with_sync_execute(move || {
        log.borrow_mut().push(name);
        Ok(())
      }))
    });
  }

  pub fn log_handle(&self) -> Rc<RefCell<Vec<String>>> {
    self.log.clone()
  }

  pub fn log(&self) -> Vec<String> {
    self.log.borrow().clone()
  }

  pub fn instantiations(&self) -> Vec<String> {
    self.instantiations.borrow().clone()
  }
}

impl ModuleHost for MemoryHost {
  fn instantiate(&self, context: ModuleContext) -> LocalBoxFuture<'static, anyhow::Result<Registration>> {
    let url = context.url().to_string();
    self.instantiations.borrow_mut().push(url.clone());
    let define = self.modules.borrow().get(&url).cloned();
    let result = match define {
      Some(define) => define(&context),
      None => Err(anyhow!("no module at {url}")),
    };
    future::ready(result).boxed_local()
  }
}

/// `file:///app/dir/name.js` → `name`.
pub fn name_of(url: &str) -> String {
  let file = url.rsplit('/').next().unwrap_or(url);
  file.trim_end_matches(".js").to_string()
}

pub fn url(s: &str) -> Url {
  Url::parse(s).unwrap()
}

pub fn app(path: &str) -> Url {
  url(BASE).join(path).unwrap()
}

pub fn loader(host: &MemoryHost) -> Loader {
  Loader::new(LoaderOptions::new(url(BASE)), host.clone())
}
