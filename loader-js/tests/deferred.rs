mod common;

use common::app;
use common::loader;
use common::MemoryHost;
use futures::channel::oneshot;
use futures::executor::block_on;
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use futures::FutureExt;
use loader_js::ErrorKind;
use loader_js::Loader;
use loader_js::LoaderError;
use loader_js::ModuleContext;
use loader_js::ModuleState;
use loader_js::Namespace;
use loader_js::Registration;
use std::cell::RefCell;
use std::rc::Rc;

type Outcome = Rc<RefCell<Option<Result<Namespace, LoaderError>>>>;

/// `s.js` waits for the returned sender before logging. `main.js` depends on `a.js` (which
/// depends on `s.js`) as well as on `t.js` and `u.js`.
fn suspended_graph(host: &MemoryHost) -> oneshot::Sender<()> {
  let (tx, rx) = oneshot::channel::<()>();
  let rx = Rc::new(RefCell::new(Some(rx)));
  let log = host.log_handle();
  host.module("file:///app/s.js", move |_: &ModuleContext| {
    let rx = rx.borrow_mut().take();
    let log = log.clone();
    Ok(Registration::new().with_execute(move || async move {
      if let Some(rx) = rx {
        rx.await?;
      }
      log.borrow_mut().push("s".to_string());
      Ok::<_, anyhow::Error>(())
    }))
  });
  host.logging_module("file:///app/a.js", &["./s.js"]);
  host.logging_module("file:///app/t.js", &[]);
  host.logging_module("file:///app/u.js", &[]);
  host.logging_module("file:///app/main.js", &["./a.js", "./t.js", "./u.js"]);
  tx
}

fn spawn_import(pool: &LocalPool, loader: &Loader, specifier: &str) -> Outcome {
  let outcome: Outcome = Rc::default();
  let import = loader.import(specifier, None);
  let slot = outcome.clone();
  pool
    .spawner()
    .spawn_local(async move {
      *slot.borrow_mut() = Some(import.await);
    })
    .unwrap();
  outcome
}

#[test]
fn suspended_body_defers_only_its_dependents() {
  let host = MemoryHost::new();
  let tx = suspended_graph(&host);
  let loader = loader(&host);
  let mut pool = LocalPool::new();

  let outcome = spawn_import(&pool, &loader, "./main.js");
  pool.run_until_stalled();

  assert!(outcome.borrow().is_none());
  assert_eq!(host.log(), ["t", "u"]);
  assert_eq!(loader.state(&app("s.js")), Some(ModuleState::Executing));
  assert_eq!(loader.state(&app("a.js")), Some(ModuleState::Linked));
  assert_eq!(loader.state(&app("main.js")), Some(ModuleState::Linked));
  assert!(loader.get(&app("t.js")).is_some());

  // Unrelated imports are not held up.
  block_on(loader.import("./t.js", None)).unwrap();

  tx.send(()).unwrap();
  pool.run_until_stalled();

  assert!(matches!(*outcome.borrow(), Some(Ok(_))));
  assert_eq!(host.log(), ["t", "u", "s", "a", "main"]);
  assert_eq!(loader.state(&app("main.js")), Some(ModuleState::Executed));
}

#[test]
fn waiters_on_a_suspended_module_share_its_completion() {
  let host = MemoryHost::new();
  let tx = suspended_graph(&host);
  let loader = loader(&host);
  let mut pool = LocalPool::new();

  let main = spawn_import(&pool, &loader, "./main.js");
  let a = spawn_import(&pool, &loader, "./a.js");
  pool.run_until_stalled();
  assert!(main.borrow().is_none());
  assert!(a.borrow().is_none());

  tx.send(()).unwrap();
  pool.run_until_stalled();

  assert!(matches!(*main.borrow(), Some(Ok(_))));
  assert!(matches!(*a.borrow(), Some(Ok(_))));
  assert_eq!(
    host.log().iter().filter(|name| *name == "s").count(),
    1
  );
}

#[test]
fn abandoned_import_resumes_on_next_import() {
  let host = MemoryHost::new();
  let tx = suspended_graph(&host);
  let loader = loader(&host);

  assert!(loader.import("./main.js", None).now_or_never().is_none());
  assert_eq!(host.log(), ["t", "u"]);

  tx.send(()).unwrap();
  block_on(loader.import("./main.js", None)).unwrap();
  assert_eq!(host.log(), ["t", "u", "s", "a", "main"]);
}

#[test]
fn rejected_suspension_fails_dependents() {
  let host = MemoryHost::new();
  let tx = suspended_graph(&host);
  let loader = loader(&host);
  let mut pool = LocalPool::new();

  let outcome = spawn_import(&pool, &loader, "./main.js");
  pool.run_until_stalled();
  drop(tx);
  pool.run_until_stalled();

  let err = match outcome.borrow_mut().take() {
    Some(Err(err)) => err,
    other => panic!("expected a failure, got {other:?}"),
  };
  assert_eq!(err.kind(), ErrorKind::Execution);
  assert_eq!(err.module(), Some(&app("s.js")));
  assert_eq!(host.log(), ["t", "u"]);
  assert_eq!(loader.state(&app("a.js")), Some(ModuleState::Failed));
  assert_eq!(loader.state(&app("main.js")), Some(ModuleState::Failed));
  assert_eq!(loader.state(&app("t.js")), Some(ModuleState::Executed));
}

#[test]
fn shared_suspended_dependency_holds_back_every_dependent() {
  let host = MemoryHost::new();
  let (tx, rx) = oneshot::channel::<()>();
  let rx = Rc::new(RefCell::new(Some(rx)));
  let log = host.log_handle();
  host.module("file:///app/c.js", move |_: &ModuleContext| {
    let rx = rx.borrow_mut().take();
    let log = log.clone();
    Ok(Registration::new().with_execute(move || async move {
      if let Some(rx) = rx {
        rx.await?;
      }
      log.borrow_mut().push("c".to_string());
      Ok::<_, anyhow::Error>(())
    }))
  });
  host.logging_module("file:///app/a.js", &["./c.js", "./b.js"]);
  host.logging_module("file:///app/b.js", &["./c.js"]);

  let loader = loader(&host);
  let mut pool = LocalPool::new();
  let outcome = spawn_import(&pool, &loader, "./a.js");
  pool.run_until_stalled();

  assert!(outcome.borrow().is_none());
  assert!(host.log().is_empty());
  assert_eq!(loader.state(&app("b.js")), Some(ModuleState::Linked));

  tx.send(()).unwrap();
  pool.run_until_stalled();

  assert!(matches!(*outcome.borrow(), Some(Ok(_))));
  assert_eq!(host.log(), ["c", "b", "a"]);
}
