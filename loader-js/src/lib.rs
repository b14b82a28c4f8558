//! A registry-backed, cycle-tolerant module loader.
//!
//! [`Loader::import`] resolves a specifier (through an import map when one is configured), then
//! drives every module reachable from it through instantiation, linking and execution:
//!
//! 1. **Instantiation** asks the [`ModuleHost`] for a [`Registration`]: the module's dependency
//!    specifiers, a [`Setter`] per dependency and the module body.
//! 2. **Linking** resolves each dependency, waits for it to be instantiated (never for it to be
//!    linked, which is what lets cycles through) and registers the setter with it.
//! 3. **Execution** runs bodies depth first so that dependencies run before their dependents.
//!    Inside a cycle, whichever member was reached first runs last and the others observe its
//!    bindings as they appear.
//!
//! Bindings are live: modules publish them through their [`Exporter`], and every change is pushed
//! to the setters of importing modules. A module body may suspend; anything depending on it waits,
//! while unrelated modules keep going.
//!
//! Failures poison the failing module and the modules that depend on it. A poisoned module keeps
//! its error for the lifetime of the loader.

mod config;
mod error;
mod export;
mod host;
mod loader;
mod namespace;
mod record;
mod registry;
pub mod transport;
mod value;

pub use crate::config::ConfigError;
pub use crate::config::LoaderConfig;
pub use crate::error::ErrorKind;
pub use crate::error::HostError;
pub use crate::error::LoaderError;
pub use crate::export::Exporter;
pub use crate::host::Execute;
pub use crate::host::Fetch;
pub use crate::host::ModuleContext;
pub use crate::host::ModuleHost;
pub use crate::host::PipelineHost;
pub use crate::host::Registration;
pub use crate::host::Setter;
pub use crate::host::Transform;
pub use crate::loader::Loader;
pub use crate::loader::LoaderOptions;
pub use crate::namespace::Namespace;
pub use crate::record::ModuleState;
pub use crate::value::Value;
pub use resolve_js;
pub use url::Url;
