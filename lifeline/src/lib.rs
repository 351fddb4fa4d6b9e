//! Single-instance guard for scheduled jobs.
//!
//! A job wrapped in [`guard::LifelineGuard`] only runs when no other process
//! in the live process table has exactly the same command line. The
//! [`binder::TaskBinder`] exposes that as the `<ns>:run`, `<ns>:lifeline` and
//! `<ns>:terminate` tasks of a [`registry::TaskRegistry`].

pub mod binder;
pub mod config;
pub mod config_manager;
pub mod core_logic;
pub mod daemon_handler;
pub mod guard;
pub mod job;
pub mod logger;
pub mod registry;
pub mod scheduler;
pub mod signal_handler;
pub mod snapshot;
pub mod terminate;

pub use lifeline_common::{ProcessEntry, ProcessSnapshot};
