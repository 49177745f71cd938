//! relgraph-lib: the release target engine
//!
//! This crate provides the pieces a release run is built from:
//! - `Target`/`TargetRegistry`: named units of work with declared prerequisites
//! - `Gate`: platform and environment predicates that decide run vs skip
//! - `Resolver`: turns requested roots into an ordered, de-duplicated plan
//! - `Executor`: runs a plan once, sharing a `BuildContext` between targets
//! - `release`: the init/compile/package/publish catalog

pub mod config;
pub mod context;
pub mod execute;
pub mod gate;
pub mod platform;
pub mod process;
pub mod release;
pub mod target;
