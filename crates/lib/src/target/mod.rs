//! Target declarations and the registry that catalogs them.
//!
//! Targets are declared with direct registration calls at startup:
//!
//! ```
//! use relgraph_lib::gate::Gate;
//! use relgraph_lib::platform::BuildPlatform;
//! use relgraph_lib::target::{Target, TargetRegistry};
//!
//! let mut registry = TargetRegistry::new();
//! registry.register(Target::new("Init", |_| Ok(()))).unwrap();
//! registry
//!   .register(
//!     Target::new("Package", |_| Ok(()))
//!       .depends_on(["Init"])
//!       .gated(Gate::platforms([BuildPlatform::Linux])),
//!   )
//!   .unwrap();
//!
//! assert_eq!(registry.all_names(), vec!["Init", "Package"]);
//! ```

pub mod registry;
pub mod types;

pub use registry::{RegistryError, TargetRegistry};
pub use types::{Target, TargetContext, TargetError, TargetSummary};
