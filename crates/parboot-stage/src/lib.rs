//! Staging half of parboot: payload, provisioner, handoff and the bootstrap
//! controller that ties them together.

pub mod bootstrap;
pub mod handoff;
pub mod launder;
pub mod payload;
pub mod provisioner;
pub mod runtime;
pub mod staging;

pub use bootstrap::{Bootstrap, LaunchContext, Phase};
pub use handoff::{platform_handoff, Handoff};
pub use provisioner::{ArchiveProvisioner, Provisioner, StagedDir};
pub use runtime::{EmbeddedRuntime, InterpreterRuntime};
