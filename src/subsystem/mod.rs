//! Subsystem contract: lifecycle trait, readiness protocol, spec, context.

mod context;
mod readiness;
mod spec;
#[allow(clippy::module_inception)]
mod subsystem;

pub(crate) use context::MainTaskSlot;

pub use context::SubsystemContext;
pub use readiness::{Readiness, ReadinessPhase, ReadinessResults};
pub use spec::SubsystemSpec;
pub use subsystem::{Subsystem, SubsystemRef};
