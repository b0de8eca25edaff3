//! # Subsystem specification.
//!
//! [`SubsystemSpec`] bundles a subsystem implementation with its launch
//! metadata: the dependency list and the criticality policy. Dependencies
//! are declared here, once, at construction: readiness checks never
//! register them as a side effect.
//!
//! ## Rules
//! - Dependencies may only name subsystems that appear **earlier** in the
//!   spec list handed to the orchestrator (registration order constrains the
//!   graph to a DAG).
//! - `critical` subsystems abort the whole launch when they fail; optional
//!   ones are logged and skipped.

use super::subsystem::SubsystemRef;

/// Specification for running a subsystem under the orchestrator.
#[derive(Clone)]
pub struct SubsystemSpec {
    subsystem: SubsystemRef,
    dependencies: Vec<String>,
    critical: bool,
}

impl SubsystemSpec {
    /// Creates a spec with no dependencies, marked optional.
    pub fn new(subsystem: SubsystemRef) -> Self {
        Self {
            subsystem,
            dependencies: Vec::new(),
            critical: false,
        }
    }

    /// Declares one dependency that must be `Running` before this subsystem
    /// may start.
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
        self
    }

    /// Marks this subsystem as critical: a failed launch aborts startup.
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// The subsystem implementation.
    pub fn subsystem(&self) -> &SubsystemRef {
        &self.subsystem
    }

    /// Convenience: the subsystem name.
    pub fn name(&self) -> &str {
        self.subsystem.name()
    }

    /// Declared dependencies, in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Whether a failed launch of this subsystem aborts startup.
    pub fn is_critical(&self) -> bool {
        self.critical
    }
}
