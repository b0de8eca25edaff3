//! # Go/No-Go readiness checks.
//!
//! A readiness check is a pure function answering one question (may this
//! subsystem proceed to its next lifecycle phase?) and producing a trace of
//! Go/No-Go lines for every precondition it evaluated, in evaluation order.
//!
//! ## Rules
//! - **No side effects.** A check may read registry state (is a dependency
//!   running?) but never mutates anything; dependency registration is a
//!   separate, explicit step at spec construction.
//! - **Short-circuit, keep the trace.** The first hard failure flips the
//!   verdict to No-Go and suppresses further precondition evaluation, but the
//!   lines collected so far are kept; callers log the trace regardless of
//!   outcome, to aid diagnosis.
//! - **Fresh every time.** Results are never cached.
//!
//! ## Trace shape
//! ```text
//!   Go:      dependency 'Network' running
//!   Go:      port 5000 within unprivileged range
//!   Decide:  Go For Launch of WebSocket Subsystem
//! ```

use std::fmt::Display;
use std::sync::Arc;

/// Lifecycle phase a readiness check gates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadinessPhase {
    /// Startup: `Inactive` -> `Running`.
    Launch,
    /// Shutdown: `Running` -> `Inactive`.
    Landing,
}

impl ReadinessPhase {
    fn verb(self) -> &'static str {
        match self {
            ReadinessPhase::Launch => "Launch",
            ReadinessPhase::Landing => "Landing",
        }
    }
}

/// Outcome of one subsystem's readiness check: verdict plus trace.
#[derive(Clone, Debug)]
pub struct Readiness {
    subsystem: Arc<str>,
    ready: bool,
    messages: Vec<String>,
}

impl Readiness {
    /// Starts a passing check with an empty trace.
    pub fn new(subsystem: impl Into<Arc<str>>) -> Self {
        Self {
            subsystem: subsystem.into(),
            ready: true,
            messages: Vec::new(),
        }
    }

    /// Evaluates one precondition.
    ///
    /// Appends a Go line when `ok`, otherwise a No-Go line and flips the
    /// verdict. Once the verdict is No-Go, further preconditions are skipped
    /// (short-circuit) while the collected trace is preserved.
    pub fn require(mut self, ok: bool, go: impl Display, no_go: impl Display) -> Self {
        if !self.ready {
            return self;
        }
        if ok {
            self.messages.push(format!("  Go:      {go}"));
        } else {
            self.ready = false;
            self.messages.push(format!("  No-Go:   {no_go}"));
        }
        self
    }

    /// Appends an unconditional Go line (informational precondition).
    pub fn go(mut self, msg: impl Display) -> Self {
        if self.ready {
            self.messages.push(format!("  Go:      {msg}"));
        }
        self
    }

    /// Appends a No-Go line and flips the verdict.
    pub fn no_go(mut self, msg: impl Display) -> Self {
        if self.ready {
            self.ready = false;
            self.messages.push(format!("  No-Go:   {msg}"));
        }
        self
    }

    /// Folds another check's outcome into this one.
    ///
    /// Respects the short-circuit rule: once this check is No-Go, the other
    /// trace is not appended.
    pub fn merge(mut self, other: Readiness) -> Self {
        if !self.ready {
            return self;
        }
        self.ready = other.ready;
        self.messages.extend(other.messages);
        self
    }

    /// Appends the final Decide line for the given phase.
    pub fn decided(mut self, phase: ReadinessPhase) -> Self {
        let verdict = if self.ready { "Go" } else { "No-Go" };
        self.messages.push(format!(
            "  Decide:  {verdict} For {} of {} Subsystem",
            phase.verb(),
            self.subsystem
        ));
        self
    }

    /// Subsystem this check belongs to.
    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    /// Final verdict.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Trace lines in evaluation order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

/// Aggregated verdicts across all subsystems of one readiness phase.
#[derive(Debug, Default)]
pub struct ReadinessResults {
    /// Per-subsystem verdicts in evaluation order.
    pub results: Vec<(Arc<str>, bool)>,
    /// Total checks performed.
    pub total_checked: usize,
    /// Checks that returned Go.
    pub total_ready: usize,
    /// Checks that returned No-Go.
    pub total_not_ready: usize,
    /// True if at least one check returned Go.
    pub any_ready: bool,
}

impl ReadinessResults {
    /// Records one subsystem's verdict.
    pub fn record(&mut self, subsystem: Arc<str>, ready: bool) {
        self.results.push((subsystem, ready));
        self.total_checked += 1;
        if ready {
            self.total_ready += 1;
            self.any_ready = true;
        } else {
            self.total_not_ready += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_go_produces_go_decision() {
        let r = Readiness::new("WebServer")
            .require(true, "network available", "network unavailable")
            .require(true, "port free", "port taken")
            .decided(ReadinessPhase::Launch);
        assert!(r.is_ready());
        assert_eq!(r.messages().len(), 3);
        assert!(r.messages()[2].contains("Go For Launch of WebServer Subsystem"));
    }

    #[test]
    fn short_circuits_but_keeps_partial_trace() {
        let r = Readiness::new("WebServer")
            .require(true, "config loaded", "config missing")
            .require(false, "unused", "port taken")
            .require(true, "never evaluated", "never evaluated")
            .decided(ReadinessPhase::Launch);
        assert!(!r.is_ready());
        // Go line, No-Go line, Decide line; the third precondition was skipped.
        assert_eq!(r.messages().len(), 3);
        assert!(r.messages()[0].starts_with("  Go:"));
        assert!(r.messages()[1].starts_with("  No-Go:"));
        assert!(r.messages()[2].contains("No-Go For Launch"));
    }

    #[test]
    fn merge_respects_short_circuit() {
        let own = Readiness::new("Print").go("queue allocated");
        let r = Readiness::new("Print")
            .no_go("dependency 'Logging' not running")
            .merge(own);
        assert!(!r.is_ready());
        assert_eq!(r.messages().len(), 1);
    }

    #[test]
    fn results_aggregate() {
        let mut results = ReadinessResults::default();
        results.record("A".into(), true);
        results.record("B".into(), false);
        assert_eq!(results.total_checked, 2);
        assert_eq!(results.total_ready, 1);
        assert_eq!(results.total_not_ready, 1);
        assert!(results.any_ready);
    }
}
