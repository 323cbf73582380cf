//! Compute backends: where the 8-way rule lookup actually runs.
//!
//! Every backend implements the same ring-wraparound step as
//! [`next_row`](crate::generation::next_row); the sequencer never needs to know
//! which one produced a row.

use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::generation::{next_row, Row};
use crate::rules::RuleTable;

pub mod gpu;
pub mod pool;
pub mod worker;

pub use gpu::GpuBackend;
pub use pool::{ContextLease, ContextPool};
pub use worker::WorkerBackend;

/// Produces generation N+1 from generation N.
pub trait ComputeBackend {
    /// Short label for logs and the UI
    fn name(&self) -> &str;

    /// Compute the row following `current`. The result must have the same
    /// length as `current`; the input is never modified.
    fn compute_next_generation(&mut self, current: &Row, rule: RuleTable) -> Result<Row, BackendError>;
}

impl<B: ComputeBackend + ?Sized> ComputeBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn compute_next_generation(&mut self, current: &Row, rule: RuleTable) -> Result<Row, BackendError> {
        (**self).compute_next_generation(current, rule)
    }
}

/// Reference implementation on the CPU
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn compute_next_generation(&mut self, current: &Row, rule: RuleTable) -> Result<Row, BackendError> {
        Ok(next_row(current, &rule))
    }
}

/// Which backend a host should build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    Cpu,
    Gpu,
    /// GPU when available, CPU otherwise and after any GPU failure
    #[default]
    Auto,
}

impl std::str::FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(BackendPreference::Cpu),
            "gpu" => Ok(BackendPreference::Gpu),
            "auto" => Ok(BackendPreference::Auto),
            other => Err(format!("unknown backend '{other}' (expected cpu, gpu or auto)")),
        }
    }
}

/// Composite backend: tries `primary`, and on its first failure drops it and
/// serves this and every later call from the CPU.
pub struct FallbackBackend {
    primary: Option<Box<dyn ComputeBackend + Send>>,
    fallback: CpuBackend,
}

impl FallbackBackend {
    pub fn new(primary: Box<dyn ComputeBackend + Send>) -> Self {
        Self {
            primary: Some(primary),
            fallback: CpuBackend,
        }
    }

    /// A fallback with no primary, e.g. when the GPU could not be created
    pub fn cpu_only() -> Self {
        Self {
            primary: None,
            fallback: CpuBackend,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.primary.is_none()
    }
}

impl ComputeBackend for FallbackBackend {
    fn name(&self) -> &str {
        match &self.primary {
            Some(primary) => primary.name(),
            None => self.fallback.name(),
        }
    }

    fn compute_next_generation(&mut self, current: &Row, rule: RuleTable) -> Result<Row, BackendError> {
        if let Some(primary) = self.primary.as_mut() {
            match primary.compute_next_generation(current, rule) {
                Ok(row) if row.len() == current.len() => return Ok(row),
                Ok(row) => {
                    log::warn!(
                        "{} returned {} cells for a {}-cell row, switching to cpu",
                        primary.name(),
                        row.len(),
                        current.len()
                    );
                }
                Err(e) => {
                    log::warn!("{} failed ({}), switching to cpu", primary.name(), e);
                }
            }
            self.primary = None;
        }
        self.fallback.compute_next_generation(current, rule)
    }
}

/// Build a backend for `preference`. `Gpu` fails if no adapter is usable;
/// `Auto` degrades to the CPU instead.
pub fn build_backend(
    preference: BackendPreference,
    pool: &std::sync::Arc<ContextPool>,
) -> Result<Box<dyn ComputeBackend + Send>, BackendError> {
    match preference {
        BackendPreference::Cpu => Ok(Box::new(CpuBackend)),
        BackendPreference::Gpu => Ok(Box::new(GpuBackend::new(pool)?)),
        BackendPreference::Auto => match GpuBackend::new(pool) {
            Ok(gpu) => Ok(Box::new(FallbackBackend::new(Box::new(gpu)))),
            Err(e) => {
                log::warn!("GPU backend unavailable ({}), using cpu", e);
                Ok(Box::new(FallbackBackend::cpu_only()))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails every call
    struct Broken;

    impl ComputeBackend for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn compute_next_generation(&mut self, _: &Row, _: RuleTable) -> Result<Row, BackendError> {
            Err(BackendError::Validation("device lost".into()))
        }
    }

    /// Returns rows one cell short
    struct Truncating;

    impl ComputeBackend for Truncating {
        fn name(&self) -> &str {
            "truncating"
        }

        fn compute_next_generation(&mut self, current: &Row, _: RuleTable) -> Result<Row, BackendError> {
            Ok(Row::zeros(current.len().saturating_sub(1)))
        }
    }

    #[test]
    fn cpu_backend_matches_reference_step() {
        let rule = RuleTable::new(110);
        let row = Row::seed_centered(31);
        let mut cpu = CpuBackend;
        assert_eq!(cpu.compute_next_generation(&row, rule), Ok(next_row(&row, &rule)));
    }

    #[test_log::test]
    fn fallback_switches_to_cpu_after_failure() {
        let mut backend = FallbackBackend::new(Box::new(Broken));
        assert_eq!(backend.name(), "broken");
        assert!(!backend.is_degraded());

        let rule = RuleTable::new(30);
        let row = Row::seed_centered(9);
        let next = backend.compute_next_generation(&row, rule);
        assert_eq!(next, Ok(next_row(&row, &rule)));
        assert!(backend.is_degraded());
        assert_eq!(backend.name(), "cpu");
    }

    #[test_log::test]
    fn fallback_rejects_wrong_shape() {
        let mut backend = FallbackBackend::new(Box::new(Truncating));
        let row = Row::seed_centered(8);
        let next = backend.compute_next_generation(&row, RuleTable::new(90)).map(|r| r.len());
        assert_eq!(next, Ok(8));
        assert!(backend.is_degraded());
    }

    #[test]
    fn preference_parses() {
        assert_eq!("GPU".parse::<BackendPreference>(), Ok(BackendPreference::Gpu));
        assert_eq!("cpu".parse::<BackendPreference>(), Ok(BackendPreference::Cpu));
        assert!("webgl".parse::<BackendPreference>().is_err());
    }

    #[test]
    fn cpu_preference_builds_without_gpu() {
        let pool = ContextPool::shared(1);
        let backend = build_backend(BackendPreference::Cpu, &pool);
        assert_eq!(backend.map(|b| b.name().to_string()), Ok("cpu".to_string()));
    }
}
