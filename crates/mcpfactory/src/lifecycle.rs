//! Harness lifecycle phases
//!
//! ```text
//! Uninitialized --connect--> Initializing --ok--> Ready
//!       ^                         |
//!       +-------- rollback -------+
//!
//! any --dispose--> Disposed (terminal)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Where a harness is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecyclePhase {
    /// Nothing built yet, or the last build rolled back
    Uninitialized = 0,
    /// A connect is building transport, server and client
    Initializing = 1,
    /// Connected; the cached client is handed out
    Ready = 2,
    /// Torn down; connect fails from now on
    Disposed = 3,
}

impl LifecyclePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            2 => Self::Ready,
            _ => Self::Disposed,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        self == Self::Disposed
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Lock-free mirror of the phase guarded by the factory's mutex
#[derive(Debug)]
pub(crate) struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(LifecyclePhase::Uninitialized as u8))
    }

    pub(crate) fn get(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, phase: LifecyclePhase) {
        self.0.store(phase as u8, Ordering::Release);
    }
}

/// Resets the phase to `Uninitialized` unless the build completes
///
/// Covers both a failed build and a connect future dropped mid-build.
pub(crate) struct BuildGuard<'a> {
    phase: &'a PhaseCell,
    armed: bool,
}

impl<'a> BuildGuard<'a> {
    pub(crate) fn begin(phase: &'a PhaseCell) -> Self {
        phase.set(LifecyclePhase::Initializing);
        Self { phase, armed: true }
    }

    pub(crate) fn complete(mut self) {
        self.armed = false;
        self.phase.set(LifecyclePhase::Ready);
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.phase.set(LifecyclePhase::Uninitialized);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_cell_round_trip() {
        let cell = PhaseCell::new();
        assert_eq!(cell.get(), LifecyclePhase::Uninitialized);
        cell.set(LifecyclePhase::Disposed);
        assert_eq!(cell.get(), LifecyclePhase::Disposed);
        assert!(cell.get().is_terminal());
    }

    #[test]
    fn test_guard_resets_on_drop() {
        let cell = PhaseCell::new();
        {
            let _guard = BuildGuard::begin(&cell);
            assert_eq!(cell.get(), LifecyclePhase::Initializing);
        }
        assert_eq!(cell.get(), LifecyclePhase::Uninitialized);
    }

    #[test]
    fn test_guard_complete_marks_ready() {
        let cell = PhaseCell::new();
        BuildGuard::begin(&cell).complete();
        assert_eq!(cell.get(), LifecyclePhase::Ready);
    }

    #[test]
    fn test_display() {
        assert_eq!(LifecyclePhase::Ready.to_string(), "ready");
    }
}
