// ── Interaction guard ──
//
// Suppresses echo writes to controls the user is actively touching.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// What a control addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlTarget {
    Device(u16),
    Group(u16),
}

/// Which control on that target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Brightness,
    ColorTemp,
}

/// Identity of a single interactive control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId {
    pub target: ControlTarget,
    pub kind: ControlKind,
}

impl ControlId {
    pub fn device(avion_id: u16, kind: ControlKind) -> Self {
        Self { target: ControlTarget::Device(avion_id), kind }
    }

    pub fn group(group_id: u16, kind: ControlKind) -> Self {
        Self { target: ControlTarget::Group(group_id), kind }
    }
}

/// Tracks which controls are mid-interaction.
///
/// While a control is held, incoming state echoes still land in the
/// store but the reconciler flags the visual write as suppressed, so a
/// slider never snaps away from under the user's pointer. The guard is
/// toolkit-agnostic -- callers decide what "held" means (drag started,
/// focus gained, key repeat).
#[derive(Debug, Default)]
pub struct InteractionGuard {
    held: Mutex<HashSet<ControlId>>,
}

impl InteractionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a control as actively edited. Idempotent.
    pub fn begin_edit(&self, control: ControlId) {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).insert(control);
    }

    /// Release a control. Idempotent; releasing an unheld control is a
    /// no-op. The next incoming echo writes through normally.
    pub fn end_edit(&self, control: ControlId) {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).remove(&control);
    }

    pub fn is_held(&self, control: ControlId) -> bool {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).contains(&control)
    }

    /// Drop all holds, e.g. when the view tears down.
    pub fn release_all(&self) {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
