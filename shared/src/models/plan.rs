//! Production plan lifecycle state machine

use serde::{Deserialize, Serialize};

/// Production plan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Confirmed,
    Started,
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Confirmed => "confirmed",
            PlanStatus::Started => "started",
            PlanStatus::Completed => "completed",
            PlanStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PlanStatus::Draft),
            "confirmed" => Some(PlanStatus::Confirmed),
            "started" => Some(PlanStatus::Started),
            "completed" => Some(PlanStatus::Completed),
            "cancelled" => Some(PlanStatus::Cancelled),
            _ => None,
        }
    }

    /// Completed and cancelled plans accept no further transitions
    pub fn is_absorbing(&self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Cancelled)
    }
}

/// Requested plan transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTransition {
    Confirm,
    Start,
    Complete,
    Cancel,
}

impl PlanTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTransition::Confirm => "confirm",
            PlanTransition::Start => "start",
            PlanTransition::Complete => "complete",
            PlanTransition::Cancel => "cancel",
        }
    }

    /// Status the plan ends up in after this transition
    pub fn target_status(&self) -> PlanStatus {
        match self {
            PlanTransition::Confirm => PlanStatus::Confirmed,
            PlanTransition::Start => PlanStatus::Started,
            PlanTransition::Complete => PlanStatus::Completed,
            PlanTransition::Cancel => PlanStatus::Cancelled,
        }
    }
}

/// Outcome of checking a transition against the current status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// Transition is legal and should run
    Allowed,
    /// Plan is already in the target status; re-invocation is a no-op success
    AlreadyDone,
    /// Transition is not legal from the current status
    Invalid,
}

/// Validate a requested transition against the current plan status.
///
/// Re-invoking a transition whose target status the plan already holds is
/// reported as `AlreadyDone` so timed-out callers can retry safely without
/// double-allocating or double-deducting. Cancel is deliberately forbidden
/// from `Started`: the allocated stock has already been physically deducted.
pub fn check_transition(current: PlanStatus, transition: PlanTransition) -> TransitionCheck {
    if current == transition.target_status() {
        return TransitionCheck::AlreadyDone;
    }

    let allowed = match transition {
        PlanTransition::Confirm => current == PlanStatus::Draft,
        PlanTransition::Start => current == PlanStatus::Confirmed,
        PlanTransition::Complete => current == PlanStatus::Started,
        PlanTransition::Cancel => {
            matches!(current, PlanStatus::Draft | PlanStatus::Confirmed)
        }
    };

    if allowed {
        TransitionCheck::Allowed
    } else {
        TransitionCheck::Invalid
    }
}
