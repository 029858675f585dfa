//! Build stage machine
//!
//! VALIDATING → PACKAGING → UPLOADING → SUBMITTING → AWAITING_RESULT →
//! DOWNLOADING → DONE, with FAILED reachable from every non-terminal stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage of one build run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStage {
    Validating,
    Packaging,
    Uploading,
    Submitting,
    /// The submit call blocks until the remote build finishes
    AwaitingResult,
    Downloading,
    Done,
    Failed,
}

impl BuildStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildStage::Done | BuildStage::Failed)
    }

    /// Check if transition from this stage to target is valid
    pub fn can_transition_to(&self, target: BuildStage) -> bool {
        match (self, target) {
            (from, BuildStage::Failed) => !from.is_terminal(),

            (BuildStage::Validating, BuildStage::Packaging) => true,
            (BuildStage::Packaging, BuildStage::Uploading) => true,
            (BuildStage::Uploading, BuildStage::Submitting) => true,
            (BuildStage::Submitting, BuildStage::AwaitingResult) => true,
            (BuildStage::AwaitingResult, BuildStage::Downloading) => true,
            (BuildStage::Downloading, BuildStage::Done) => true,

            _ => false,
        }
    }
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BuildStage::Validating => "validating",
            BuildStage::Packaging => "packaging",
            BuildStage::Uploading => "uploading",
            BuildStage::Submitting => "submitting",
            BuildStage::AwaitingResult => "awaiting-result",
            BuildStage::Downloading => "downloading",
            BuildStage::Done => "done",
            BuildStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Invalid stage transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid stage transition from {from} to {to}")]
pub struct StageError {
    pub from: BuildStage,
    pub to: BuildStage,
}

/// One recorded transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: BuildStage,
    pub to: BuildStage,
    pub at: DateTime<Utc>,
}

/// Current stage plus every transition taken in this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTracker {
    current: BuildStage,
    transitions: Vec<StageTransition>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: BuildStage::Validating,
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> BuildStage {
        self.current
    }

    pub fn transitions(&self) -> &[StageTransition] {
        &self.transitions
    }

    /// Stages visited, starting with VALIDATING
    pub fn visited(&self) -> Vec<BuildStage> {
        std::iter::once(BuildStage::Validating)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }

    pub fn advance(&mut self, to: BuildStage) -> Result<(), StageError> {
        if !self.current.can_transition_to(to) {
            return Err(StageError {
                from: self.current,
                to,
            });
        }
        tracing::debug!(from = %self.current, to = %to, "build stage");
        self.transitions.push(StageTransition {
            from: self.current,
            to,
            at: Utc::now(),
        });
        self.current = to;
        Ok(())
    }

    /// Move to FAILED unless already terminal
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            let _ = self.advance(BuildStage::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HAPPY_PATH: [BuildStage; 7] = [
        BuildStage::Validating,
        BuildStage::Packaging,
        BuildStage::Uploading,
        BuildStage::Submitting,
        BuildStage::AwaitingResult,
        BuildStage::Downloading,
        BuildStage::Done,
    ];

    #[test]
    fn test_happy_path_transitions() {
        for pair in HAPPY_PATH.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_skipping_stages() {
        assert!(!BuildStage::Validating.can_transition_to(BuildStage::Uploading));
        assert!(!BuildStage::Packaging.can_transition_to(BuildStage::Submitting));
        assert!(!BuildStage::Submitting.can_transition_to(BuildStage::Downloading));
        assert!(!BuildStage::Uploading.can_transition_to(BuildStage::Packaging));
    }

    #[test]
    fn test_failed_reachable_from_non_terminal() {
        for stage in &HAPPY_PATH[..6] {
            assert!(stage.can_transition_to(BuildStage::Failed), "{}", stage);
        }
        assert!(!BuildStage::Done.can_transition_to(BuildStage::Failed));
        assert!(!BuildStage::Failed.can_transition_to(BuildStage::Failed));
    }

    #[test]
    fn test_terminal_stages_are_final() {
        for stage in HAPPY_PATH {
            assert!(!BuildStage::Done.can_transition_to(stage));
            assert!(!BuildStage::Failed.can_transition_to(stage));
        }
    }

    #[test]
    fn test_tracker_records_history() {
        let mut tracker = StageTracker::new();
        tracker.advance(BuildStage::Packaging).unwrap();
        tracker.fail();
        tracker.fail();

        assert_eq!(tracker.current(), BuildStage::Failed);
        assert_eq!(
            tracker.visited(),
            vec![BuildStage::Validating, BuildStage::Packaging, BuildStage::Failed]
        );
        assert_eq!(tracker.transitions().len(), 2);
    }

    #[test]
    fn test_tracker_rejects_invalid_transition() {
        let mut tracker = StageTracker::new();
        let err = tracker.advance(BuildStage::Done).unwrap_err();
        assert_eq!(err.from, BuildStage::Validating);
        assert_eq!(tracker.current(), BuildStage::Validating);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&BuildStage::AwaitingResult).unwrap();
        assert_eq!(json, "\"AWAITING_RESULT\"");
    }
}
