//! Read-only checks run before a shift is published.

use crate::error::{AssignError, AssignResult};
use crate::models::ParticipantRole;
use crate::services::store::AssignmentStore;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    NoParticipants,
    BelowMinimum,
    AboveMaximum,
    MissingCaptain,
    MultipleCaptains,
    LanguageUncovered,
}

impl IssueKind {
    pub fn key(&self) -> &'static str {
        match self {
            IssueKind::NoParticipants => "no_participants",
            IssueKind::BelowMinimum => "below_minimum",
            IssueKind::AboveMaximum => "above_maximum",
            IssueKind::MissingCaptain => "missing_captain",
            IssueKind::MultipleCaptains => "multiple_captains",
            IssueKind::LanguageUncovered => "language_uncovered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShiftIssue {
    pub kind: IssueKind,
    pub description: String,
}

impl ShiftIssue {
    fn new(kind: IssueKind, description: String) -> Self {
        Self { kind, description }
    }
}

pub fn validate_shift<S: AssignmentStore>(store: &mut S, shift_id: i32) -> AssignResult<Vec<ShiftIssue>> {
    let shift = store
        .shift(shift_id)?
        .ok_or(AssignError::ShiftNotFound(shift_id))?;
    let participants = store.participants(shift_id)?;
    let count = participants.len() as i32;
    let mut issues = Vec::new();

    if participants.is_empty() {
        issues.push(ShiftIssue::new(
            IssueKind::NoParticipants,
            "Nobody is assigned to this shift".to_string(),
        ));
    }
    if count < shift.min_seats {
        issues.push(ShiftIssue::new(
            IssueKind::BelowMinimum,
            format!("{} participant(s), minimum is {}", count, shift.min_seats),
        ));
    }
    if count > shift.max_seats {
        issues.push(ShiftIssue::new(
            IssueKind::AboveMaximum,
            format!("{} participant(s), maximum is {}", count, shift.max_seats),
        ));
    }

    let captains = participants
        .iter()
        .filter(|p| ParticipantRole::from_str(&p.role) == Some(ParticipantRole::Captain))
        .count();
    if !participants.is_empty() && captains == 0 {
        issues.push(ShiftIssue::new(
            IssueKind::MissingCaptain,
            "No captain assigned".to_string(),
        ));
    }
    if captains > 1 {
        issues.push(ShiftIssue::new(
            IssueKind::MultipleCaptains,
            format!("{} captains assigned", captains),
        ));
    }

    // Here a language mismatch is hard: someone on the shift must speak it.
    if store.capabilities().language() {
        if let Some(required) = shift.point_language_id {
            let languages = store.participant_language_ids(shift_id)?;
            if !languages.iter().any(|l| *l == Some(required)) {
                issues.push(ShiftIssue::new(
                    IssueKind::LanguageUncovered,
                    format!("No participant speaks language #{} required by {}", required, shift.point_name),
                ));
            }
        }
    }

    Ok(issues)
}
