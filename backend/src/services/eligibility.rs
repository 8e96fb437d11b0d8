use crate::config::ScoringWeights;
use crate::models::{windows_overlap, Availability, PreferenceLevel, ShiftSlot, ShiftStatus};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

/// A participation of the candidate on another shift of the same day.
#[derive(Debug, Clone)]
pub struct BookedWindow {
    pub shift_id: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: String,
}

/// Everything the checks need to know about one candidate for one shift.
#[derive(Debug, Clone, Default)]
pub struct CandidateFacts {
    pub user_id: i32,
    /// `None` when the user has no opinion or the preference table is absent.
    pub preference: Option<PreferenceLevel>,
    pub user_language_id: Option<i32>,
    /// All declared availability rows of the user, any weekday.
    pub availability: Vec<Availability>,
    pub absences: Vec<(NaiveDate, NaiveDate)>,
    pub booked: Vec<BookedWindow>,
    pub has_request: bool,
    pub recent_shift_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    PointNotPossible,
    LanguageMismatch,
    NotAvailable,
    Absent,
    TimeConflict,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::PointNotPossible => "point_not_possible",
            RejectReason::LanguageMismatch => "language_mismatch",
            RejectReason::NotAvailable => "not_available",
            RejectReason::Absent => "absent",
            RejectReason::TimeConflict => "time_conflict",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible { weight: i32 },
    Rejected(RejectReason),
}

pub trait EligibilityChecker: Send + Sync {
    fn check(&self, facts: &CandidateFacts, shift: &ShiftSlot) -> Eligibility;
}

/// The standard rule set: preference, language, availability, absence,
/// time conflict, prior request. Hard failures stop at the first rule hit.
#[derive(Debug, Clone)]
pub struct RuleEligibilityChecker {
    pub weights: ScoringWeights,
    pub language_mismatch_is_hard_reject: bool,
}

impl RuleEligibilityChecker {
    pub fn new(weights: ScoringWeights, language_mismatch_is_hard_reject: bool) -> Self {
        Self {
            weights,
            language_mismatch_is_hard_reject,
        }
    }
}

impl EligibilityChecker for RuleEligibilityChecker {
    fn check(&self, facts: &CandidateFacts, shift: &ShiftSlot) -> Eligibility {
        let mut weight = 0;

        match facts.preference {
            Some(PreferenceLevel::NotPossible) => {
                return Eligibility::Rejected(RejectReason::PointNotPossible);
            }
            Some(PreferenceLevel::Preferred) => weight += self.weights.preferred,
            Some(PreferenceLevel::Possible) => weight += self.weights.possible,
            None => {}
        }

        if language_compatible(facts.user_language_id, shift.point_language_id) {
            weight += self.weights.language;
        } else if self.language_mismatch_is_hard_reject {
            return Eligibility::Rejected(RejectReason::LanguageMismatch);
        }

        if !is_available(&facts.availability, shift) {
            return Eligibility::Rejected(RejectReason::NotAvailable);
        }
        weight += self.weights.availability;

        if is_absent(&facts.absences, shift.date) {
            return Eligibility::Rejected(RejectReason::Absent);
        }

        if has_time_conflict(&facts.booked, shift) {
            return Eligibility::Rejected(RejectReason::TimeConflict);
        }

        if facts.has_request {
            weight += self.weights.role_requested;
        }

        Eligibility::Eligible { weight }
    }
}

/// Missing data on either side counts as compatible.
pub fn language_compatible(user_language: Option<i32>, point_language: Option<i32>) -> bool {
    match (user_language, point_language) {
        (Some(user), Some(point)) => user == point,
        _ => true,
    }
}

/// Users who never declared availability are available every day.
pub fn is_available(availability: &[Availability], shift: &ShiftSlot) -> bool {
    if availability.is_empty() {
        return true;
    }
    let weekday = shift.weekday();
    availability
        .iter()
        .any(|a| a.weekday == weekday && shift.overlaps(a.start_time, a.end_time))
}

pub fn is_absent(absences: &[(NaiveDate, NaiveDate)], date: NaiveDate) -> bool {
    absences
        .iter()
        .any(|(start, end)| *start <= date && date <= *end)
}

pub fn has_time_conflict(booked: &[BookedWindow], shift: &ShiftSlot) -> bool {
    let blocking = ShiftStatus::blocking();
    booked.iter().any(|b| {
        b.shift_id != shift.id
            && ShiftStatus::from_str(&b.status).is_some_and(|s| blocking.contains(&s))
            && windows_overlap(b.start_time, b.end_time, shift.start_time, shift.end_time)
    })
}
