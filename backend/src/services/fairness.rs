use crate::config::EngineConfig;
use crate::models::ShiftSlot;
use crate::services::eligibility::{
    CandidateFacts, Eligibility, EligibilityChecker, RejectReason, RuleEligibilityChecker,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateScore {
    pub user_id: i32,
    pub eligible: bool,
    pub total: i32,
    pub reason: Option<RejectReason>,
}

pub trait FairnessScorer: Send + Sync {
    fn score(&self, facts: &CandidateFacts, shift: &ShiftSlot) -> CandidateScore;

    /// Trailing window used to count recent shifts; the store loads
    /// `CandidateFacts::recent_shift_count` over this many weeks.
    fn window_weeks(&self) -> i64;
}

/// Eligibility weight minus a penalty for every shift the user holds in the
/// trailing window. Soft only: it reorders candidates, never rejects them.
pub struct RecencyFairnessScorer {
    checker: Box<dyn EligibilityChecker>,
    penalty_per_recent_shift: i32,
    window_weeks: i64,
    enabled: bool,
}

impl RecencyFairnessScorer {
    pub fn new(
        checker: Box<dyn EligibilityChecker>,
        penalty_per_recent_shift: i32,
        window_weeks: i64,
        enabled: bool,
    ) -> Self {
        Self {
            checker,
            penalty_per_recent_shift,
            window_weeks,
            enabled,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let checker =
            RuleEligibilityChecker::new(config.weights, config.language_mismatch_is_hard_reject);
        Self::new(
            Box::new(checker),
            config.penalty_per_recent_shift,
            config.fairness_window_weeks,
            config.use_fairness,
        )
    }
}

impl FairnessScorer for RecencyFairnessScorer {
    fn score(&self, facts: &CandidateFacts, shift: &ShiftSlot) -> CandidateScore {
        match self.checker.check(facts, shift) {
            Eligibility::Rejected(reason) => CandidateScore {
                user_id: facts.user_id,
                eligible: false,
                total: 0,
                reason: Some(reason),
            },
            Eligibility::Eligible { weight } => {
                let penalty = if self.enabled {
                    let recent = i32::try_from(facts.recent_shift_count).unwrap_or(i32::MAX);
                    recent.saturating_mul(self.penalty_per_recent_shift)
                } else {
                    0
                };
                CandidateScore {
                    user_id: facts.user_id,
                    eligible: true,
                    total: weight.saturating_sub(penalty),
                    reason: None,
                }
            }
        }
    }

    fn window_weeks(&self) -> i64 {
        self.window_weeks
    }
}

/// Eligible candidates only, best score first; ties go to the lower user id
/// so runs are reproducible.
pub fn rank(scores: Vec<CandidateScore>) -> Vec<CandidateScore> {
    let mut eligible: Vec<CandidateScore> = scores.into_iter().filter(|s| s.eligible).collect();
    eligible.sort_by(|a, b| b.total.cmp(&a.total).then(a.user_id.cmp(&b.user_id)));
    eligible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringWeights;
    use chrono::{NaiveDate, NaiveTime};

    fn shift() -> ShiftSlot {
        ShiftSlot {
            id: 1,
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            point_id: 3,
            point_name: "Market".to_string(),
            min_seats: 1,
            max_seats: 3,
            status: "open".to_string(),
            point_language_id: None,
        }
    }

    fn scorer(penalty: i32, enabled: bool) -> RecencyFairnessScorer {
        RecencyFairnessScorer::new(
            Box::new(RuleEligibilityChecker::new(ScoringWeights::default(), false)),
            penalty,
            4,
            enabled,
        )
    }

    fn score(user_id: i32, total: i32) -> CandidateScore {
        CandidateScore {
            user_id,
            eligible: true,
            total,
            reason: None,
        }
    }

    #[test]
    fn test_recent_shifts_reduce_score() {
        let facts = CandidateFacts {
            user_id: 5,
            recent_shift_count: 3,
            ..Default::default()
        };
        let result = scorer(1, true).score(&facts, &shift());
        assert!(result.eligible);
        // language 10 + availability 20 - 3
        assert_eq!(result.total, 27);
    }

    #[test]
    fn test_penalty_disabled_without_fairness() {
        let facts = CandidateFacts {
            user_id: 5,
            recent_shift_count: 3,
            ..Default::default()
        };
        assert_eq!(scorer(1, false).score(&facts, &shift()).total, 30);
    }

    #[test]
    fn test_heavy_load_can_go_negative_but_stays_eligible() {
        let facts = CandidateFacts {
            user_id: 5,
            recent_shift_count: 20,
            ..Default::default()
        };
        let result = scorer(2, true).score(&facts, &shift());
        assert!(result.eligible);
        assert_eq!(result.total, -10);
    }

    #[test]
    fn test_rejection_carries_reason() {
        let facts = CandidateFacts {
            user_id: 5,
            absences: vec![(shift().date, shift().date)],
            ..Default::default()
        };
        let result = scorer(1, true).score(&facts, &shift());
        assert!(!result.eligible);
        assert_eq!(result.reason, Some(RejectReason::Absent));
    }

    #[test]
    fn test_rank_orders_by_score_then_user_id() {
        let mut rejected = score(1, 100);
        rejected.eligible = false;
        let ranked = rank(vec![score(9, 20), rejected, score(4, 40), score(2, 20), score(7, 35)]);
        let ids: Vec<i32> = ranked.iter().map(|s| s.user_id).collect();
        assert_eq!(ids, vec![4, 7, 2, 9]);
    }

    #[test]
    fn test_rank_empty() {
        assert!(rank(vec![]).is_empty());
    }
}
