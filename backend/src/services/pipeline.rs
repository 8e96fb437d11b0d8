//! Three-stage seat filling for one shift.
//!
//! Inside a single unit of work (the shift row stays locked throughout):
//! 1. approved requests, oldest first;
//! 2. pending requests that pass eligibility, optionally auto-approved;
//! 3. users whose declared availability covers the shift, best score first.
//!
//! The shift status is then set from the seat count, notifications are
//! recorded and the trace is persisted. Any error rolls the unit back but the
//! caller still gets a result carrying the trace.

use crate::config::EngineConfig;
use crate::error::{AssignError, AssignResult};
use crate::models::{NewParticipant, ParticipantRole, ShiftSlot, ShiftStatus};
use crate::services::fairness::{rank, FairnessScorer, RecencyFairnessScorer};
use crate::services::notifier::{Notifier, KIND_COVERED};
use crate::services::store::AssignmentStore;
use crate::services::tracer::Tracer;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunMetrics {
    pub candidates_examined: u32,
    pub candidates_accepted: u32,
    pub candidates_rejected: u32,
    pub approved_assigned: u32,
    pub pending_assigned: u32,
    pub scored_assigned: u32,
    pub notifications_created: u32,
    /// Statements the store issued for this run, lock through log copy.
    pub db_queries: u32,
    pub elapsed_ms: u64,
}

/// What a single `assign` call reports back, success or not.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentResult {
    pub ok: bool,
    pub shift_id: i32,
    pub assigned: Vec<i32>,
    pub status: Option<ShiftStatus>,
    pub message: Option<String>,
    pub error: Option<String>,
    #[serde(skip)]
    pub not_found: bool,
    pub log: Vec<String>,
    pub trace: String,
    pub trace_file: Option<PathBuf>,
    /// Set when the trace file could not be written.
    pub trace_error: Option<String>,
    pub metrics: RunMetrics,
}

impl AssignmentResult {
    /// Result for a run that never reached the store.
    pub fn aborted(shift_id: i32, error: &AssignError, tracer: &mut dyn Tracer) -> Self {
        tracer.log(&format!("Assignment of shift #{} aborted: {}", shift_id, error));
        tracer.step(&format!("EXCEPTION: {}", error));
        let artifact = tracer.finish();
        Self {
            ok: false,
            shift_id,
            assigned: Vec::new(),
            status: None,
            message: None,
            error: Some(error.to_string()),
            not_found: false,
            log: tracer.log_lines().to_vec(),
            trace: artifact.content,
            trace_file: artifact.path,
            trace_error: artifact.error,
            metrics: RunMetrics::default(),
        }
    }
}

enum FillOutcome {
    AlreadyFull { status: Option<ShiftStatus> },
    Filled { assigned: Vec<i32>, status: ShiftStatus },
}

/// Per-invocation state of one fill.
struct SeatState {
    shift_id: i32,
    on_shift: HashSet<i32>,
    assigned_count: i32,
    max_seats: i32,
    min_seats: i32,
    newly_assigned: Vec<i32>,
}

impl SeatState {
    fn has_room(&self) -> bool {
        self.assigned_count < self.max_seats
    }

    fn record(&mut self, user_id: i32) {
        self.on_shift.insert(user_id);
        self.newly_assigned.push(user_id);
        self.assigned_count += 1;
    }
}

pub struct AssignmentPipeline {
    scorer: Box<dyn FairnessScorer>,
    notifier: Notifier,
    auto_approve_pending: bool,
}

impl AssignmentPipeline {
    pub fn new(scorer: Box<dyn FairnessScorer>, notifier: Notifier, auto_approve_pending: bool) -> Self {
        Self {
            scorer,
            notifier,
            auto_approve_pending,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Box::new(RecencyFairnessScorer::from_config(config)),
            Notifier::new(config.notification_channel.clone()),
            config.auto_approve_pending,
        )
    }

    /// Fill the open seats of `shift_id`. Never returns an error: failures
    /// are reported as `ok: false` with the trace attached.
    pub fn assign<S: AssignmentStore>(
        &self,
        store: &mut S,
        shift_id: i32,
        tracer: &mut dyn Tracer,
        now: NaiveDateTime,
    ) -> AssignmentResult {
        let started = Instant::now();
        let mut metrics = RunMetrics::default();
        tracer.step(&format!("=== Processing shift #{}", shift_id));
        tracer.log(&format!("Starting assignment for shift #{}", shift_id));

        let statements_before = store.statements();
        let outcome = store.atomic(|store| self.fill(store, shift_id, tracer, &mut metrics, now));
        metrics.db_queries = store.statements().saturating_sub(statements_before);
        metrics.elapsed_ms = started.elapsed().as_millis() as u64;

        let mut result = AssignmentResult {
            ok: false,
            shift_id,
            assigned: Vec::new(),
            status: None,
            message: None,
            error: None,
            not_found: false,
            log: Vec::new(),
            trace: String::new(),
            trace_file: None,
            trace_error: None,
            metrics,
        };

        match outcome {
            Ok(FillOutcome::AlreadyFull { status }) => {
                result.ok = true;
                result.status = status;
                result.message = Some("Shift already complete".to_string());
            }
            Ok(FillOutcome::Filled { assigned, status }) => {
                tracer.step(&format!(
                    "Finished shift #{}. Assigned users: {:?}",
                    shift_id, assigned
                ));
                info!(
                    "Shift #{} -> {} ({} newly assigned)",
                    shift_id,
                    status.as_str(),
                    assigned.len()
                );
                result.ok = true;
                result.assigned = assigned;
                result.status = Some(status);
            }
            Err(AssignError::ShiftNotFound(id)) => {
                tracer.log(&format!("Shift not found: {}", id));
                tracer.step(&format!("Shift #{} not found", id));
                result.not_found = true;
                result.error = Some(AssignError::ShiftNotFound(id).to_string());
            }
            Err(e) => {
                warn!("Assignment of shift #{} rolled back: {}", shift_id, e);
                tracer.log(&format!("Exception while assigning shift #{}: {}", shift_id, e));
                tracer.step(&format!("EXCEPTION: {}", e));
                result.error = Some(e.to_string());
            }
        }

        let artifact = tracer.finish();
        result.log = tracer.log_lines().to_vec();
        result.trace = artifact.content;
        result.trace_file = artifact.path;
        if let Some(e) = &artifact.error {
            warn!("Trace for shift #{} not written: {}", shift_id, e);
        }
        result.trace_error = artifact.error;
        result
    }

    fn fill<S: AssignmentStore>(
        &self,
        store: &mut S,
        shift_id: i32,
        tracer: &mut dyn Tracer,
        metrics: &mut RunMetrics,
        now: NaiveDateTime,
    ) -> AssignResult<FillOutcome> {
        let shift = store
            .lock_shift(shift_id)?
            .ok_or(AssignError::ShiftNotFound(shift_id))?;

        let existing = store.participants(shift_id)?;
        let mut seats = SeatState {
            shift_id,
            on_shift: existing.iter().map(|p| p.user_id).collect(),
            assigned_count: existing.len() as i32,
            max_seats: shift.max_seats,
            min_seats: shift.min_seats,
            newly_assigned: Vec::new(),
        };
        tracer.step(&format!(
            "Shift #{} ({} {} {}-{}): {}/{} seats taken",
            shift_id,
            shift.point_name,
            shift.date,
            shift.start_time.format("%H:%M"),
            shift.end_time.format("%H:%M"),
            seats.assigned_count,
            seats.max_seats
        ));

        if !seats.has_room() {
            tracer.step("Shift already complete, nothing to do");
            return Ok(FillOutcome::AlreadyFull {
                status: ShiftStatus::from_str(&shift.status),
            });
        }

        self.stage_approved(store, &mut seats, tracer, metrics, now)?;
        if seats.has_room() {
            self.stage_pending(store, &shift, &mut seats, tracer, metrics, now)?;
        }
        if seats.has_room() {
            self.stage_scored(store, &shift, &mut seats, tracer, metrics, now)?;
        }

        let status = if seats.assigned_count >= seats.min_seats {
            ShiftStatus::Assigned
        } else {
            ShiftStatus::Pending
        };
        store.set_shift_status(shift_id, status, now)?;
        tracer.step(&format!(
            "Status set to {} ({}/{} seats, minimum {})",
            status.as_str(),
            seats.assigned_count,
            seats.max_seats,
            seats.min_seats
        ));

        self.notify(store, &seats, tracer, metrics, now)?;

        let lines = tracer.log_lines().to_vec();
        match store.persist_log_lines(shift_id, &lines, now) {
            Ok(0) => {}
            Ok(n) => tracer.step(&format!("Persisted {} log lines", n)),
            Err(e) => tracer.step(&format!("Error persisting log lines: {}", e)),
        }

        Ok(FillOutcome::Filled {
            assigned: seats.newly_assigned,
            status,
        })
    }

    fn stage_approved<S: AssignmentStore>(
        &self,
        store: &mut S,
        seats: &mut SeatState,
        tracer: &mut dyn Tracer,
        metrics: &mut RunMetrics,
        now: NaiveDateTime,
    ) -> AssignResult<()> {
        tracer.step("Stage 1: approved requests");
        for request in store.approved_requests(seats.shift_id)? {
            if !seats.has_room() {
                break;
            }
            let user_id = request.user_id;
            if seats.on_shift.contains(&user_id) {
                tracer.step(&format!("User {} already on shift -> skip", user_id));
                continue;
            }
            if self.insert(store, seats, user_id, ParticipantRole::Publisher, tracer, now)? {
                tracer.step(&format!("Assigned approved request: user {}", user_id));
                metrics.approved_assigned += 1;
                metrics.candidates_accepted += 1;
            }
        }
        Ok(())
    }

    fn stage_pending<S: AssignmentStore>(
        &self,
        store: &mut S,
        shift: &ShiftSlot,
        seats: &mut SeatState,
        tracer: &mut dyn Tracer,
        metrics: &mut RunMetrics,
        now: NaiveDateTime,
    ) -> AssignResult<()> {
        tracer.step(if self.auto_approve_pending {
            "Stage 2: pending requests (auto-approve)"
        } else {
            "Stage 2: pending requests"
        });
        let recent_since = self.recent_since(now.date());

        for request in store.pending_requests(seats.shift_id)? {
            if !seats.has_room() {
                break;
            }
            let user_id = request.user_id;
            if seats.on_shift.contains(&user_id) {
                continue;
            }

            metrics.candidates_examined += 1;
            let facts = store.candidate_facts(user_id, shift, recent_since)?;
            let score = self.scorer.score(&facts, shift);
            if !score.eligible {
                metrics.candidates_rejected += 1;
                tracer.step(&format!(
                    "Pending request from user {} discarded: {}",
                    user_id,
                    score.reason.map(|r| r.as_str()).unwrap_or("ineligible")
                ));
                continue;
            }

            if self.auto_approve_pending {
                store.approve_request(request.id, now)?;
                tracer.step(&format!("Auto-approved request #{}", request.id));
            }
            let role = ParticipantRole::from_str(&request.role).unwrap_or(ParticipantRole::Publisher);
            if self.insert(store, seats, user_id, role, tracer, now)? {
                tracer.step(&format!(
                    "Assigned pending request: user {} as {} (score {})",
                    user_id,
                    role.as_str(),
                    score.total
                ));
                metrics.pending_assigned += 1;
                metrics.candidates_accepted += 1;
            }
        }
        Ok(())
    }

    fn stage_scored<S: AssignmentStore>(
        &self,
        store: &mut S,
        shift: &ShiftSlot,
        seats: &mut SeatState,
        tracer: &mut dyn Tracer,
        metrics: &mut RunMetrics,
        now: NaiveDateTime,
    ) -> AssignResult<()> {
        tracer.step("Stage 3: candidates by availability");
        let pool = store.availability_pool(shift)?;
        if pool.is_empty() {
            tracer.step("No availability candidates for this time window");
            return Ok(());
        }

        let recent_since = self.recent_since(now.date());
        let mut scores = Vec::with_capacity(pool.len());
        for user_id in pool {
            metrics.candidates_examined += 1;
            let facts = store.candidate_facts(user_id, shift, recent_since)?;
            let score = self.scorer.score(&facts, shift);
            if let (false, Some(reason)) = (score.eligible, score.reason) {
                metrics.candidates_rejected += 1;
                tracer.step(&format!("Candidate {} discarded: {}", user_id, reason));
            }
            scores.push(score);
        }

        for entry in rank(scores) {
            if !seats.has_room() {
                break;
            }
            if seats.on_shift.contains(&entry.user_id) {
                continue;
            }
            if self.insert(store, seats, entry.user_id, ParticipantRole::Publisher, tracer, now)? {
                tracer.step(&format!(
                    "Assigned by score: user {} (score {})",
                    entry.user_id, entry.total
                ));
                metrics.scored_assigned += 1;
                metrics.candidates_accepted += 1;
            }
        }
        Ok(())
    }

    /// Existence check, then insert. A failed insert only skips this user.
    fn insert<S: AssignmentStore>(
        &self,
        store: &mut S,
        seats: &mut SeatState,
        user_id: i32,
        role: ParticipantRole,
        tracer: &mut dyn Tracer,
        now: NaiveDateTime,
    ) -> AssignResult<bool> {
        if user_id <= 0 {
            tracer.step(&format!("Invalid user id {}, not inserted", user_id));
            return Ok(false);
        }
        if store.is_participant(seats.shift_id, user_id)? {
            seats.on_shift.insert(user_id);
            tracer.step(&format!(
                "User {} was already assigned to shift #{} (skip)",
                user_id, seats.shift_id
            ));
            return Ok(false);
        }

        let participant = NewParticipant {
            shift_id: seats.shift_id,
            user_id,
            role: role.as_str().to_string(),
            assigned_by: None,
            assigned_at: now,
            attended: false,
        };
        match store.insert_participant(&participant) {
            Ok(()) => {
                seats.record(user_id);
                Ok(true)
            }
            Err(e) => {
                tracer.step(&format!("Insert failed for user {}: {}", user_id, e));
                Ok(false)
            }
        }
    }

    fn notify<S: AssignmentStore>(
        &self,
        store: &mut S,
        seats: &SeatState,
        tracer: &mut dyn Tracer,
        metrics: &mut RunMetrics,
        now: NaiveDateTime,
    ) -> AssignResult<()> {
        let shift_id = seats.shift_id;
        let message = Notifier::covered_message(shift_id);

        for &user_id in &seats.newly_assigned {
            self.notify_user(store, shift_id, user_id, &message, tracer, metrics, now);
        }

        // Every current participant is (re)notified, bounded by the dedupe window.
        for participant in store.participants(shift_id)? {
            self.notify_user(store, shift_id, participant.user_id, &message, tracer, metrics, now);
        }
        tracer.step(&format!("Participant notifications done for shift #{}", shift_id));
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn notify_user<S: AssignmentStore>(
        &self,
        store: &mut S,
        shift_id: i32,
        user_id: i32,
        message: &str,
        tracer: &mut dyn Tracer,
        metrics: &mut RunMetrics,
        now: NaiveDateTime,
    ) {
        match self
            .notifier
            .notify_if_absent(store, shift_id, user_id, KIND_COVERED, message, now)
        {
            Ok(true) => {
                metrics.notifications_created += 1;
                tracer.step(&format!(
                    "Notification '{}' created for user {} (shift #{})",
                    KIND_COVERED, user_id, shift_id
                ));
            }
            Ok(false) => {}
            Err(e) => tracer.step(&format!(
                "Error creating notification for user {}: {}",
                user_id, e
            )),
        }
    }

    fn recent_since(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::weeks(self.scorer.window_weeks())
    }
}
