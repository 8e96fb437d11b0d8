//! In-memory `AssignmentStore` for unit tests. `atomic` snapshots the whole
//! store and restores it on error, mirroring a rolled back transaction.

use crate::error::{AssignError, AssignResult};
use crate::models::{
    windows_overlap, Absence, Availability, NewNotification, NewParticipant, Participant,
    PreferenceLevel, RequestStatus, ShiftRequest, ShiftSlot, ShiftStatus,
};
use crate::services::candidates::{order_requests, CandidateSupplier};
use crate::services::eligibility::{BookedWindow, CandidateFacts};
use crate::services::schema_probe::SchemaCapabilities;
use crate::services::store::AssignmentStore;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{HashMap, HashSet};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// 2026-10-19 is a Monday.
pub fn monday() -> NaiveDate {
    date(2026, 10, 19)
}

pub fn noon() -> NaiveDateTime {
    monday().and_hms_opt(12, 0, 0).unwrap()
}

pub fn slot(id: i32, day: NaiveDate, start: (u32, u32), end: (u32, u32), min: i32, max: i32) -> ShiftSlot {
    ShiftSlot {
        id,
        date: day,
        start_time: time(start.0, start.1),
        end_time: time(end.0, end.1),
        point_id: 1,
        point_name: "Plaza".to_string(),
        min_seats: min,
        max_seats: max,
        status: ShiftStatus::Created.as_str().to_string(),
        point_language_id: None,
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    pub shifts: Vec<ShiftSlot>,
    pub participants: Vec<Participant>,
    pub requests: Vec<ShiftRequest>,
    pub availabilities: Vec<Availability>,
    pub absences: Vec<Absence>,
    pub preferences: Vec<(i32, i32, PreferenceLevel)>,
    pub user_languages: HashMap<i32, i32>,
    pub notifications: Vec<NewNotification>,
    pub logs: Vec<(i32, String)>,
    pub caps: SchemaCapabilities,
    pub fail_inserts_for: HashSet<i32>,
    pub fail_status_update: bool,
    /// Notification writes fail, as if their savepoint rolled back.
    pub fail_notifications: bool,
    /// The unit cannot be committed, as with an aborted transaction.
    pub fail_commit: bool,
    statements: u32,
    next_id: i32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shifts: Vec::new(),
            participants: Vec::new(),
            requests: Vec::new(),
            availabilities: Vec::new(),
            absences: Vec::new(),
            preferences: Vec::new(),
            user_languages: HashMap::new(),
            notifications: Vec::new(),
            logs: Vec::new(),
            caps: SchemaCapabilities::all(),
            fail_inserts_for: HashSet::new(),
            fail_status_update: false,
            fail_notifications: false,
            fail_commit: false,
            statements: 0,
            next_id: 1,
        }
    }

    fn next_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_shift(&mut self, shift: ShiftSlot) {
        self.shifts.push(shift);
    }

    pub fn add_participant(&mut self, shift_id: i32, user_id: i32, role: &str) {
        let id = self.next_id();
        self.participants.push(Participant {
            id,
            shift_id,
            user_id,
            role: role.to_string(),
            assigned_by: None,
            assigned_at: noon(),
            attended: false,
        });
    }

    /// `minute` orders requests: lower is older.
    pub fn add_request(&mut self, shift_id: i32, user_id: i32, role: &str, status: RequestStatus, minute: u32) -> i32 {
        let id = self.next_id();
        self.requests.push(ShiftRequest {
            id,
            user_id,
            shift_id,
            role: role.to_string(),
            status: status.as_str().to_string(),
            requested_at: monday().and_hms_opt(8, minute, 0).unwrap(),
            processed_by: None,
            processed_at: None,
        });
        id
    }

    pub fn add_availability(&mut self, user_id: i32, weekday: i32, start: (u32, u32), end: (u32, u32)) {
        let id = self.next_id();
        self.availabilities.push(Availability {
            id,
            user_id,
            weekday,
            start_time: time(start.0, start.1),
            end_time: time(end.0, end.1),
        });
    }

    pub fn add_absence(&mut self, user_id: i32, from: NaiveDate, to: NaiveDate) {
        let id = self.next_id();
        self.absences.push(Absence {
            id,
            user_id,
            start_date: from,
            end_date: to,
        });
    }

    pub fn set_preference(&mut self, user_id: i32, point_id: i32, level: PreferenceLevel) {
        self.preferences.push((user_id, point_id, level));
    }

    pub fn users_on(&self, shift_id: i32) -> Vec<i32> {
        self.participants
            .iter()
            .filter(|p| p.shift_id == shift_id)
            .map(|p| p.user_id)
            .collect()
    }

    pub fn status_of(&self, shift_id: i32) -> Option<String> {
        self.shifts.iter().find(|s| s.id == shift_id).map(|s| s.status.clone())
    }

    fn find_shift(&self, shift_id: i32) -> Option<ShiftSlot> {
        let mut found = self.shifts.iter().find(|s| s.id == shift_id).cloned();
        if let Some(shift) = found.as_mut() {
            if !self.caps.point_language {
                shift.point_language_id = None;
            }
        }
        found
    }

    fn requests_with_status(&self, shift_id: i32, status: RequestStatus) -> Vec<ShiftRequest> {
        let mut rows: Vec<ShiftRequest> = self
            .requests
            .iter()
            .filter(|r| r.shift_id == shift_id && r.status == status.as_str())
            .cloned()
            .collect();
        order_requests(&mut rows);
        rows
    }
}

impl CandidateSupplier for MemoryStore {
    fn approved_requests(&mut self, shift_id: i32) -> AssignResult<Vec<ShiftRequest>> {
        self.statements += 1;
        Ok(self.requests_with_status(shift_id, RequestStatus::Approved))
    }

    fn pending_requests(&mut self, shift_id: i32) -> AssignResult<Vec<ShiftRequest>> {
        self.statements += 1;
        Ok(self.requests_with_status(shift_id, RequestStatus::Pending))
    }

    fn availability_pool(&mut self, shift: &ShiftSlot) -> AssignResult<Vec<i32>> {
        self.statements += 1;
        let mut users: Vec<i32> = self
            .availabilities
            .iter()
            .filter(|a| a.weekday == shift.weekday() && shift.overlaps(a.start_time, a.end_time))
            .map(|a| a.user_id)
            .collect();
        users.sort_unstable();
        users.dedup();
        Ok(users)
    }
}

impl AssignmentStore for MemoryStore {
    fn atomic<T>(&mut self, f: impl FnOnce(&mut Self) -> AssignResult<T>) -> AssignResult<T> {
        let snapshot = self.clone();
        let result = f(self).and_then(|value| {
            if self.fail_commit {
                return Err(AssignError::Database(
                    diesel::result::Error::RollbackTransaction,
                ));
            }
            Ok(value)
        });
        if result.is_err() {
            // keep the counter, it tracks work done rather than data
            let statements = self.statements;
            *self = snapshot;
            self.statements = statements;
        }
        result
    }

    fn capabilities(&self) -> SchemaCapabilities {
        self.caps
    }

    fn statements(&self) -> u32 {
        self.statements
    }

    fn lock_shift(&mut self, shift_id: i32) -> AssignResult<Option<ShiftSlot>> {
        self.statements += 1;
        Ok(self.find_shift(shift_id))
    }

    fn shift(&mut self, shift_id: i32) -> AssignResult<Option<ShiftSlot>> {
        self.statements += 1;
        Ok(self.find_shift(shift_id))
    }

    fn participants(&mut self, shift_id: i32) -> AssignResult<Vec<Participant>> {
        self.statements += 1;
        Ok(self
            .participants
            .iter()
            .filter(|p| p.shift_id == shift_id)
            .cloned()
            .collect())
    }

    fn is_participant(&mut self, shift_id: i32, user_id: i32) -> AssignResult<bool> {
        self.statements += 1;
        Ok(self
            .participants
            .iter()
            .any(|p| p.shift_id == shift_id && p.user_id == user_id))
    }

    fn participant_language_ids(&mut self, shift_id: i32) -> AssignResult<Vec<Option<i32>>> {
        self.statements += 1;
        let user_language = self.caps.user_language;
        Ok(self
            .participants
            .iter()
            .filter(|p| p.shift_id == shift_id)
            .map(|p| {
                if user_language {
                    self.user_languages.get(&p.user_id).copied()
                } else {
                    None
                }
            })
            .collect())
    }

    fn insert_participant(&mut self, participant: &NewParticipant) -> AssignResult<()> {
        self.statements += 1;
        let duplicate = self
            .participants
            .iter()
            .any(|p| p.shift_id == participant.shift_id && p.user_id == participant.user_id);
        if duplicate || self.fail_inserts_for.contains(&participant.user_id) {
            return Err(AssignError::Database(diesel::result::Error::RollbackTransaction));
        }
        let id = self.next_id();
        self.participants.push(Participant {
            id,
            shift_id: participant.shift_id,
            user_id: participant.user_id,
            role: participant.role.clone(),
            assigned_by: participant.assigned_by,
            assigned_at: participant.assigned_at,
            attended: participant.attended,
        });
        Ok(())
    }

    fn approve_request(&mut self, request_id: i32, at: NaiveDateTime) -> AssignResult<()> {
        self.statements += 1;
        if let Some(request) = self.requests.iter_mut().find(|r| r.id == request_id) {
            request.status = RequestStatus::Approved.as_str().to_string();
            request.processed_at = Some(at);
        }
        Ok(())
    }

    fn candidate_facts(
        &mut self,
        user_id: i32,
        shift: &ShiftSlot,
        recent_since: NaiveDate,
    ) -> AssignResult<CandidateFacts> {
        self.statements += 1;
        let preference = if self.caps.point_preferences {
            self.preferences
                .iter()
                .find(|(u, p, _)| *u == user_id && *p == shift.point_id)
                .map(|(_, _, level)| *level)
        } else {
            None
        };
        let user_language_id = if self.caps.user_language {
            self.user_languages.get(&user_id).copied()
        } else {
            None
        };

        let blocking: Vec<&str> = ShiftStatus::blocking().iter().map(|s| s.as_str()).collect();
        let mut booked = Vec::new();
        let mut recent_shift_count = 0;
        for participation in self.participants.iter().filter(|p| p.user_id == user_id) {
            let Some(other) = self.shifts.iter().find(|s| s.id == participation.shift_id) else {
                continue;
            };
            if other.date >= recent_since {
                recent_shift_count += 1;
            }
            if other.date == shift.date && other.id != shift.id && blocking.contains(&other.status.as_str()) {
                booked.push(BookedWindow {
                    shift_id: other.id,
                    start_time: other.start_time,
                    end_time: other.end_time,
                    status: other.status.clone(),
                });
            }
        }

        Ok(CandidateFacts {
            user_id,
            preference,
            user_language_id,
            availability: self
                .availabilities
                .iter()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect(),
            absences: self
                .absences
                .iter()
                .filter(|a| a.user_id == user_id && a.start_date <= shift.date && a.end_date >= shift.date)
                .map(|a| (a.start_date, a.end_date))
                .collect(),
            booked,
            has_request: self
                .requests
                .iter()
                .any(|r| r.user_id == user_id && r.shift_id == shift.id),
            recent_shift_count,
        })
    }

    fn set_shift_status(&mut self, shift_id: i32, status: ShiftStatus, _at: NaiveDateTime) -> AssignResult<()> {
        self.statements += 1;
        if self.fail_status_update {
            return Err(AssignError::Database(diesel::result::Error::NotFound));
        }
        if let Some(shift) = self.shifts.iter_mut().find(|s| s.id == shift_id) {
            shift.status = status.as_str().to_string();
        }
        Ok(())
    }

    fn insert_notification_if_absent(
        &mut self,
        notification: &NewNotification,
        since: NaiveDateTime,
    ) -> AssignResult<bool> {
        self.statements += 1;
        if self.fail_notifications {
            return Err(AssignError::Database(diesel::result::Error::NotFound));
        }
        let exists = self.notifications.iter().any(|n| {
            n.shift_id == notification.shift_id
                && n.user_id == notification.user_id
                && n.kind == notification.kind
                && n.created_at >= since
        });
        if exists {
            return Ok(false);
        }
        self.notifications.push(notification.clone());
        Ok(true)
    }

    fn persist_log_lines(&mut self, shift_id: i32, lines: &[String], _at: NaiveDateTime) -> AssignResult<usize> {
        self.statements += 1;
        if !self.caps.assignment_log {
            return Ok(0);
        }
        self.logs
            .extend(lines.iter().map(|line| (shift_id, line.clone())));
        Ok(lines.len())
    }

    fn shifts_in_horizon(&mut self, from: NaiveDate, to: NaiveDate, limit: i64) -> AssignResult<Vec<i32>> {
        self.statements += 1;
        let mut rows: Vec<&ShiftSlot> = self
            .shifts
            .iter()
            .filter(|s| s.date >= from && s.date <= to)
            .collect();
        rows.sort_by(|a, b| (a.date, a.start_time, a.id).cmp(&(b.date, b.start_time, b.id)));
        Ok(rows
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|s| s.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_restores_on_error() {
        let mut store = MemoryStore::new();
        store.add_shift(slot(1, monday(), (10, 0), (12, 0), 1, 2));
        let result: AssignResult<()> = store.atomic(|s| {
            s.add_participant(1, 5, "publisher");
            Err(AssignError::ShiftNotFound(1))
        });
        assert!(result.is_err());
        assert!(store.users_on(1).is_empty());
    }

    #[test]
    fn test_availability_pool_filters_weekday_and_window() {
        let mut store = MemoryStore::new();
        let shift = slot(1, monday(), (10, 0), (12, 0), 1, 2);
        store.add_availability(3, 1, (9, 0), (11, 0));
        store.add_availability(2, 1, (12, 0), (14, 0));
        store.add_availability(1, 2, (10, 0), (12, 0));
        store.add_availability(3, 1, (11, 0), (13, 0));
        assert_eq!(store.availability_pool(&shift).unwrap(), vec![3]);
    }
}
