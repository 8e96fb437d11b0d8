//! Storage seam of the assignment engine.
//!
//! `AssignmentStore` lists every read and write the pipeline performs.
//! `PgAssignmentStore` is the diesel implementation running on a single
//! connection; the pipeline wraps each shift in [`AssignmentStore::atomic`].

use crate::error::AssignResult;
use crate::models::{
    Absence, Availability, NewAssignmentLog, NewNotification, NewParticipant, Participant,
    PreferenceLevel, RequestStatus, Shift, ShiftSlot, ShiftStatus,
};
use crate::schema::{
    absences, assignment_logs, availabilities, notifications, points, shift_participants,
    shift_requests, shifts, user_point_preferences, users,
};
use crate::services::candidates::CandidateSupplier;
use crate::services::eligibility::{BookedWindow, CandidateFacts};
use crate::services::schema_probe::SchemaCapabilities;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::dsl::count_star;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use log::warn;

pub trait AssignmentStore: CandidateSupplier {
    /// Run `f` as one unit: committed when it returns `Ok`, rolled back otherwise.
    /// A unit the backend can no longer commit is reported as `Err`.
    fn atomic<T>(&mut self, f: impl FnOnce(&mut Self) -> AssignResult<T>) -> AssignResult<T>
    where
        Self: Sized;

    fn capabilities(&self) -> SchemaCapabilities;

    /// Statements issued through this store so far.
    fn statements(&self) -> u32;

    /// Shift with its point's capacity and language; the shift row stays
    /// locked until the surrounding unit ends.
    fn lock_shift(&mut self, shift_id: i32) -> AssignResult<Option<ShiftSlot>>;

    /// Same view without taking a lock.
    fn shift(&mut self, shift_id: i32) -> AssignResult<Option<ShiftSlot>>;

    fn participants(&mut self, shift_id: i32) -> AssignResult<Vec<Participant>>;

    fn is_participant(&mut self, shift_id: i32, user_id: i32) -> AssignResult<bool>;

    /// Language of every participant, `None` where unknown.
    fn participant_language_ids(&mut self, shift_id: i32) -> AssignResult<Vec<Option<i32>>>;

    /// Insert one participant. A failure leaves the surrounding unit usable.
    fn insert_participant(&mut self, participant: &NewParticipant) -> AssignResult<()>;

    fn approve_request(&mut self, request_id: i32, at: NaiveDateTime) -> AssignResult<()>;

    fn candidate_facts(
        &mut self,
        user_id: i32,
        shift: &ShiftSlot,
        recent_since: NaiveDate,
    ) -> AssignResult<CandidateFacts>;

    fn set_shift_status(
        &mut self,
        shift_id: i32,
        status: ShiftStatus,
        at: NaiveDateTime,
    ) -> AssignResult<()>;

    /// Insert `notification` unless the same (shift, user, kind) exists with
    /// `created_at >= since`. Check and insert share one savepoint, so a
    /// failure leaves the surrounding unit usable. Returns whether a row was written.
    fn insert_notification_if_absent(
        &mut self,
        notification: &NewNotification,
        since: NaiveDateTime,
    ) -> AssignResult<bool>;

    /// Copy log lines into the log table; returns how many were written
    /// (zero when the table is absent).
    fn persist_log_lines(
        &mut self,
        shift_id: i32,
        lines: &[String],
        at: NaiveDateTime,
    ) -> AssignResult<usize>;

    /// Shift ids dated within `[from, to]`, by date then start time.
    fn shifts_in_horizon(
        &mut self,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> AssignResult<Vec<i32>>;
}

pub struct PgAssignmentStore<'a> {
    conn: &'a mut PgConnection,
    capabilities: SchemaCapabilities,
    statements: u32,
}

impl<'a> PgAssignmentStore<'a> {
    pub fn new(conn: &'a mut PgConnection, capabilities: SchemaCapabilities) -> Self {
        Self {
            conn,
            capabilities,
            statements: 0,
        }
    }

    /// Connection for one statement; every query goes through here so it is counted.
    pub(crate) fn conn(&mut self) -> &mut PgConnection {
        self.statements += 1;
        self.conn
    }

    /// Only the shift row is locked; the point is read without a lock so
    /// shifts sharing a point do not contend.
    fn load_shift(&mut self, shift_id: i32, lock: bool) -> AssignResult<Option<ShiftSlot>> {
        let query = shifts::table.find(shift_id).select(Shift::as_select());
        let shift = if lock {
            query.for_update().first(self.conn()).optional()?
        } else {
            query.first(self.conn()).optional()?
        };
        let Some(shift) = shift else {
            return Ok(None);
        };

        let (point_name, point_min, point_max) = points::table
            .find(shift.point_id)
            .select((points::name, points::min_seats, points::max_seats))
            .first::<(String, i32, i32)>(self.conn())?;

        let point_language_id = if self.capabilities.point_language {
            points::table
                .find(shift.point_id)
                .select(points::language_id)
                .first::<Option<i32>>(self.conn())?
        } else {
            None
        };

        Ok(Some(ShiftSlot {
            id: shift.id,
            date: shift.date,
            start_time: shift.start_time,
            end_time: shift.end_time,
            point_id: shift.point_id,
            point_name,
            min_seats: shift.min_seats.unwrap_or(point_min),
            max_seats: shift.max_seats.unwrap_or(point_max),
            status: shift.status,
            point_language_id,
        }))
    }
}

impl AssignmentStore for PgAssignmentStore<'_> {
    fn atomic<T>(&mut self, f: impl FnOnce(&mut Self) -> AssignResult<T>) -> AssignResult<T> {
        <AnsiTransactionManager as TransactionManager<PgConnection>>::begin_transaction(self.conn())?;
        // A statement that failed outside a savepoint aborts the transaction and
        // COMMIT then silently rolls back; a trivial statement first turns that into an error.
        let outcome = f(self).and_then(|value| {
            diesel::sql_query("SELECT 1").execute(self.conn())?;
            Ok(value)
        });
        match outcome {
            Ok(value) => {
                <AnsiTransactionManager as TransactionManager<PgConnection>>::commit_transaction(
                    self.conn,
                )?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) =
                    <AnsiTransactionManager as TransactionManager<PgConnection>>::rollback_transaction(
                        self.conn,
                    )
                {
                    warn!("Rollback failed after error '{}': {}", e, rollback_err);
                }
                Err(e)
            }
        }
    }

    fn capabilities(&self) -> SchemaCapabilities {
        self.capabilities
    }

    fn statements(&self) -> u32 {
        self.statements
    }

    fn lock_shift(&mut self, shift_id: i32) -> AssignResult<Option<ShiftSlot>> {
        self.load_shift(shift_id, true)
    }

    fn shift(&mut self, shift_id: i32) -> AssignResult<Option<ShiftSlot>> {
        self.load_shift(shift_id, false)
    }

    fn participants(&mut self, shift_id: i32) -> AssignResult<Vec<Participant>> {
        let rows = shift_participants::table
            .filter(shift_participants::shift_id.eq(shift_id))
            .order(shift_participants::id.asc())
            .select(Participant::as_select())
            .load(self.conn())?;
        Ok(rows)
    }

    fn is_participant(&mut self, shift_id: i32, user_id: i32) -> AssignResult<bool> {
        let count: i64 = shift_participants::table
            .filter(shift_participants::shift_id.eq(shift_id))
            .filter(shift_participants::user_id.eq(user_id))
            .select(count_star())
            .get_result(self.conn())?;
        Ok(count > 0)
    }

    fn participant_language_ids(&mut self, shift_id: i32) -> AssignResult<Vec<Option<i32>>> {
        if !self.capabilities.user_language {
            let count: i64 = shift_participants::table
                .filter(shift_participants::shift_id.eq(shift_id))
                .select(count_star())
                .get_result(self.conn())?;
            return Ok(vec![None; count as usize]);
        }
        let languages = shift_participants::table
            .inner_join(users::table.on(users::id.eq(shift_participants::user_id)))
            .filter(shift_participants::shift_id.eq(shift_id))
            .select(users::language_id)
            .load::<Option<i32>>(self.conn())?;
        Ok(languages)
    }

    fn insert_participant(&mut self, participant: &NewParticipant) -> AssignResult<()> {
        // nested transaction = savepoint, so a constraint error does not poison the outer one
        self.conn().transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::insert_into(shift_participants::table)
                .values(participant)
                .execute(conn)
        })?;
        Ok(())
    }

    fn approve_request(&mut self, request_id: i32, at: NaiveDateTime) -> AssignResult<()> {
        diesel::update(shift_requests::table.filter(shift_requests::id.eq(request_id)))
            .set((
                shift_requests::status.eq(RequestStatus::Approved.as_str()),
                shift_requests::processed_at.eq(Some(at)),
            ))
            .execute(self.conn())?;
        Ok(())
    }

    fn candidate_facts(
        &mut self,
        user_id: i32,
        shift: &ShiftSlot,
        recent_since: NaiveDate,
    ) -> AssignResult<CandidateFacts> {
        let preference = if self.capabilities.point_preferences {
            user_point_preferences::table
                .filter(user_point_preferences::user_id.eq(user_id))
                .filter(user_point_preferences::point_id.eq(shift.point_id))
                .select(user_point_preferences::level)
                .first::<String>(self.conn())
                .optional()?
                .and_then(|level| PreferenceLevel::from_str(&level))
        } else {
            None
        };

        let user_language_id = if self.capabilities.user_language {
            users::table
                .find(user_id)
                .select(users::language_id)
                .first::<Option<i32>>(self.conn())
                .optional()?
                .flatten()
        } else {
            None
        };

        let availability = availabilities::table
            .filter(availabilities::user_id.eq(user_id))
            .select(Availability::as_select())
            .load(self.conn())?;

        let absences = absences::table
            .filter(absences::user_id.eq(user_id))
            .filter(absences::start_date.le(shift.date))
            .filter(absences::end_date.ge(shift.date))
            .select(Absence::as_select())
            .load(self.conn())?
            .into_iter()
            .map(|a| (a.start_date, a.end_date))
            .collect();

        let blocking: Vec<&str> = ShiftStatus::blocking().iter().map(|s| s.as_str()).collect();
        let booked = shift_participants::table
            .inner_join(shifts::table)
            .filter(shift_participants::user_id.eq(user_id))
            .filter(shifts::date.eq(shift.date))
            .filter(shifts::id.ne(shift.id))
            .filter(shifts::status.eq_any(blocking))
            .select((shifts::id, shifts::start_time, shifts::end_time, shifts::status))
            .load::<(i32, NaiveTime, NaiveTime, String)>(self.conn())?
            .into_iter()
            .map(|(shift_id, start_time, end_time, status)| BookedWindow {
                shift_id,
                start_time,
                end_time,
                status,
            })
            .collect();

        let requests: i64 = shift_requests::table
            .filter(shift_requests::user_id.eq(user_id))
            .filter(shift_requests::shift_id.eq(shift.id))
            .select(count_star())
            .get_result(self.conn())?;

        let recent_shift_count: i64 = shift_participants::table
            .inner_join(shifts::table)
            .filter(shift_participants::user_id.eq(user_id))
            .filter(shifts::date.ge(recent_since))
            .select(count_star())
            .get_result(self.conn())?;

        Ok(CandidateFacts {
            user_id,
            preference,
            user_language_id,
            availability,
            absences,
            booked,
            has_request: requests > 0,
            recent_shift_count,
        })
    }

    fn set_shift_status(
        &mut self,
        shift_id: i32,
        status: ShiftStatus,
        at: NaiveDateTime,
    ) -> AssignResult<()> {
        diesel::update(shifts::table.filter(shifts::id.eq(shift_id)))
            .set((shifts::status.eq(status.as_str()), shifts::updated_at.eq(at)))
            .execute(self.conn())?;
        Ok(())
    }

    fn insert_notification_if_absent(
        &mut self,
        notification: &NewNotification,
        since: NaiveDateTime,
    ) -> AssignResult<bool> {
        let written = self.conn().transaction::<_, diesel::result::Error, _>(|conn| {
            let existing: i64 = notifications::table
                .filter(notifications::shift_id.eq(notification.shift_id))
                .filter(notifications::user_id.eq(notification.user_id))
                .filter(notifications::kind.eq(&notification.kind))
                .filter(notifications::created_at.ge(since))
                .select(count_star())
                .get_result(conn)?;
            if existing > 0 {
                return Ok(false);
            }
            diesel::insert_into(notifications::table)
                .values(notification)
                .execute(conn)?;
            Ok(true)
        })?;
        Ok(written)
    }

    fn persist_log_lines(
        &mut self,
        shift_id: i32,
        lines: &[String],
        at: NaiveDateTime,
    ) -> AssignResult<usize> {
        if !self.capabilities.assignment_log {
            return Ok(0);
        }
        let written = self.conn().transaction::<_, diesel::result::Error, _>(|conn| {
            let mut written = 0;
            for line in lines {
                written += diesel::insert_into(assignment_logs::table)
                    .values(&NewAssignmentLog {
                        shift_id,
                        message: line,
                        created_at: at,
                    })
                    .execute(conn)?;
            }
            Ok(written)
        })?;
        Ok(written)
    }

    fn shifts_in_horizon(
        &mut self,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> AssignResult<Vec<i32>> {
        let ids = shifts::table
            .filter(shifts::date.between(from, to))
            .order((shifts::date.asc(), shifts::start_time.asc(), shifts::id.asc()))
            .select(shifts::id)
            .limit(limit)
            .load::<i32>(self.conn())?;
        Ok(ids)
    }
}
