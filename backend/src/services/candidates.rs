//! Candidate streams consumed by the assignment pipeline.

use crate::error::AssignResult;
use crate::models::{RequestStatus, ShiftRequest, ShiftSlot};
use crate::schema::{availabilities, shift_requests};
use crate::services::store::PgAssignmentStore;
use diesel::prelude::*;

pub trait CandidateSupplier {
    /// Approved requests for the shift, oldest first.
    fn approved_requests(&mut self, shift_id: i32) -> AssignResult<Vec<ShiftRequest>>;

    /// Pending requests for the shift, oldest first.
    fn pending_requests(&mut self, shift_id: i32) -> AssignResult<Vec<ShiftRequest>>;

    /// Distinct users whose declared availability overlaps the shift's
    /// weekday and time window, by ascending user id.
    fn availability_pool(&mut self, shift: &ShiftSlot) -> AssignResult<Vec<i32>>;
}

impl PgAssignmentStore<'_> {
    fn requests_with_status(
        &mut self,
        shift_id: i32,
        status: RequestStatus,
    ) -> AssignResult<Vec<ShiftRequest>> {
        let rows = shift_requests::table
            .filter(shift_requests::shift_id.eq(shift_id))
            .filter(shift_requests::status.eq(status.as_str()))
            .order((shift_requests::requested_at.asc(), shift_requests::id.asc()))
            .select(ShiftRequest::as_select())
            .load(self.conn())?;
        Ok(rows)
    }
}

impl CandidateSupplier for PgAssignmentStore<'_> {
    fn approved_requests(&mut self, shift_id: i32) -> AssignResult<Vec<ShiftRequest>> {
        self.requests_with_status(shift_id, RequestStatus::Approved)
    }

    fn pending_requests(&mut self, shift_id: i32) -> AssignResult<Vec<ShiftRequest>> {
        self.requests_with_status(shift_id, RequestStatus::Pending)
    }

    fn availability_pool(&mut self, shift: &ShiftSlot) -> AssignResult<Vec<i32>> {
        // NOT (end <= shift.start OR start >= shift.end)
        let users = availabilities::table
            .filter(availabilities::weekday.eq(shift.weekday()))
            .filter(availabilities::end_time.gt(shift.start_time))
            .filter(availabilities::start_time.lt(shift.end_time))
            .select(availabilities::user_id)
            .distinct()
            .order(availabilities::user_id.asc())
            .load::<i32>(self.conn())?;
        Ok(users)
    }
}

/// Oldest request first, id as tie-breaker.
pub fn order_requests(requests: &mut [ShiftRequest]) {
    requests.sort_by(|a, b| a.requested_at.cmp(&b.requested_at).then(a.id.cmp(&b.id)));
}
