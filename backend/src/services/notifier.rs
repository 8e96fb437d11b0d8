use crate::error::AssignResult;
use crate::models::{NewNotification, NotificationStatus};
use crate::services::store::AssignmentStore;
use chrono::{Duration, NaiveDateTime};
use serde_json::json;

pub const KIND_COVERED: &str = "covered";

/// Records notifications for the external dispatcher. Delivery is not done here.
#[derive(Debug, Clone)]
pub struct Notifier {
    channel: String,
    dedupe_window: Duration,
}

impl Notifier {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            dedupe_window: Duration::hours(1),
        }
    }

    /// Insert a notification unless the same (shift, user, kind) was recorded
    /// within the last hour. Returns whether a row was created.
    pub fn notify_if_absent<S: AssignmentStore>(
        &self,
        store: &mut S,
        shift_id: i32,
        user_id: i32,
        kind: &str,
        message: &str,
        now: NaiveDateTime,
    ) -> AssignResult<bool> {
        let notification = NewNotification {
            shift_id,
            user_id,
            kind: kind.to_string(),
            message: message.to_string(),
            payload: Some(json!({ "shift_id": shift_id })),
            channel: self.channel.clone(),
            status: NotificationStatus::Pending.as_str().to_string(),
            attempts: 0,
            created_at: now,
        };
        store.insert_notification_if_absent(&notification, now - self.dedupe_window)
    }

    pub fn covered_message(shift_id: i32) -> String {
        format!("You have been assigned to shift #{}", shift_id)
    }
}
