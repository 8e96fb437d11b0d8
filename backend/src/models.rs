use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Lifecycle status of a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Created,
    Pending,
    Open,
    Assigned,
    Scheduled,
    Published,
    Completed,
    Cancelled,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Created => "created",
            ShiftStatus::Pending => "pending",
            ShiftStatus::Open => "open",
            ShiftStatus::Assigned => "assigned",
            ShiftStatus::Scheduled => "scheduled",
            ShiftStatus::Published => "published",
            ShiftStatus::Completed => "completed",
            ShiftStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(ShiftStatus::Created),
            "pending" => Some(ShiftStatus::Pending),
            "open" => Some(ShiftStatus::Open),
            "assigned" => Some(ShiftStatus::Assigned),
            "scheduled" => Some(ShiftStatus::Scheduled),
            "published" => Some(ShiftStatus::Published),
            "completed" => Some(ShiftStatus::Completed),
            "cancelled" => Some(ShiftStatus::Cancelled),
            _ => None,
        }
    }

    /// Statuses whose participants block an overlapping assignment on the same day.
    pub fn blocking() -> [ShiftStatus; 3] {
        [ShiftStatus::Assigned, ShiftStatus::Scheduled, ShiftStatus::Pending]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Captain,
    Publisher,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Captain => "captain",
            ParticipantRole::Publisher => "publisher",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "captain" => Some(ParticipantRole::Captain),
            "publisher" => Some(ParticipantRole::Publisher),
            _ => None,
        }
    }
}

/// How a user rates a given point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceLevel {
    Preferred,
    Possible,
    NotPossible,
}

impl PreferenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceLevel::Preferred => "preferred",
            PreferenceLevel::Possible => "possible",
            PreferenceLevel::NotPossible => "not_possible",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "preferred" => Some(PreferenceLevel::Preferred),
            "possible" => Some(PreferenceLevel::Possible),
            "not_possible" => Some(PreferenceLevel::NotPossible),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }
}

/// `NOT (a.end <= b.start OR a.start >= b.end)`: half-open windows that share any instant.
pub fn windows_overlap(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    !(a_end <= b_start || a_start >= b_end)
}

/// ISO weekday, Monday = 1 .. Sunday = 7.
pub fn iso_weekday(date: NaiveDate) -> i32 {
    date.weekday().number_from_monday() as i32
}

/// A shift joined with its point, as seen by the engine while the row is locked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftSlot {
    pub id: i32,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub point_id: i32,
    pub point_name: String,
    pub min_seats: i32,
    pub max_seats: i32,
    pub status: String,
    pub point_language_id: Option<i32>,
}

impl ShiftSlot {
    pub fn weekday(&self) -> i32 {
        iso_weekday(self.date)
    }

    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        windows_overlap(start, end, self.start_time, self.end_time)
    }
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::shifts)]
pub struct Shift {
    pub id: i32,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub point_id: i32,
    pub min_seats: Option<i32>,
    pub max_seats: Option<i32>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::shift_participants)]
pub struct Participant {
    pub id: i32,
    pub shift_id: i32,
    pub user_id: i32,
    pub role: String,
    pub assigned_by: Option<i32>,
    pub assigned_at: NaiveDateTime,
    pub attended: bool,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::shift_participants)]
pub struct NewParticipant {
    pub shift_id: i32,
    pub user_id: i32,
    pub role: String,
    pub assigned_by: Option<i32>,
    pub assigned_at: NaiveDateTime,
    pub attended: bool,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::shift_requests)]
pub struct ShiftRequest {
    pub id: i32,
    pub user_id: i32,
    pub shift_id: i32,
    pub role: String,
    pub status: String,
    pub requested_at: NaiveDateTime,
    pub processed_by: Option<i32>,
    pub processed_at: Option<NaiveDateTime>,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::availabilities)]
pub struct Availability {
    pub id: i32,
    pub user_id: i32,
    pub weekday: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::absences)]
pub struct Absence {
    pub id: i32,
    pub user_id: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::notifications)]
pub struct Notification {
    pub id: i32,
    pub shift_id: i32,
    pub user_id: i32,
    pub kind: String,
    pub message: String,
    pub payload: Option<JsonValue>,
    pub channel: String,
    pub status: String,
    pub attempts: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NewNotification {
    pub shift_id: i32,
    pub user_id: i32,
    pub kind: String,
    pub message: String,
    pub payload: Option<JsonValue>,
    pub channel: String,
    pub status: String,
    pub attempts: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::assignment_logs)]
pub struct NewAssignmentLog<'a> {
    pub shift_id: i32,
    pub message: &'a str,
    pub created_at: NaiveDateTime,
}
