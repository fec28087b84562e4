use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::AssignmentStatus;

/// User as synced from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub first_name: String,
    pub username: Option<String>,
}

/// A classroom: one chat thread inside one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRecord {
    pub context_key: String,
    pub group_key: String,
    pub thread_key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i32,
    pub topic_id: String,
    pub name: String,
    pub code: Option<String>,
    pub instructor: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFields {
    pub name: String,
    pub code: Option<String>,
    pub instructor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: i32,
    pub course_id: i32,
    pub day_of_week: i32,
    pub start_time: String,
    pub end_time: String,
    pub location: Option<String>,
}

/// Schedule row joined with its course, as listed to students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: i32,
    pub day_of_week: i32,
    pub start_time: String,
    pub end_time: String,
    pub location: Option<String>,
    pub course_id: i32,
    pub course_name: String,
    pub code: Option<String>,
    pub instructor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleFields {
    pub course_id: i32,
    pub day_of_week: i32,
    /// `HH:MM`, 24-hour.
    pub start_time: String,
    pub end_time: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub attachment_url: Option<String>,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
}

/// Assignment joined with its course name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEntry {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub course_id: i32,
    pub course_name: String,
    pub status: AssignmentStatus,
    pub attachment_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentFields {
    pub course_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub attachment_url: Option<String>,
    pub status: AssignmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: i32,
    pub topic_id: String,
    pub course_id: Option<i32>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementFields {
    pub content: String,
    pub course_id: Option<i32>,
}

/// The single academic calendar link a classroom may publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CalendarLink {
    pub id: i32,
    pub topic_id: String,
    pub url: String,
    pub updated_at: DateTime<Utc>,
}
