//! Persistence collaborator.
//!
//! [`RoleStore`] is what the authorization core and the classroom creation flow
//! need; [`ClassroomRepository`] is the CRUD surface behind the API handlers.
//! Both are implemented by [`PgStore`] and [`MemoryStore`].

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::Role;

pub use memory::MemoryStore;
pub use models::*;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid stored value: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A classroom-owned row, addressed for ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Course(i32),
    Schedule(i32),
    Assignment(i32),
    Announcement(i32),
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Course(id) => write!(f, "course {id}"),
            ResourceRef::Schedule(id) => write!(f, "schedule {id}"),
            ResourceRef::Assignment(id) => write!(f, "assignment {id}"),
            ResourceRef::Announcement(id) => write!(f, "announcement {id}"),
        }
    }
}

/// Role and classroom registry. Every upsert is idempotent on its natural key.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// All role rows for the pair, oldest first. Normally zero or one.
    async fn find_roles(&self, user_id: &str, context_key: &str) -> StoreResult<Vec<Role>>;

    /// Keyed by (user id, context key); an existing row takes the new role.
    async fn upsert_role(&self, user_id: &str, context_key: &str, role: Role) -> StoreResult<()>;

    async fn upsert_user(&self, user: &UserProfile) -> StoreResult<()>;

    async fn upsert_group(&self, group_key: &str, title: &str) -> StoreResult<()>;

    /// Keyed by context key; an existing topic keeps its group and takes the new name.
    async fn upsert_topic(&self, topic: &TopicRecord) -> StoreResult<()>;

    async fn ping(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait ClassroomRepository: Send + Sync {
    /// Scoped existence check: does `resource` exist and belong to `context_key`?
    async fn resource_in_context(&self, resource: ResourceRef, context_key: &str) -> StoreResult<bool>;

    async fn list_courses(&self, context_key: &str) -> StoreResult<Vec<Course>>;
    async fn create_course(&self, context_key: &str, fields: &CourseFields) -> StoreResult<Course>;
    async fn update_course(&self, id: i32, fields: &CourseFields) -> StoreResult<Course>;
    /// Cascades to the course's schedules, assignments and announcements.
    async fn delete_course(&self, id: i32) -> StoreResult<()>;

    /// Ordered by day of week, then start time.
    async fn list_schedule(&self, context_key: &str, day: Option<i32>) -> StoreResult<Vec<ScheduleEntry>>;
    async fn create_schedule(&self, fields: &ScheduleFields) -> StoreResult<Schedule>;
    async fn update_schedule(&self, id: i32, fields: &ScheduleFields) -> StoreResult<Schedule>;
    async fn delete_schedule(&self, id: i32) -> StoreResult<()>;

    /// Ordered by due date, earliest first.
    async fn list_assignments(&self, context_key: &str) -> StoreResult<Vec<AssignmentEntry>>;
    async fn get_assignment(&self, context_key: &str, id: i32) -> StoreResult<Option<AssignmentEntry>>;
    async fn create_assignment(&self, fields: &AssignmentFields) -> StoreResult<Assignment>;
    async fn update_assignment(&self, id: i32, fields: &AssignmentFields) -> StoreResult<Assignment>;
    async fn delete_assignment(&self, id: i32) -> StoreResult<()>;

    /// Newest first.
    async fn list_announcements(&self, context_key: &str) -> StoreResult<Vec<Announcement>>;
    async fn create_announcement(&self, context_key: &str, fields: &AnnouncementFields) -> StoreResult<Announcement>;
    async fn update_announcement(&self, id: i32, fields: &AnnouncementFields) -> StoreResult<Announcement>;
    async fn delete_announcement(&self, id: i32) -> StoreResult<()>;

    async fn get_calendar(&self, context_key: &str) -> StoreResult<Option<CalendarLink>>;
    /// One link per context; saving again replaces the url.
    async fn upsert_calendar(&self, context_key: &str, url: &str) -> StoreResult<CalendarLink>;
}

/// Everything the HTTP layer needs from persistence.
pub trait ClassroomStore: RoleStore + ClassroomRepository {}

impl<T: RoleStore + ClassroomRepository> ClassroomStore for T {}
