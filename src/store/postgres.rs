use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use tracing::info;

use super::models::*;
use super::{ClassroomRepository, ResourceRef, RoleStore, StoreError, StoreResult};
use crate::types::{AssignmentStatus, Role};

/// Tables backing the store. The unique constraints are what make the upserts idempotent.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        telegram_id TEXT PRIMARY KEY,
        first_name TEXT NOT NULL,
        username TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS groups (
        telegram_id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS topics (
        id TEXT PRIMARY KEY,
        telegram_id TEXT NOT NULL,
        group_id TEXT NOT NULL REFERENCES groups (telegram_id),
        name TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS user_roles (
        id SERIAL PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users (telegram_id),
        topic_id TEXT NOT NULL REFERENCES topics (id),
        role TEXT NOT NULL DEFAULT 'student' CHECK (role IN ('student', 'representative', 'admin')),
        UNIQUE (user_id, topic_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS courses (
        id SERIAL PRIMARY KEY,
        topic_id TEXT NOT NULL REFERENCES topics (id),
        name TEXT NOT NULL,
        code TEXT,
        instructor TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS schedules (
        id SERIAL PRIMARY KEY,
        course_id INTEGER NOT NULL REFERENCES courses (id) ON DELETE CASCADE,
        day_of_week INTEGER NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        location TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS assignments (
        id SERIAL PRIMARY KEY,
        course_id INTEGER NOT NULL REFERENCES courses (id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT,
        due_date TIMESTAMPTZ NOT NULL,
        attachment_url TEXT,
        status TEXT NOT NULL DEFAULT 'upcoming' CHECK (status IN ('upcoming', 'overdue', 'completed')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS announcements (
        id SERIAL PRIMARY KEY,
        topic_id TEXT NOT NULL REFERENCES topics (id),
        course_id INTEGER REFERENCES courses (id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS academic_calendars (
        id SERIAL PRIMARY KEY,
        topic_id TEXT NOT NULL UNIQUE REFERENCES topics (id),
        url TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
];

const SCHEDULE_ENTRY_SELECT: &str = r#"
    SELECT s.id, s.day_of_week, s.start_time, s.end_time, s.location,
           c.id AS course_id, c.name AS course_name, c.code, c.instructor
    FROM schedules s
    INNER JOIN courses c ON c.id = s.course_id
"#;

const ASSIGNMENT_ENTRY_SELECT: &str = r#"
    SELECT a.id, a.title, a.description, a.due_date, a.status, a.attachment_url,
           c.id AS course_id, c.name AS course_name
    FROM assignments a
    INNER JOIN courses c ON c.id = a.course_id
"#;

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        info!("Created database pool (max {} connections)", max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create missing tables. Safe to run on every start.
    pub async fn bootstrap(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Store schema ready ({} tables)", SCHEMA.len());
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn status_from_row(row: &PgRow) -> StoreResult<AssignmentStatus> {
    let raw: String = row.try_get("status")?;
    raw.parse().map_err(|e: crate::types::UnknownVariant| StoreError::Corrupt(e.to_string()))
}

fn assignment_from_row(row: &PgRow) -> StoreResult<Assignment> {
    Ok(Assignment {
        id: row.try_get("id")?,
        course_id: row.try_get("course_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        due_date: row.try_get("due_date")?,
        attachment_url: row.try_get("attachment_url")?,
        status: status_from_row(row)?,
        created_at: row.try_get("created_at")?,
    })
}

fn assignment_entry_from_row(row: &PgRow) -> StoreResult<AssignmentEntry> {
    Ok(AssignmentEntry {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        due_date: row.try_get("due_date")?,
        course_id: row.try_get("course_id")?,
        course_name: row.try_get("course_name")?,
        status: status_from_row(row)?,
        attachment_url: row.try_get("attachment_url")?,
    })
}

fn not_found(resource: ResourceRef) -> StoreError {
    StoreError::NotFound(resource.to_string())
}

fn expect_deleted(rows_affected: u64, resource: ResourceRef) -> StoreResult<()> {
    if rows_affected == 0 {
        return Err(not_found(resource));
    }
    Ok(())
}

#[async_trait]
impl RoleStore for PgStore {
    async fn find_roles(&self, user_id: &str, context_key: &str) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query("SELECT role FROM user_roles WHERE user_id = $1 AND topic_id = $2 ORDER BY id")
            .bind(user_id)
            .bind(context_key)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let raw: String = row.try_get("role")?;
                raw.parse::<Role>().map_err(|e| StoreError::Corrupt(e.to_string()))
            })
            .collect()
    }

    async fn upsert_role(&self, user_id: &str, context_key: &str, role: Role) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, topic_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, topic_id) DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(user_id)
        .bind(context_key)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_user(&self, user: &UserProfile) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (telegram_id, first_name, username)
            VALUES ($1, $2, $3)
            ON CONFLICT (telegram_id) DO UPDATE
            SET first_name = EXCLUDED.first_name, username = EXCLUDED.username
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.first_name)
        .bind(&user.username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_group(&self, group_key: &str, title: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO groups (telegram_id, title) VALUES ($1, $2)
            ON CONFLICT (telegram_id) DO UPDATE SET title = EXCLUDED.title
            "#,
        )
        .bind(group_key)
        .bind(title)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_topic(&self, topic: &TopicRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO topics (id, telegram_id, group_id, name) VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(&topic.context_key)
        .bind(&topic.thread_key)
        .bind(&topic.group_key)
        .bind(&topic.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ClassroomRepository for PgStore {
    async fn resource_in_context(&self, resource: ResourceRef, context_key: &str) -> StoreResult<bool> {
        let (query, id) = match resource {
            ResourceRef::Course(id) => (
                "SELECT EXISTS (SELECT 1 FROM courses WHERE id = $1 AND topic_id = $2)",
                id,
            ),
            ResourceRef::Schedule(id) => (
                "SELECT EXISTS (SELECT 1 FROM schedules s INNER JOIN courses c ON c.id = s.course_id WHERE s.id = $1 AND c.topic_id = $2)",
                id,
            ),
            ResourceRef::Assignment(id) => (
                "SELECT EXISTS (SELECT 1 FROM assignments a INNER JOIN courses c ON c.id = a.course_id WHERE a.id = $1 AND c.topic_id = $2)",
                id,
            ),
            ResourceRef::Announcement(id) => (
                "SELECT EXISTS (SELECT 1 FROM announcements WHERE id = $1 AND topic_id = $2)",
                id,
            ),
        };

        let exists: (bool,) = sqlx::query_as(query)
            .bind(id)
            .bind(context_key)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists.0)
    }

    async fn list_courses(&self, context_key: &str) -> StoreResult<Vec<Course>> {
        let courses = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE topic_id = $1 ORDER BY id")
            .bind(context_key)
            .fetch_all(&self.pool)
            .await?;
        Ok(courses)
    }

    async fn create_course(&self, context_key: &str, fields: &CourseFields) -> StoreResult<Course> {
        let course = sqlx::query_as::<_, Course>(
            "INSERT INTO courses (topic_id, name, code, instructor) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(context_key)
        .bind(&fields.name)
        .bind(&fields.code)
        .bind(&fields.instructor)
        .fetch_one(&self.pool)
        .await?;
        Ok(course)
    }

    async fn update_course(&self, id: i32, fields: &CourseFields) -> StoreResult<Course> {
        sqlx::query_as::<_, Course>(
            "UPDATE courses SET name = $2, code = $3, instructor = $4 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.code)
        .bind(&fields.instructor)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(ResourceRef::Course(id)))
    }

    async fn delete_course(&self, id: i32) -> StoreResult<()> {
        // Announcements reference courses with a cascade as well.
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_deleted(result.rows_affected(), ResourceRef::Course(id))
    }

    async fn list_schedule(&self, context_key: &str, day: Option<i32>) -> StoreResult<Vec<ScheduleEntry>> {
        let query = format!(
            "{SCHEDULE_ENTRY_SELECT} WHERE c.topic_id = $1 AND ($2::INTEGER IS NULL OR s.day_of_week = $2) ORDER BY s.day_of_week, s.start_time, s.id"
        );
        let entries = sqlx::query_as::<_, ScheduleEntry>(&query)
            .bind(context_key)
            .bind(day)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    async fn create_schedule(&self, fields: &ScheduleFields) -> StoreResult<Schedule> {
        let schedule = sqlx::query_as::<_, Schedule>(
            r#"
            INSERT INTO schedules (course_id, day_of_week, start_time, end_time, location)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(fields.course_id)
        .bind(fields.day_of_week)
        .bind(&fields.start_time)
        .bind(&fields.end_time)
        .bind(&fields.location)
        .fetch_one(&self.pool)
        .await?;
        Ok(schedule)
    }

    async fn update_schedule(&self, id: i32, fields: &ScheduleFields) -> StoreResult<Schedule> {
        sqlx::query_as::<_, Schedule>(
            r#"
            UPDATE schedules
            SET course_id = $2, day_of_week = $3, start_time = $4, end_time = $5, location = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(fields.course_id)
        .bind(fields.day_of_week)
        .bind(&fields.start_time)
        .bind(&fields.end_time)
        .bind(&fields.location)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(ResourceRef::Schedule(id)))
    }

    async fn delete_schedule(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_deleted(result.rows_affected(), ResourceRef::Schedule(id))
    }

    async fn list_assignments(&self, context_key: &str) -> StoreResult<Vec<AssignmentEntry>> {
        let query = format!("{ASSIGNMENT_ENTRY_SELECT} WHERE c.topic_id = $1 ORDER BY a.due_date ASC, a.id");
        let rows = sqlx::query(&query)
            .bind(context_key)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(assignment_entry_from_row).collect()
    }

    async fn get_assignment(&self, context_key: &str, id: i32) -> StoreResult<Option<AssignmentEntry>> {
        let query = format!("{ASSIGNMENT_ENTRY_SELECT} WHERE c.topic_id = $1 AND a.id = $2");
        let row = sqlx::query(&query)
            .bind(context_key)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(assignment_entry_from_row).transpose()
    }

    async fn create_assignment(&self, fields: &AssignmentFields) -> StoreResult<Assignment> {
        let row = sqlx::query(
            r#"
            INSERT INTO assignments (course_id, title, description, due_date, attachment_url, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(fields.course_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.due_date)
        .bind(&fields.attachment_url)
        .bind(fields.status.as_str())
        .fetch_one(&self.pool)
        .await?;
        assignment_from_row(&row)
    }

    async fn update_assignment(&self, id: i32, fields: &AssignmentFields) -> StoreResult<Assignment> {
        let row = sqlx::query(
            r#"
            UPDATE assignments
            SET course_id = $2, title = $3, description = $4, due_date = $5, attachment_url = $6, status = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(fields.course_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.due_date)
        .bind(&fields.attachment_url)
        .bind(fields.status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(ResourceRef::Assignment(id)))?;
        assignment_from_row(&row)
    }

    async fn delete_assignment(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_deleted(result.rows_affected(), ResourceRef::Assignment(id))
    }

    async fn list_announcements(&self, context_key: &str) -> StoreResult<Vec<Announcement>> {
        let announcements = sqlx::query_as::<_, Announcement>(
            "SELECT * FROM announcements WHERE topic_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(context_key)
        .fetch_all(&self.pool)
        .await?;
        Ok(announcements)
    }

    async fn create_announcement(&self, context_key: &str, fields: &AnnouncementFields) -> StoreResult<Announcement> {
        let announcement = sqlx::query_as::<_, Announcement>(
            "INSERT INTO announcements (topic_id, content, course_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(context_key)
        .bind(&fields.content)
        .bind(fields.course_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(announcement)
    }

    async fn update_announcement(&self, id: i32, fields: &AnnouncementFields) -> StoreResult<Announcement> {
        sqlx::query_as::<_, Announcement>(
            "UPDATE announcements SET content = $2, course_id = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&fields.content)
        .bind(fields.course_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(ResourceRef::Announcement(id)))
    }

    async fn delete_announcement(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_deleted(result.rows_affected(), ResourceRef::Announcement(id))
    }

    async fn get_calendar(&self, context_key: &str) -> StoreResult<Option<CalendarLink>> {
        let link = sqlx::query_as::<_, CalendarLink>("SELECT * FROM academic_calendars WHERE topic_id = $1")
            .bind(context_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(link)
    }

    async fn upsert_calendar(&self, context_key: &str, url: &str) -> StoreResult<CalendarLink> {
        let link = sqlx::query_as::<_, CalendarLink>(
            r#"
            INSERT INTO academic_calendars (topic_id, url) VALUES ($1, $2)
            ON CONFLICT (topic_id) DO UPDATE SET url = EXCLUDED.url, updated_at = now()
            RETURNING *
            "#,
        )
        .bind(context_key)
        .bind(url)
        .fetch_one(&self.pool)
        .await?;
        Ok(link)
    }
}
