use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::models::*;
use super::{ClassroomRepository, ResourceRef, RoleStore, StoreError, StoreResult};
use crate::types::Role;

/// In-process store with the same upsert and cascade rules as [`super::PgStore`].
///
/// Used by the test suite and for local runs without `DATABASE_URL`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i32,
    users: HashMap<String, UserProfile>,
    groups: HashMap<String, String>,
    topics: HashMap<String, TopicRecord>,
    roles: HashMap<(String, String), Role>,
    courses: BTreeMap<i32, Course>,
    schedules: BTreeMap<i32, Schedule>,
    assignments: BTreeMap<i32, Assignment>,
    announcements: BTreeMap<i32, Announcement>,
    calendars: HashMap<String, CalendarLink>,
}

impl Tables {
    fn allocate_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn course_in(&self, id: i32, context_key: &str) -> bool {
        self.courses
            .get(&id)
            .is_some_and(|course| course.topic_id == context_key)
    }

    fn course_name(&self, id: i32) -> String {
        self.courses
            .get(&id)
            .map(|course| course.name.clone())
            .unwrap_or_default()
    }

    fn entry_for(&self, assignment: &Assignment) -> AssignmentEntry {
        AssignmentEntry {
            id: assignment.id,
            title: assignment.title.clone(),
            description: assignment.description.clone(),
            due_date: assignment.due_date,
            course_id: assignment.course_id,
            course_name: self.course_name(assignment.course_id),
            status: assignment.status,
            attachment_url: assignment.attachment_url.clone(),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user(&self, user_id: &str) -> Option<UserProfile> {
        self.tables.read().await.users.get(user_id).cloned()
    }

    pub async fn group_title(&self, group_key: &str) -> Option<String> {
        self.tables.read().await.groups.get(group_key).cloned()
    }

    pub async fn topic(&self, context_key: &str) -> Option<TopicRecord> {
        self.tables.read().await.topics.get(context_key).cloned()
    }

    pub async fn role_count(&self) -> usize {
        self.tables.read().await.roles.len()
    }
}

fn missing(resource: ResourceRef) -> StoreError {
    StoreError::NotFound(resource.to_string())
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn find_roles(&self, user_id: &str, context_key: &str) -> StoreResult<Vec<Role>> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .get(&(user_id.to_string(), context_key.to_string()))
            .copied()
            .into_iter()
            .collect())
    }

    async fn upsert_role(&self, user_id: &str, context_key: &str, role: Role) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .roles
            .insert((user_id.to_string(), context_key.to_string()), role);
        Ok(())
    }

    async fn upsert_user(&self, user: &UserProfile) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn upsert_group(&self, group_key: &str, title: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.groups.insert(group_key.to_string(), title.to_string());
        Ok(())
    }

    async fn upsert_topic(&self, topic: &TopicRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .topics
            .entry(topic.context_key.clone())
            .and_modify(|existing| existing.name = topic.name.clone())
            .or_insert_with(|| topic.clone());
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ClassroomRepository for MemoryStore {
    async fn resource_in_context(&self, resource: ResourceRef, context_key: &str) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        let owned = match resource {
            ResourceRef::Course(id) => tables.course_in(id, context_key),
            ResourceRef::Schedule(id) => tables
                .schedules
                .get(&id)
                .is_some_and(|s| tables.course_in(s.course_id, context_key)),
            ResourceRef::Assignment(id) => tables
                .assignments
                .get(&id)
                .is_some_and(|a| tables.course_in(a.course_id, context_key)),
            ResourceRef::Announcement(id) => tables
                .announcements
                .get(&id)
                .is_some_and(|a| a.topic_id == context_key),
        };
        Ok(owned)
    }

    async fn list_courses(&self, context_key: &str) -> StoreResult<Vec<Course>> {
        let tables = self.tables.read().await;
        Ok(tables
            .courses
            .values()
            .filter(|course| course.topic_id == context_key)
            .cloned()
            .collect())
    }

    async fn create_course(&self, context_key: &str, fields: &CourseFields) -> StoreResult<Course> {
        let mut tables = self.tables.write().await;
        let course = Course {
            id: tables.allocate_id(),
            topic_id: context_key.to_string(),
            name: fields.name.clone(),
            code: fields.code.clone(),
            instructor: fields.instructor.clone(),
            created_at: Utc::now(),
        };
        tables.courses.insert(course.id, course.clone());
        Ok(course)
    }

    async fn update_course(&self, id: i32, fields: &CourseFields) -> StoreResult<Course> {
        let mut tables = self.tables.write().await;
        let course = tables
            .courses
            .get_mut(&id)
            .ok_or_else(|| missing(ResourceRef::Course(id)))?;
        course.name = fields.name.clone();
        course.code = fields.code.clone();
        course.instructor = fields.instructor.clone();
        Ok(course.clone())
    }

    async fn delete_course(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.courses.remove(&id).is_none() {
            return Err(missing(ResourceRef::Course(id)));
        }
        tables.schedules.retain(|_, s| s.course_id != id);
        tables.assignments.retain(|_, a| a.course_id != id);
        tables.announcements.retain(|_, a| a.course_id != Some(id));
        Ok(())
    }

    async fn list_schedule(&self, context_key: &str, day: Option<i32>) -> StoreResult<Vec<ScheduleEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<ScheduleEntry> = tables
            .schedules
            .values()
            .filter(|s| day.map_or(true, |d| s.day_of_week == d))
            .filter_map(|s| {
                let course = tables.courses.get(&s.course_id)?;
                (course.topic_id == context_key).then(|| ScheduleEntry {
                    id: s.id,
                    day_of_week: s.day_of_week,
                    start_time: s.start_time.clone(),
                    end_time: s.end_time.clone(),
                    location: s.location.clone(),
                    course_id: course.id,
                    course_name: course.name.clone(),
                    code: course.code.clone(),
                    instructor: course.instructor.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            (a.day_of_week, &a.start_time, a.id).cmp(&(b.day_of_week, &b.start_time, b.id))
        });
        Ok(entries)
    }

    async fn create_schedule(&self, fields: &ScheduleFields) -> StoreResult<Schedule> {
        let mut tables = self.tables.write().await;
        if !tables.courses.contains_key(&fields.course_id) {
            return Err(missing(ResourceRef::Course(fields.course_id)));
        }
        let schedule = Schedule {
            id: tables.allocate_id(),
            course_id: fields.course_id,
            day_of_week: fields.day_of_week,
            start_time: fields.start_time.clone(),
            end_time: fields.end_time.clone(),
            location: fields.location.clone(),
        };
        tables.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn update_schedule(&self, id: i32, fields: &ScheduleFields) -> StoreResult<Schedule> {
        let mut tables = self.tables.write().await;
        let schedule = tables
            .schedules
            .get_mut(&id)
            .ok_or_else(|| missing(ResourceRef::Schedule(id)))?;
        schedule.course_id = fields.course_id;
        schedule.day_of_week = fields.day_of_week;
        schedule.start_time = fields.start_time.clone();
        schedule.end_time = fields.end_time.clone();
        schedule.location = fields.location.clone();
        Ok(schedule.clone())
    }

    async fn delete_schedule(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .schedules
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing(ResourceRef::Schedule(id)))
    }

    async fn list_assignments(&self, context_key: &str) -> StoreResult<Vec<AssignmentEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<AssignmentEntry> = tables
            .assignments
            .values()
            .filter(|a| tables.course_in(a.course_id, context_key))
            .map(|a| tables.entry_for(a))
            .collect();
        entries.sort_by(|a, b| (a.due_date, a.id).cmp(&(b.due_date, b.id)));
        Ok(entries)
    }

    async fn get_assignment(&self, context_key: &str, id: i32) -> StoreResult<Option<AssignmentEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .assignments
            .get(&id)
            .filter(|a| tables.course_in(a.course_id, context_key))
            .map(|a| tables.entry_for(a)))
    }

    async fn create_assignment(&self, fields: &AssignmentFields) -> StoreResult<Assignment> {
        let mut tables = self.tables.write().await;
        if !tables.courses.contains_key(&fields.course_id) {
            return Err(missing(ResourceRef::Course(fields.course_id)));
        }
        let assignment = Assignment {
            id: tables.allocate_id(),
            course_id: fields.course_id,
            title: fields.title.clone(),
            description: fields.description.clone(),
            due_date: fields.due_date,
            attachment_url: fields.attachment_url.clone(),
            status: fields.status,
            created_at: Utc::now(),
        };
        tables.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn update_assignment(&self, id: i32, fields: &AssignmentFields) -> StoreResult<Assignment> {
        let mut tables = self.tables.write().await;
        let assignment = tables
            .assignments
            .get_mut(&id)
            .ok_or_else(|| missing(ResourceRef::Assignment(id)))?;
        assignment.course_id = fields.course_id;
        assignment.title = fields.title.clone();
        assignment.description = fields.description.clone();
        assignment.due_date = fields.due_date;
        assignment.attachment_url = fields.attachment_url.clone();
        assignment.status = fields.status;
        Ok(assignment.clone())
    }

    async fn delete_assignment(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .assignments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing(ResourceRef::Assignment(id)))
    }

    async fn list_announcements(&self, context_key: &str) -> StoreResult<Vec<Announcement>> {
        let tables = self.tables.read().await;
        let mut announcements: Vec<Announcement> = tables
            .announcements
            .values()
            .filter(|a| a.topic_id == context_key)
            .cloned()
            .collect();
        announcements.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(announcements)
    }

    async fn create_announcement(&self, context_key: &str, fields: &AnnouncementFields) -> StoreResult<Announcement> {
        let mut tables = self.tables.write().await;
        let announcement = Announcement {
            id: tables.allocate_id(),
            topic_id: context_key.to_string(),
            course_id: fields.course_id,
            content: fields.content.clone(),
            created_at: Utc::now(),
        };
        tables.announcements.insert(announcement.id, announcement.clone());
        Ok(announcement)
    }

    async fn update_announcement(&self, id: i32, fields: &AnnouncementFields) -> StoreResult<Announcement> {
        let mut tables = self.tables.write().await;
        let announcement = tables
            .announcements
            .get_mut(&id)
            .ok_or_else(|| missing(ResourceRef::Announcement(id)))?;
        announcement.content = fields.content.clone();
        announcement.course_id = fields.course_id;
        Ok(announcement.clone())
    }

    async fn delete_announcement(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .announcements
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing(ResourceRef::Announcement(id)))
    }

    async fn get_calendar(&self, context_key: &str) -> StoreResult<Option<CalendarLink>> {
        Ok(self.tables.read().await.calendars.get(context_key).cloned())
    }

    async fn upsert_calendar(&self, context_key: &str, url: &str) -> StoreResult<CalendarLink> {
        let mut tables = self.tables.write().await;
        if let Some(link) = tables.calendars.get_mut(context_key) {
            link.url = url.to_string();
            link.updated_at = Utc::now();
            return Ok(link.clone());
        }
        let link = CalendarLink {
            id: tables.allocate_id(),
            topic_id: context_key.to_string(),
            url: url.to_string(),
            updated_at: Utc::now(),
        };
        tables.calendars.insert(context_key.to_string(), link.clone());
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn course(name: &str) -> CourseFields {
        CourseFields {
            name: name.to_string(),
            code: None,
            instructor: None,
        }
    }

    #[tokio::test]
    async fn role_upserts_do_not_duplicate() {
        let store = MemoryStore::new();
        store.upsert_role("42", "g1_0", Role::Student).await.unwrap();
        store.upsert_role("42", "g1_0", Role::Representative).await.unwrap();
        assert_eq!(store.find_roles("42", "g1_0").await.unwrap(), vec![Role::Representative]);
        assert_eq!(store.role_count().await, 1);
        assert!(store.find_roles("42", "g1_1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn topic_upsert_renames_but_keeps_group() {
        let store = MemoryStore::new();
        let topic = TopicRecord {
            context_key: "g1_0".into(),
            group_key: "g1".into(),
            thread_key: "0".into(),
            name: "Physics".into(),
        };
        store.upsert_topic(&topic).await.unwrap();
        store
            .upsert_topic(&TopicRecord {
                group_key: "other".into(),
                name: "Physics II".into(),
                ..topic.clone()
            })
            .await
            .unwrap();
        let stored = store.topic("g1_0").await.unwrap();
        assert_eq!(stored.name, "Physics II");
        assert_eq!(stored.group_key, "g1");
    }

    #[tokio::test]
    async fn ownership_follows_the_course() {
        let store = MemoryStore::new();
        let math = store.create_course("g1_0", &course("Math")).await.unwrap();
        let schedule = store
            .create_schedule(&ScheduleFields {
                course_id: math.id,
                day_of_week: 1,
                start_time: "09:00".into(),
                end_time: "10:00".into(),
                location: None,
            })
            .await
            .unwrap();
        assert!(store.resource_in_context(ResourceRef::Course(math.id), "g1_0").await.unwrap());
        assert!(!store.resource_in_context(ResourceRef::Course(math.id), "g2_0").await.unwrap());
        assert!(store.resource_in_context(ResourceRef::Schedule(schedule.id), "g1_0").await.unwrap());
        assert!(!store.resource_in_context(ResourceRef::Schedule(schedule.id), "g2_0").await.unwrap());
        assert!(!store.resource_in_context(ResourceRef::Assignment(999), "g1_0").await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_course_cascades() {
        let store = MemoryStore::new();
        let math = store.create_course("g1_0", &course("Math")).await.unwrap();
        store
            .create_assignment(&AssignmentFields {
                course_id: math.id,
                title: "Homework".into(),
                description: None,
                due_date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                attachment_url: None,
                status: Default::default(),
            })
            .await
            .unwrap();
        store
            .create_announcement(
                "g1_0",
                &AnnouncementFields {
                    content: "Exam moved".into(),
                    course_id: Some(math.id),
                },
            )
            .await
            .unwrap();
        store.delete_course(math.id).await.unwrap();
        assert!(store.list_assignments("g1_0").await.unwrap().is_empty());
        assert!(store.list_announcements("g1_0").await.unwrap().is_empty());
        assert!(matches!(store.delete_course(math.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn schedule_is_ordered_by_day_then_start() {
        let store = MemoryStore::new();
        let math = store.create_course("g1_0", &course("Math")).await.unwrap();
        for (day, start) in [(3, "08:00"), (1, "13:00"), (1, "09:30")] {
            store
                .create_schedule(&ScheduleFields {
                    course_id: math.id,
                    day_of_week: day,
                    start_time: start.into(),
                    end_time: "23:00".into(),
                    location: None,
                })
                .await
                .unwrap();
        }
        let order: Vec<(i32, String)> = store
            .list_schedule("g1_0", None)
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.day_of_week, e.start_time))
            .collect();
        assert_eq!(
            order,
            vec![(1, "09:30".into()), (1, "13:00".into()), (3, "08:00".into())]
        );
        assert_eq!(store.list_schedule("g1_0", Some(3)).await.unwrap().len(), 1);
        assert!(store.list_schedule("g2_0", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn calendar_is_one_link_per_context() {
        let store = MemoryStore::new();
        let first = store.upsert_calendar("g1_0", "https://a.example").await.unwrap();
        let second = store.upsert_calendar("g1_0", "https://b.example").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(
            store.get_calendar("g1_0").await.unwrap().map(|c| c.url),
            Some("https://b.example".to_string())
        );
        assert!(store.get_calendar("g2_0").await.unwrap().is_none());
    }
}
