//! Turning a group chat thread into a classroom.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::config::TelegramConfig;
use crate::store::{RoleStore, StoreError, TopicRecord, UserProfile};
use crate::types::Role;

/// Thread id of a group's general topic.
pub const GENERAL_THREAD: &str = "0";
const UNKNOWN_GROUP: &str = "Unknown Group";

#[derive(Debug, Error)]
pub enum ClassroomError {
    #[error("Classrooms can only be created inside a group topic")]
    PrivateChat,

    #[error("A classroom name is required")]
    MissingName,

    #[error("Chat id is required")]
    MissingChat,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything the creation flow needs from the incoming chat message.
#[derive(Debug, Clone)]
pub struct CreateClassroom {
    pub creator: UserProfile,
    pub chat_id: String,
    pub chat_title: Option<String>,
    /// Forum thread; `None` means the general topic.
    pub thread_id: Option<String>,
    pub is_private: bool,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    pub context_key: String,
    pub group_key: String,
    pub thread_key: String,
    pub name: String,
    /// The creator's role after the flow; an earlier assignment is kept.
    pub creator_role: Role,
    pub deep_link: Option<String>,
}

#[derive(Clone)]
pub struct ClassroomService {
    roles: Arc<dyn RoleStore>,
    bot_username: Option<String>,
    app_name: String,
}

impl ClassroomService {
    pub fn new(roles: Arc<dyn RoleStore>, telegram: &TelegramConfig) -> Self {
        Self {
            roles,
            bot_username: telegram.bot_username.clone(),
            app_name: telegram.app_name.clone(),
        }
    }

    /// Create (or rename) the classroom for a chat thread and make the caller its representative.
    pub async fn create(&self, request: CreateClassroom) -> Result<Classroom, ClassroomError> {
        if request.is_private {
            return Err(ClassroomError::PrivateChat);
        }
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ClassroomError::MissingName);
        }
        let group_key = request.chat_id.trim();
        if group_key.is_empty() {
            return Err(ClassroomError::MissingChat);
        }
        let thread_key = request
            .thread_id
            .as_deref()
            .map(str::trim)
            .filter(|thread| !thread.is_empty())
            .unwrap_or(GENERAL_THREAD);
        let context_key = context_key(group_key, thread_key);

        self.roles.upsert_user(&request.creator).await?;

        let title = request
            .chat_title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(UNKNOWN_GROUP);
        self.roles.upsert_group(group_key, title).await?;

        self.roles
            .upsert_topic(&TopicRecord {
                context_key: context_key.clone(),
                group_key: group_key.to_string(),
                thread_key: thread_key.to_string(),
                name: name.to_string(),
            })
            .await?;

        let creator_role = self.assign_representative(&request.creator.user_id, &context_key).await?;

        info!(
            "Classroom '{}' ready in context '{}' (creator '{}' is {})",
            name, context_key, request.creator.user_id, creator_role
        );

        Ok(Classroom {
            deep_link: self.deep_link(&context_key),
            context_key,
            group_key: group_key.to_string(),
            thread_key: thread_key.to_string(),
            name: name.to_string(),
            creator_role,
        })
    }

    /// Keep a user's profile current, as `/start` does.
    pub async fn register_user(&self, profile: &UserProfile) -> Result<(), ClassroomError> {
        self.roles.upsert_user(profile).await?;
        Ok(())
    }

    /// Insert-or-ignore: an existing role for the pair is left as it is.
    async fn assign_representative(&self, user_id: &str, context_key: &str) -> Result<Role, StoreError> {
        let existing = self.roles.find_roles(user_id, context_key).await?;
        if let Some(role) = existing.first() {
            if *role != Role::Representative {
                warn!(
                    "User '{}' already holds {} in '{}', leaving it unchanged",
                    user_id, role, context_key
                );
            }
            return Ok(*role);
        }
        self.roles
            .upsert_role(user_id, context_key, Role::Representative)
            .await?;
        Ok(Role::Representative)
    }

    /// Mini-app link for a classroom, when the bot username is known.
    pub fn deep_link(&self, context_key: &str) -> Option<String> {
        let bot = self.bot_username.as_deref()?;
        match deep_link(bot, &self.app_name, context_key) {
            Ok(link) => Some(link),
            Err(e) => {
                warn!("Could not build deep link for '{}': {}", context_key, e);
                None
            }
        }
    }
}

/// `{chatId}_{threadId}`
pub fn context_key(group_key: &str, thread_key: &str) -> String {
    format!("{}_{}", group_key, thread_key)
}

/// `https://t.me/{bot}/{app}?startapp={context_key}`
pub fn deep_link(bot_username: &str, app_name: &str, context_key: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse("https://t.me/")?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .push(bot_username)
        .push(app_name);
    url.query_pairs_mut().append_pair("startapp", context_key);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::store::MemoryStore;

    fn ana() -> UserProfile {
        UserProfile {
            user_id: "42".into(),
            first_name: "Ana".into(),
            username: Some("ana".into()),
        }
    }

    fn request(name: &str) -> CreateClassroom {
        CreateClassroom {
            creator: ana(),
            chat_id: "-1001".into(),
            chat_title: Some("CS 2024".into()),
            thread_id: Some("7".into()),
            is_private: false,
            name: name.into(),
        }
    }

    fn service(store: Arc<MemoryStore>, bot: Option<&str>) -> ClassroomService {
        let mut config = AppConfig::development("tok");
        config.telegram.bot_username = bot.map(str::to_string);
        ClassroomService::new(store, &config.telegram)
    }

    #[tokio::test]
    async fn creates_classroom_and_representative() {
        let store = Arc::new(MemoryStore::new());
        let classroom = service(store.clone(), Some("class_bot"))
            .create(request("  Physics "))
            .await
            .unwrap();

        assert_eq!(classroom.context_key, "-1001_7");
        assert_eq!(classroom.name, "Physics");
        assert_eq!(classroom.creator_role, Role::Representative);
        assert_eq!(
            classroom.deep_link.as_deref(),
            Some("https://t.me/class_bot/app?startapp=-1001_7")
        );
        assert_eq!(store.find_roles("42", "-1001_7").await.unwrap(), vec![Role::Representative]);
        assert_eq!(store.group_title("-1001").await.as_deref(), Some("CS 2024"));
        assert_eq!(store.user("42").await.map(|u| u.first_name).as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn defaults_to_general_topic_and_unknown_title() {
        let store = Arc::new(MemoryStore::new());
        let mut req = request("Math");
        req.thread_id = None;
        req.chat_title = None;
        let classroom = service(store.clone(), None).create(req).await.unwrap();
        assert_eq!(classroom.context_key, "-1001_0");
        assert_eq!(classroom.deep_link, None);
        assert_eq!(store.group_title("-1001").await.as_deref(), Some("Unknown Group"));
    }

    #[tokio::test]
    async fn rerunning_renames_and_keeps_roles() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_role("42", "-1001_7", Role::Admin).await.unwrap();
        let svc = service(store.clone(), None);
        svc.create(request("Physics")).await.unwrap();
        let again = svc.create(request("Physics II")).await.unwrap();
        assert_eq!(again.creator_role, Role::Admin);
        assert_eq!(store.topic("-1001_7").await.unwrap().name, "Physics II");
        assert_eq!(store.role_count().await, 1);
    }

    #[tokio::test]
    async fn rejects_private_chats_and_blank_names() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone(), None);

        let mut private = request("Physics");
        private.is_private = true;
        assert!(matches!(svc.create(private).await, Err(ClassroomError::PrivateChat)));
        assert!(matches!(svc.create(request("   ")).await, Err(ClassroomError::MissingName)));
        assert_eq!(store.role_count().await, 0);
    }

    #[test]
    fn deep_link_encodes_the_context_key() {
        assert_eq!(
            deep_link("class_bot", "schedule", "-1001_0").unwrap(),
            "https://t.me/class_bot/schedule?startapp=-1001_0"
        );
        assert_eq!(
            deep_link("b", "app", "a b&c").unwrap(),
            "https://t.me/b/app?startapp=a+b%26c"
        );
    }
}
