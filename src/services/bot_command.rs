//! The two chat commands the bot answers: `/start` and `/create <name>`.

use super::classroom_service::{Classroom, ClassroomError};
use crate::types::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    /// `name` is the trimmed argument text, possibly empty.
    Create { name: String },
}

impl BotCommand {
    /// Parse a message text. `/cmd@other_bot` is ignored when `bot_username` is known
    /// and differs.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;
        let (token, args) = match rest.find(char::is_whitespace) {
            Some(at) => (&rest[..at], rest[at..].trim()),
            None => (rest, ""),
        };

        let command = match token.split_once('@') {
            Some((command, addressee)) => {
                if let Some(bot) = bot_username {
                    if !addressee.eq_ignore_ascii_case(bot) {
                        return None;
                    }
                }
                command
            }
            None => token,
        };

        match command {
            "start" => Some(BotCommand::Start),
            "create" => Some(BotCommand::Create {
                name: args.to_string(),
            }),
            _ => None,
        }
    }
}

pub fn start_reply(is_private: bool) -> &'static str {
    if is_private {
        "Welcome! To create a classroom, add me to a group and run /create <name> inside the topic you want to use."
    } else {
        "Hi! Use /create <Classroom Name> to turn this topic into a classroom."
    }
}

pub fn created_reply(classroom: &Classroom) -> String {
    let mut reply = format!(
        "Classroom \"{}\" created!\n\nYou are the {}.",
        classroom.name,
        role_title(classroom.creator_role)
    );
    if let Some(link) = &classroom.deep_link {
        reply.push_str("\n\nStudents can access the schedule here:\n");
        reply.push_str(link);
    }
    reply
}

fn role_title(role: Role) -> &'static str {
    match role {
        Role::Student => "Student",
        Role::Representative => "Representative",
        Role::Admin => "Admin",
    }
}

pub fn failure_reply(err: &ClassroomError) -> String {
    match err {
        ClassroomError::PrivateChat => "Please use this command inside a group topic.".to_string(),
        ClassroomError::MissingName => "Please provide a name: /create <Classroom Name>".to_string(),
        ClassroomError::MissingChat | ClassroomError::Store(_) => {
            "Failed to create classroom. Please try again.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(BotCommand::parse("/start", None), Some(BotCommand::Start));
        assert_eq!(
            BotCommand::parse("/create   Linear Algebra  ", None),
            Some(BotCommand::Create {
                name: "Linear Algebra".into()
            })
        );
        assert_eq!(
            BotCommand::parse("/create", None),
            Some(BotCommand::Create { name: String::new() })
        );
        assert_eq!(BotCommand::parse("hello /start", None), None);
        assert_eq!(BotCommand::parse("/help", None), None);
    }

    #[test]
    fn respects_the_bot_suffix() {
        assert_eq!(
            BotCommand::parse("/start@Class_Bot", Some("class_bot")),
            Some(BotCommand::Start)
        );
        assert_eq!(BotCommand::parse("/start@other_bot", Some("class_bot")), None);
        assert_eq!(BotCommand::parse("/start@anyone", None), Some(BotCommand::Start));
    }

    #[test]
    fn created_reply_includes_link() {
        let classroom = Classroom {
            context_key: "-1001_0".into(),
            group_key: "-1001".into(),
            thread_key: "0".into(),
            name: "Physics".into(),
            creator_role: Role::Representative,
            deep_link: Some("https://t.me/b/app?startapp=-1001_0".into()),
        };
        let reply = created_reply(&classroom);
        assert!(reply.contains("\"Physics\""));
        assert!(reply.contains("Representative"));
        assert!(reply.ends_with("startapp=-1001_0"));
    }
}
