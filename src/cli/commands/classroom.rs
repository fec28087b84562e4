use clap::{Args, Subcommand};

use crate::app::build_state;
use crate::cli::utils::{output_error, output_fields, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::services::bot_command::{created_reply, failure_reply, start_reply};
use crate::services::{BotCommand, ClassroomService, CreateClassroom};
use crate::store::UserProfile;

/// The chat a command arrives from.
#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    #[arg(long, allow_hyphen_values = true, help = "Group chat id")]
    pub chat_id: String,
    #[arg(long, help = "Forum thread id; omit for the general topic")]
    pub thread_id: Option<String>,
    #[arg(long, help = "Group title")]
    pub title: Option<String>,
    #[arg(long, help = "Treat the chat as a private conversation")]
    pub private: bool,
    #[arg(long)]
    pub user_id: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub username: Option<String>,
}

impl ChatArgs {
    fn creator(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id.clone(),
            first_name: self.first_name.clone(),
            username: self.username.clone(),
        }
    }

    fn request(&self, name: String) -> CreateClassroom {
        CreateClassroom {
            creator: self.creator(),
            chat_id: self.chat_id.clone(),
            chat_title: self.title.clone(),
            thread_id: self.thread_id.clone(),
            is_private: self.private,
            name,
        }
    }
}

#[derive(Subcommand)]
pub enum ClassroomCommands {
    #[command(about = "Create a classroom for a chat thread; the user becomes its representative")]
    Create {
        #[arg(long, help = "Classroom name")]
        name: String,
        #[command(flatten)]
        chat: ChatArgs,
    },

    #[command(about = "Answer a bot command (/start or /create <name>) as the bot would")]
    Command {
        #[arg(help = "Message text, e.g. \"/create Physics\"")]
        text: String,
        #[command(flatten)]
        chat: ChatArgs,
    },
}

pub async fn handle(cmd: ClassroomCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let bot_username = config.telegram.bot_username.clone();
    let state = build_state(config).await?;
    let service = &state.classrooms;

    match cmd {
        ClassroomCommands::Create { name, chat } => create(service, chat.request(name), &output_format).await,
        ClassroomCommands::Command { text, chat } => {
            match BotCommand::parse(&text, bot_username.as_deref()) {
                Some(BotCommand::Start) => {
                    if let Err(e) = service.register_user(&chat.creator()).await {
                        tracing::error!("User sync failed: {}", e);
                    }
                    println!("{}", start_reply(chat.private));
                    Ok(())
                }
                Some(BotCommand::Create { name }) => {
                    match service.create(chat.request(name)).await {
                        Ok(classroom) => println!("{}", created_reply(&classroom)),
                        Err(e) => {
                            tracing::error!("Create classroom failed: {}", e);
                            println!("{}", failure_reply(&e));
                        }
                    }
                    Ok(())
                }
                None => {
                    output_error(&output_format, "Not a command this bot answers", Some("UNKNOWN_COMMAND"))
                }
            }
        }
    }
}

async fn create(
    service: &ClassroomService,
    request: CreateClassroom,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let classroom = service.create(request).await?;

    output_success(
        output_format,
        &format!("Classroom '{}' ready", classroom.name),
        Some(&classroom),
    )?;
    if let OutputFormat::Text = output_format {
        output_fields(&[
            ("context key", Some(classroom.context_key.clone())),
            ("role", Some(classroom.creator_role.to_string())),
            ("link", classroom.deep_link.clone()),
        ]);
    }
    Ok(())
}
