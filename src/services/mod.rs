pub mod bot_command;
pub mod classroom_service;

pub use bot_command::BotCommand;
pub use classroom_service::{Classroom, ClassroomError, ClassroomService, CreateClassroom};
