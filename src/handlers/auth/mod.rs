pub mod role;
pub mod session;

pub use role::get as role_get;
pub use session::delete as session_delete;
pub use session::get as session_get;
pub use session::post as session_post;
