pub mod init_data;
pub mod response;
pub mod session;

pub use init_data::{raw_init_data, ReadScope, INIT_DATA_HEADER};
pub use response::{ApiResponse, ApiResult};
pub use session::{clear_session_cookie, session_cookie, SESSION_COOKIE};
