pub mod classroom;
pub mod init_data;
pub mod serve;
