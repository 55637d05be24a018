pub mod archive;
pub mod config;
pub mod init;
pub mod list;
pub mod validate;
