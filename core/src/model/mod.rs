pub mod config_commands;
pub mod permission;
pub mod structural;
pub mod user;
