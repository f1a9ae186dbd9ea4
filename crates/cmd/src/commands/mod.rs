pub mod build;
pub mod clear;
pub mod init;
pub mod list;
pub mod show;
pub mod sql;

pub use build::build_command;
pub use clear::clear_command;
pub use init::init_command;
pub use list::list_command;
pub use show::show_command;
pub use sql::sql_command;
