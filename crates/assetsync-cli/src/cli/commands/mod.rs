//! CLI command handlers, one file per command.

mod checksum;
mod create;
mod delete;
mod download;
mod generate;
mod refresh;
mod session;
mod upload_master;
mod upload_rendition;

pub use checksum::run_checksum;
pub use create::run_create;
pub use delete::run_delete;
pub use download::run_download;
pub use generate::run_generate;
pub use refresh::run_refresh;
pub use session::Session;
pub use upload_master::run_upload_master;
pub use upload_rendition::run_upload_rendition;
