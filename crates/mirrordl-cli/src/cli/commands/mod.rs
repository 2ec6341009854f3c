//! CLI command handlers, one per file.

mod get;
mod head;
mod post;

pub use get::run_get;
pub use head::run_head;
pub use post::run_post;
