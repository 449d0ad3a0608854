mod handler;
mod model;

pub use handler::{list_logs, send_to_all, send_to_user};
pub use model::*;
