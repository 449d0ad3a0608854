mod handler;
mod model;

pub use handler::{callback, qr_code, status};
pub use model::*;
