use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SendToAllRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SendToUserRequest {
    pub user_id: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub sent: bool,
}
