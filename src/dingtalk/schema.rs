//! 钉钉开放平台各接口的请求与响应结构。
//!
//! `errcode` 为必需字段，缺失时整个响应按格式错误处理。

use serde::{Deserialize, Serialize};

/// `GET /gettoken`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
    pub access_token: Option<String>,
    /// 有效期（秒），平台固定返回 7200
    pub expires_in: Option<u64>,
}

/// `GET /sns/gettoken`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnsTokenResponse {
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
    pub sns_token: Option<String>,
}

/// `GET /sns/getuserinfo`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfoResponse {
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
    pub user_info: Option<SnsUserInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnsUserInfo {
    pub nick: Option<String>,
    pub openid: Option<String>,
    pub unionid: Option<String>,
}

/// `POST /topapi/message/corpconversation/asyncsend_v2`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendResponse {
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
    pub task_id: Option<i64>,
}

/// 工作通知的接收方
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    AllUsers,
    User(String),
}

/// 一条待发送的文本工作通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkNotice {
    pub recipient: Recipient,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct WorkNoticeBody<'a> {
    pub agent_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_all_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userid_list: Option<&'a str>,
    pub msg: TextMessage<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TextMessage<'a> {
    pub msgtype: &'static str,
    pub text: TextContent<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TextContent<'a> {
    pub content: &'a str,
}

impl<'a> WorkNoticeBody<'a> {
    pub fn new(agent_id: &'a str, notice: &'a WorkNotice) -> Self {
        let (to_all_user, userid_list) = match &notice.recipient {
            Recipient::AllUsers => (Some(true), None),
            Recipient::User(user_id) => (None, Some(user_id.as_str())),
        };

        Self {
            agent_id,
            to_all_user,
            userid_list,
            msg: TextMessage {
                msgtype: "text",
                text: TextContent {
                    content: &notice.content,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn broadcast_body_sets_to_all_user_only() {
        let notice = WorkNotice {
            recipient: Recipient::AllUsers,
            content: "hello".into(),
        };
        let body = serde_json::to_value(WorkNoticeBody::new("1001", &notice)).unwrap();

        assert_eq!(
            body,
            json!({
                "agent_id": "1001",
                "to_all_user": true,
                "msg": { "msgtype": "text", "text": { "content": "hello" } }
            })
        );
    }

    #[test]
    fn direct_body_sets_userid_list_only() {
        let notice = WorkNotice {
            recipient: Recipient::User("manager01".into()),
            content: "hi".into(),
        };
        let body = serde_json::to_value(WorkNoticeBody::new("1001", &notice)).unwrap();

        assert_eq!(body["userid_list"], "manager01");
        assert!(body.get("to_all_user").is_none());
    }

    #[test]
    fn missing_errcode_fails_to_parse() {
        let parsed = serde_json::from_str::<SnsTokenResponse>(r#"{"sns_token":"abc"}"#);
        assert!(parsed.is_err());
    }
}
