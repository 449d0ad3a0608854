use std::sync::Arc;

use audit::AuditLog;
use config::Config;
use dingtalk::{AccessTokenCache, Dispatcher, IdentityExchanger, PlatformApi};

pub mod audit;
pub mod config;
pub mod dingtalk;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub exchanger: Arc<IdentityExchanger>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// 组装集成层组件，登录换取与消息发送共享同一个 access_token 缓存
    pub fn new(config: Config, api: Arc<dyn PlatformApi>, audit: Arc<dyn AuditLog>) -> Self {
        let tokens = Arc::new(AccessTokenCache::new(
            api.clone(),
            config.dingtalk.token_refresh_margin(),
        ));
        let rejected_codes = config.dingtalk.credential_rejected_codes.clone();

        let exchanger = Arc::new(IdentityExchanger::new(
            api.clone(),
            tokens.clone(),
            rejected_codes.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(api, tokens, audit, rejected_codes));

        Self {
            config,
            exchanger,
            dispatcher,
        }
    }
}
