use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::client::PlatformApi;
use crate::config::PLATFORM_TOKEN_VALIDITY_SECS;
use crate::error::PlatformError;

/// 企业服务凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    /// 本地认定的过期时间，已扣除提前刷新的余量
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// access_token 缓存
///
/// 刷新是单飞的：`refresh_lock` 保证任意时刻最多只有一个刷新请求在途。
/// 等锁的调用方拿到锁后先复查缓存；若排队期间已有一次刷新失败，
/// 直接返回那次的错误而不再重复请求。失败不会被缓存，之后新到达的调用方会重新尝试。
pub struct AccessTokenCache {
    api: Arc<dyn PlatformApi>,
    refresh_margin: Duration,
    cached: RwLock<Option<AccessToken>>,
    /// 已完成的刷新次数，只在持有 `refresh_lock` 时递增
    refreshes: AtomicU64,
    /// 最近一次刷新的失败结果
    refresh_lock: Mutex<Option<PlatformError>>,
}

impl AccessTokenCache {
    pub fn new(api: Arc<dyn PlatformApi>, refresh_margin: Duration) -> Self {
        Self {
            api,
            refresh_margin,
            cached: RwLock::new(None),
            refreshes: AtomicU64::new(0),
            refresh_lock: Mutex::new(None),
        }
    }

    pub async fn get_token(&self) -> Result<AccessToken, PlatformError> {
        if let Some(token) = self.cached_valid().await {
            return Ok(token);
        }

        let observed = self.refreshes.load(Ordering::Acquire);
        let mut last_failure = self.refresh_lock.lock().await;
        // 等锁期间可能已被其他调用方刷新
        if let Some(token) = self.cached_valid().await {
            debug!("Access token refreshed by a concurrent caller");
            return Ok(token);
        }
        if self.refreshes.load(Ordering::Acquire) != observed {
            if let Some(err) = last_failure.as_ref() {
                debug!("Sharing failed access token refresh with queued caller");
                return Err(err.clone());
            }
        }

        let outcome = self.refresh().await;
        *last_failure = outcome.as_ref().err().cloned();
        self.refreshes.fetch_add(1, Ordering::Release);
        outcome
    }

    /// 平台拒绝了 `rejected` 时丢弃它；缓存已换成新 token 则保持不动
    pub async fn invalidate_if(&self, rejected: &str) {
        let mut cached = self.cached.write().await;
        if cached.as_ref().is_some_and(|token| token.value == rejected) {
            info!("Discarding access token rejected by DingTalk");
            *cached = None;
        }
    }

    async fn cached_valid(&self) -> Option<AccessToken> {
        self.cached
            .read()
            .await
            .as_ref()
            .filter(|token| token.is_valid())
            .cloned()
    }

    async fn refresh(&self) -> Result<AccessToken, PlatformError> {
        let fetched_at = Instant::now();
        let resp = self.api.fetch_access_token().await.inspect_err(|e| {
            error!("Failed to fetch DingTalk access token: {}", e);
        })?;

        if resp.errcode != 0 {
            error!(
                "DingTalk rejected access token request: errcode={}, errmsg={}",
                resp.errcode, resp.errmsg
            );
            return Err(PlatformError::RemoteAuth {
                code: resp.errcode,
                message: resp.errmsg,
            });
        }

        let value = resp
            .access_token
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PlatformError::MalformedResponse("gettoken 响应缺少 access_token".into()))?;

        // 平台有效期固定为 7200s，超出的值按上限处理
        let validity_secs = resp
            .expires_in
            .unwrap_or(PLATFORM_TOKEN_VALIDITY_SECS)
            .min(PLATFORM_TOKEN_VALIDITY_SECS);
        let lifetime = Duration::from_secs(validity_secs).saturating_sub(self.refresh_margin);
        let token = AccessToken {
            value,
            expires_at: fetched_at + lifetime,
        };

        *self.cached.write().await = Some(token.clone());
        info!("DingTalk access token refreshed, reusable for {}s", lifetime.as_secs());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dingtalk::fake::{FakePlatform, token_ok, token_rejected};
    use crate::dingtalk::schema::TokenResponse;

    const MARGIN: Duration = Duration::from_secs(1800);

    #[tokio::test(start_paused = true)]
    async fn cached_token_is_reused_until_refresh_margin() {
        let fake = Arc::new(FakePlatform::default());
        fake.set_token_reply(token_ok("tok-1"));
        let cache = AccessTokenCache::new(fake.clone(), MARGIN);

        let first = cache.get_token().await.unwrap();
        assert_eq!(first.value, "tok-1");
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);

        // 7200 - 1800 = 5400s 内复用
        tokio::time::advance(Duration::from_secs(5399)).await;
        let again = cache.get_token().await.unwrap();
        assert_eq!(again, first);
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);

        fake.set_token_reply(token_ok("tok-2"));
        tokio::time::advance(Duration::from_secs(2)).await;
        let refreshed = cache.get_token().await.unwrap();
        assert_eq!(refreshed.value, "tok-2");
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_a_single_refresh() {
        let fake = Arc::new(FakePlatform::with_token_delay(Duration::from_millis(200)));
        fake.set_token_reply(token_ok("shared"));
        let cache = Arc::new(AccessTokenCache::new(fake.clone(), MARGIN));

        let calls = (0..16).map(|_| {
            let cache = cache.clone();
            async move { cache.get_token().await }
        });
        let results = futures_util::future::join_all(calls).await;

        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap().value, "shared");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_fetch_is_not_cached() {
        let fake = Arc::new(FakePlatform::default());
        fake.set_token_reply(token_rejected(40089, "invalid appkey"));
        let cache = AccessTokenCache::new(fake.clone(), MARGIN);

        match cache.get_token().await {
            Err(PlatformError::RemoteAuth { code, message }) => {
                assert_eq!(code, 40089);
                assert_eq!(message, "invalid appkey");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        fake.set_token_reply(token_ok("tok-ok"));
        assert_eq!(cache.get_token().await.unwrap().value, "tok-ok");
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn success_without_token_value_is_malformed() {
        let fake = Arc::new(FakePlatform::default());
        fake.set_token_reply(TokenResponse {
            errcode: 0,
            errmsg: "ok".into(),
            access_token: None,
            expires_in: Some(7200),
        });
        let cache = AccessTokenCache::new(fake.clone(), MARGIN);

        assert!(matches!(
            cache.get_token().await,
            Err(PlatformError::MalformedResponse(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidating_rejected_token_forces_next_fetch() {
        let fake = Arc::new(FakePlatform::default());
        fake.set_token_reply(token_ok("tok-1"));
        let cache = AccessTokenCache::new(fake.clone(), MARGIN);

        cache.get_token().await.unwrap();
        cache.invalidate_if("tok-1").await;
        fake.set_token_reply(token_ok("tok-2"));
        assert_eq!(cache.get_token().await.unwrap().value, "tok-2");
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_invalidation_keeps_newer_token() {
        let fake = Arc::new(FakePlatform::default());
        fake.set_token_reply(token_ok("tok-1"));
        let cache = AccessTokenCache::new(fake.clone(), MARGIN);

        let stale = cache.get_token().await.unwrap();
        cache.invalidate_if(&stale.value).await;
        fake.set_token_reply(token_ok("tok-2"));
        cache.get_token().await.unwrap();

        // 持有旧 token 的发送方晚到的失效请求
        cache.invalidate_if(&stale.value).await;
        assert_eq!(cache.get_token().await.unwrap().value, "tok-2");
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_callers_share_a_failed_refresh() {
        let fake = Arc::new(FakePlatform::with_token_delay(Duration::from_secs(5)));
        fake.set_token_reply(token_rejected(40089, "invalid appkey"));
        let cache = Arc::new(AccessTokenCache::new(fake.clone(), MARGIN));

        let started = Instant::now();
        let calls = (0..8).map(|_| {
            let cache = cache.clone();
            async move { cache.get_token().await }
        });
        let results = futures_util::future::join_all(calls).await;

        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() <= Duration::from_secs(5));
        for result in results {
            assert!(matches!(
                result,
                Err(PlatformError::RemoteAuth { code: 40089, .. })
            ));
        }

        // 之后到达的调用方重新尝试
        fake.set_token_reply(token_ok("recovered"));
        assert_eq!(cache.get_token().await.unwrap().value, "recovered");
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_expires_in_uses_platform_validity() {
        let fake = Arc::new(FakePlatform::default());
        fake.set_token_reply(TokenResponse {
            errcode: 0,
            errmsg: "ok".into(),
            access_token: Some("tok-1".into()),
            expires_in: None,
        });
        let cache = AccessTokenCache::new(fake.clone(), MARGIN);

        cache.get_token().await.unwrap();
        tokio::time::advance(Duration::from_secs(5399)).await;
        assert_eq!(cache.get_token().await.unwrap().value, "tok-1");
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);

        fake.set_token_reply(token_ok("tok-2"));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get_token().await.unwrap().value, "tok-2");
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_expires_in_is_capped() {
        let fake = Arc::new(FakePlatform::default());
        fake.set_token_reply(TokenResponse {
            errcode: 0,
            errmsg: "ok".into(),
            access_token: Some("tok-1".into()),
            expires_in: Some(u64::MAX),
        });
        let cache = AccessTokenCache::new(fake.clone(), MARGIN);

        let token = cache.get_token().await.unwrap();
        assert_eq!(
            token.expires_at - Instant::now(),
            Duration::from_secs(PLATFORM_TOKEN_VALIDITY_SECS) - MARGIN
        );
    }
}
