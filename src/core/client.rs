use crate::adapters::{HttpApi, LocalStorage, MemoryStorage, MockApi};
use crate::config::AppConfig;
use crate::core::cache::ResponseCache;
use crate::core::session::{Session, SessionStore};
use crate::domain::model::{AuthUser, Credentials, Notification};
use crate::domain::ports::{ConfigProvider, GraduationApi, Storage};
use crate::utils::error::{GradError, Result};
use crate::utils::retry::RateLimitOptions;
use std::sync::Arc;

/// 依設定選擇 mock 或 HTTP 後端
pub async fn select_api(
    config: &AppConfig,
    session: SessionStore,
) -> Result<Arc<dyn GraduationApi>> {
    if config.uses_mock() {
        let (min, max) = config.mock_latency();
        let mut api = MockApi::new().with_latency(min, max);
        if config.mock.sample_data {
            api = api.with_sample_data().await;
        }
        tracing::info!("🧪 Using in-memory mock backend");
        Ok(Arc::new(api))
    } else {
        let api = HttpApi::from_config(config, session)?;
        tracing::info!("🌐 Using {} backend at {}", config.api.source, api.base_url());
        Ok(Arc::new(api))
    }
}

/// 應用程式的進入點：持有後端、登入狀態與回應快取
#[derive(Clone)]
pub struct GradClient {
    pub(crate) api: Arc<dyn GraduationApi>,
    pub(crate) session: SessionStore,
    pub(crate) cache: ResponseCache,
    pub(crate) rate_limit: RateLimitOptions,
}

impl GradClient {
    pub fn new(api: Arc<dyn GraduationApi>, session: SessionStore, cache: ResponseCache) -> Self {
        Self {
            api,
            session,
            cache,
            rate_limit: RateLimitOptions::default(),
        }
    }

    pub fn with_rate_limit(mut self, options: RateLimitOptions) -> Self {
        self.rate_limit = options;
        self
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let session = SessionStore::new();
        let api = select_api(config, session.clone()).await?;

        let storage: Arc<dyn Storage> = match &config.cache.directory {
            Some(directory) => Arc::new(LocalStorage::new(directory.clone())),
            None => Arc::new(MemoryStorage::new()),
        };
        let cache = if config.cache.enabled {
            ResponseCache::new(storage, config.cache_ttl())
        } else {
            ResponseCache::disabled(storage)
        };

        Ok(Self::new(api, session, cache).with_rate_limit(config.rate_limit_options()))
    }

    pub fn api(&self) -> &dyn GraduationApi {
        self.api.as_ref()
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn rate_limit(&self) -> &RateLimitOptions {
        &self.rate_limit
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(GradError::ValidationError {
                message: "Email and password are required".to_string(),
            });
        }

        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let response = self.api.login(&credentials).await?;
        tracing::info!(
            "🔑 Logged in as {} ({})",
            response.user.email,
            response.user.role
        );

        self.session.set(Session {
            token: response.token,
            user: response.user.clone(),
        });
        Ok(response.user)
    }

    pub fn logout(&self) {
        if let Some(user) = self.session.user() {
            tracing::info!("👋 Logged out {}", user.email);
        }
        self.session.clear();
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.session.user()
    }

    fn require_login(&self, action: &str) -> Result<AuthUser> {
        self.session.user().ok_or_else(|| GradError::Unauthorized {
            message: format!("login required to {}", action),
        })
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>> {
        let user = self.require_login("read notifications")?;
        self.api.notifications(user.id).await
    }

    pub async fn unread_notifications(&self) -> Result<Vec<Notification>> {
        Ok(self
            .notifications()
            .await?
            .into_iter()
            .filter(|n| !n.is_read)
            .collect())
    }

    pub async fn mark_notification_read(&self, notification_id: i64) -> Result<()> {
        self.require_login("update notifications")?;
        self.api.mark_notification_read(notification_id).await
    }

    /// 將所有未讀通知標為已讀，回傳處理數量
    pub async fn mark_all_notifications_read(&self) -> Result<usize> {
        let unread = self.unread_notifications().await?;
        for notification in &unread {
            self.api.mark_notification_read(notification.id).await?;
        }
        Ok(unread.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn quiet_mock_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.mock.min_delay_ms = 0;
        config.mock.max_delay_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let client = GradClient::from_config(&quiet_mock_config()).await.unwrap();
        assert!(client.current_user().is_none());

        let user = assert_ok!(client.login("dean@uni.edu", "password").await);
        assert_eq!(user.full_name, "Prof. Elif Sahin");
        assert!(client.session().is_authenticated());

        client.logout();
        assert!(client.current_user().is_none());
        assert_err!(client.notifications().await);
    }

    #[tokio::test]
    async fn test_login_requires_credentials() {
        let client = GradClient::from_config(&quiet_mock_config()).await.unwrap();
        let err = client.login("  ", "password").await.unwrap_err();
        assert!(matches!(err, GradError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_http_backend_selected_for_non_mock_sources() {
        let mut config = quiet_mock_config();
        config.api.source = crate::config::ApiSource::Test;
        let client = GradClient::from_config(&config).await.unwrap();
        // 未登入時不會送出請求
        assert!(matches!(
            client.notifications().await,
            Err(GradError::Unauthorized { .. })
        ));
    }
}
