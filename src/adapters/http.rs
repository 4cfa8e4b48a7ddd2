use crate::core::session::SessionStore;
use crate::domain::model::{
    ActionRequest, AuthUser, Course, Credentials, EligibilityCheckResult, GraduationProcess,
    LoginResponse, ManualCheckRequest, NewManualCheckRequest, NewUser, Notification,
    ProcessAction, Role, Student, TranscriptData,
};
use crate::domain::ports::{
    AuthApi, ConfigProvider, NotificationApi, ProcessApi, StudentApi, UserApi,
};
use crate::utils::error::{GradError, Result};
use crate::utils::retry::{execute_with_retry, RetryOptions};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// 透過 REST API 存取後端
pub struct HttpApi {
    client: Client,
    base_url: String,
    session: SessionStore,
    retry: RetryOptions,
}

impl HttpApi {
    pub fn new(base_url: &str, session: SessionStore) -> Result<Self> {
        Self::with_options(base_url, session, Duration::from_secs(30), RetryOptions::default())
    }

    pub fn with_options(
        base_url: &str,
        session: SessionStore,
        timeout: Duration,
        retry: RetryOptions,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            retry,
        })
    }

    pub fn from_config<C: ConfigProvider>(config: &C, session: SessionStore) -> Result<Self> {
        Self::with_options(
            config.api_base_url(),
            session,
            Duration::from_secs(config.request_timeout_secs()),
            config.retry_options(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("📡 {} {}", method, url);

        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");

        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET 請求可安全重試
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        execute_with_retry(
            move || async move {
                let response = self.request(Method::GET, path).send().await?;
                handle_response(response).await
            },
            &self.retry,
        )
        .await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.request(method, path).json(body).send().await?;
        handle_response(response).await
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<()> {
        let response = self.request(method, path).send().await?;
        let _: serde_json::Value = handle_response(response).await?;
        Ok(())
    }
}

/// 非 2xx 或無法解析的回應一律轉為 [`GradError::Service`]
pub async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let body: Option<serde_json::Value> = serde_json::from_str(&text).ok();
        let message = body
            .as_ref()
            .and_then(extract_message)
            .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });

        tracing::debug!("❌ Backend responded {}: {}", status, message);
        return Err(GradError::Service {
            message,
            status: status.as_u16(),
            body,
        });
    }

    // 204 或空內容視為 JSON null
    let payload = if text.trim().is_empty() { "null" } else { text.as_str() };
    serde_json::from_str(payload).map_err(|e| GradError::Service {
        message: format!("Failed to parse response: {}", e),
        status: status.as_u16(),
        body: None,
    })
}

fn extract_message(body: &serde_json::Value) -> Option<String> {
    ["message", "title", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        self.send_json(Method::POST, "/Auth/Login", credentials).await
    }
}

#[async_trait]
impl StudentApi for HttpApi {
    async fn list_students(&self) -> Result<Vec<Student>> {
        self.get_json("/Students").await
    }

    async fn get_student(&self, student_id: i64) -> Result<Student> {
        match self.get_json(&format!("/Students/{}", student_id)).await {
            Err(GradError::Service { status: 404, .. }) => {
                Err(GradError::not_found("Student", student_id))
            }
            other => other,
        }
    }

    async fn list_students_by_advisor(&self, advisor_id: i64) -> Result<Vec<Student>> {
        self.get_json(&format!("/Students/by-advisor/{}", advisor_id))
            .await
    }

    async fn list_courses(&self, student_id: i64) -> Result<Vec<Course>> {
        self.get_json(&format!("/CourseTakens/by-student/{}", student_id))
            .await
    }

    async fn upload_transcript(&self, transcript: &TranscriptData) -> Result<GraduationProcess> {
        self.send_json(
            Method::POST,
            &format!("/CourseTakens/upload-transcript/{}", transcript.student_id),
            transcript,
        )
        .await
    }
}

#[async_trait]
impl ProcessApi for HttpApi {
    async fn get_process_for_student(&self, student_id: i64) -> Result<Option<GraduationProcess>> {
        let path = format!("/GraduationProcesses/student/{}", student_id);
        match self.get_json::<Option<GraduationProcess>>(&path).await {
            Err(GradError::Service { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            other => other,
        }
    }

    async fn list_processes(&self, status: Option<i32>) -> Result<Vec<GraduationProcess>> {
        let path = match status {
            Some(code) => format!("/GraduationProcesses?status={}", code),
            None => "/GraduationProcesses".to_string(),
        };
        self.get_json(&path).await
    }

    async fn apply_action(
        &self,
        action: ProcessAction,
        request: &ActionRequest,
    ) -> Result<GraduationProcess> {
        self.send_json(
            Method::PATCH,
            &format!("/GraduationProcesses/{}", action.path_segment()),
            request,
        )
        .await
    }

    async fn eligibility_results(&self, student_id: i64) -> Result<Vec<EligibilityCheckResult>> {
        self.get_json(&format!("/EligibilityCheckResults/student/{}", student_id))
            .await
    }

    async fn run_eligibility_check(&self, student_id: i64) -> Result<Vec<EligibilityCheckResult>> {
        self.send_json(
            Method::POST,
            &format!("/EligibilityCheckResults/check/{}", student_id),
            &serde_json::json!({}),
        )
        .await
    }

    async fn submit_manual_check(
        &self,
        request: &NewManualCheckRequest,
    ) -> Result<ManualCheckRequest> {
        self.send_json(Method::POST, "/ManualCheckRequests", request)
            .await
    }

    async fn list_manual_checks(&self) -> Result<Vec<ManualCheckRequest>> {
        self.get_json("/ManualCheckRequests").await
    }
}

#[async_trait]
impl NotificationApi for HttpApi {
    async fn notifications(&self, user_id: i64) -> Result<Vec<Notification>> {
        self.get_json(&format!("/Notifications?userId={}", user_id))
            .await
    }

    async fn mark_notification_read(&self, notification_id: i64) -> Result<()> {
        self.send_empty(
            Method::PATCH,
            &format!("/Notifications/{}/read", notification_id),
        )
        .await
    }
}

#[async_trait]
impl UserApi for HttpApi {
    async fn list_users(&self) -> Result<Vec<AuthUser>> {
        self.get_json("/Users").await
    }

    async fn create_user(&self, user: &NewUser) -> Result<AuthUser> {
        self.send_json(Method::POST, "/Users", user).await
    }

    async fn update_user_role(&self, user_id: i64, role: Role) -> Result<AuthUser> {
        self.send_json(
            Method::PATCH,
            &format!("/Users/{}/role", user_id),
            &serde_json::json!({ "role": role }),
        )
        .await
    }
}
