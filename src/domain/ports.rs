use crate::domain::model::{
    ActionRequest, AuthUser, Course, Credentials, EligibilityCheckResult, GraduationProcess,
    LoginResponse, ManualCheckRequest, NewManualCheckRequest, NewUser, Notification,
    ProcessAction, Role, Student, TranscriptData,
};
use crate::utils::error::Result;
use crate::utils::retry::{RateLimitOptions, RetryOptions};
use async_trait::async_trait;

/// 鍵值儲存，用來保存回應快取
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>>;
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
    async fn remove_file(&self, path: &str) -> Result<()>;
}

pub trait ConfigProvider: Send + Sync {
    fn api_base_url(&self) -> &str;
    fn uses_mock(&self) -> bool;
    fn request_timeout_secs(&self) -> u64;
    fn retry_options(&self) -> RetryOptions;
    fn rate_limit_options(&self) -> RateLimitOptions;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse>;
}

#[async_trait]
pub trait StudentApi: Send + Sync {
    async fn list_students(&self) -> Result<Vec<Student>>;
    async fn get_student(&self, student_id: i64) -> Result<Student>;
    async fn list_students_by_advisor(&self, advisor_id: i64) -> Result<Vec<Student>>;
    async fn list_courses(&self, student_id: i64) -> Result<Vec<Course>>;
    async fn upload_transcript(&self, transcript: &TranscriptData) -> Result<GraduationProcess>;
}

#[async_trait]
pub trait ProcessApi: Send + Sync {
    /// 學生尚未建立流程時回傳 `None`
    async fn get_process_for_student(&self, student_id: i64) -> Result<Option<GraduationProcess>>;
    async fn list_processes(&self, status: Option<i32>) -> Result<Vec<GraduationProcess>>;
    async fn apply_action(
        &self,
        action: ProcessAction,
        request: &ActionRequest,
    ) -> Result<GraduationProcess>;
    async fn eligibility_results(&self, student_id: i64) -> Result<Vec<EligibilityCheckResult>>;
    async fn run_eligibility_check(&self, student_id: i64) -> Result<Vec<EligibilityCheckResult>>;
    async fn submit_manual_check(
        &self,
        request: &NewManualCheckRequest,
    ) -> Result<ManualCheckRequest>;
    async fn list_manual_checks(&self) -> Result<Vec<ManualCheckRequest>>;
}

#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn notifications(&self, user_id: i64) -> Result<Vec<Notification>>;
    async fn mark_notification_read(&self, notification_id: i64) -> Result<()>;
}

#[async_trait]
pub trait UserApi: Send + Sync {
    async fn list_users(&self) -> Result<Vec<AuthUser>>;
    async fn create_user(&self, user: &NewUser) -> Result<AuthUser>;
    async fn update_user_role(&self, user_id: i64, role: Role) -> Result<AuthUser>;
}

/// 完整的後端介面，HTTP 與 mock 實作皆提供
pub trait GraduationApi: AuthApi + StudentApi + ProcessApi + NotificationApi + UserApi {}

impl<T> GraduationApi for T where T: AuthApi + StudentApi + ProcessApi + NotificationApi + UserApi {}
