use crate::app::review::{apply_review, cached_students};
use crate::core::cache::keys;
use crate::core::GradClient;
use crate::domain::model::{AuthUser, GraduationProcess, NewUser, ProcessAction, Role, Student};
use crate::domain::status::GraduationStatus;
use crate::utils::error::{GradError, Result};
use crate::utils::validation::validate_non_empty_string;

const MIN_PASSWORD_LENGTH: usize = 8;

pub struct AdminDesk<'a> {
    client: &'a GradClient,
}

impl<'a> AdminDesk<'a> {
    pub(crate) fn new(client: &'a GradClient) -> Result<Self> {
        client
            .session
            .require_role(&[Role::Admin], "administer accounts")?;
        Ok(Self { client })
    }

    pub async fn users(&self) -> Result<Vec<AuthUser>> {
        self.client.api.list_users().await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<AuthUser> {
        validate_non_empty_string("full_name", &user.full_name)?;
        let email = user.email.trim();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(GradError::ValidationError {
                message: format!("'{}' is not a valid email address", user.email),
            });
        }
        if user.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(GradError::ValidationError {
                message: format!(
                    "Password must be at least {} characters",
                    MIN_PASSWORD_LENGTH
                ),
            });
        }

        let created = self.client.api.create_user(user).await?;
        tracing::info!("👤 Created {} account {}", created.role, created.email);
        Ok(created)
    }

    pub async fn update_user_role(&self, user_id: i64, role: Role) -> Result<AuthUser> {
        let updated = self.client.api.update_user_role(user_id, role).await?;
        tracing::info!("👤 User {} is now {}", updated.email, updated.role);
        Ok(updated)
    }

    pub async fn processes(&self, status: Option<GraduationStatus>) -> Result<Vec<GraduationProcess>> {
        self.client
            .api
            .list_processes(status.map(GraduationStatus::code))
            .await
    }

    pub async fn students(&self) -> Result<Vec<Student>> {
        cached_students(self.client).await
    }

    /// 代任何角色送出審核動作
    pub async fn apply(
        &self,
        action: ProcessAction,
        student_id: i64,
        comment: Option<String>,
    ) -> Result<GraduationProcess> {
        apply_review(self.client, action, student_id, comment).await
    }

    /// 依學生目前所在的關卡核准
    pub async fn approve(&self, student_id: i64, comment: Option<String>) -> Result<GraduationProcess> {
        let action = self.stage_action(student_id, true).await?;
        self.apply(action, student_id, comment).await
    }

    /// 依學生目前所在的關卡退回
    pub async fn reject(&self, student_id: i64, comment: &str) -> Result<GraduationProcess> {
        let action = self.stage_action(student_id, false).await?;
        self.apply(action, student_id, Some(comment.to_string())).await
    }

    async fn stage_action(&self, student_id: i64, approve: bool) -> Result<ProcessAction> {
        let process = self
            .client
            .api
            .get_process_for_student(student_id)
            .await?
            .ok_or_else(|| GradError::not_found("Graduation process for student", student_id))?;
        ProcessAction::for_status(process.status, approve).ok_or_else(|| {
            GradError::InvalidTransition {
                action: if approve { "Approve" } else { "Reject" }.to_string(),
                status: process.status,
            }
        })
    }

    /// 丟棄快取的學生清單並重新讀取
    pub async fn refresh_students(&self) -> Result<Vec<Student>> {
        self.client.cache.invalidate(keys::STUDENT_LIST).await;
        self.students().await
    }
}
