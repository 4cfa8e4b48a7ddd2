use crate::core::cache::keys;
use crate::core::GradClient;
use crate::domain::model::{ActionRequest, AuthUser, GraduationProcess, ProcessAction, Role, Student};
use crate::domain::status::GraduationStatus;
use crate::utils::error::{GradError, Result};
use serde::{Deserialize, Serialize};

/// 待審核的申請，附上學生資料（若學生清單可取得）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApplication {
    pub process: GraduationProcess,
    pub student: Option<Student>,
}

/// 有快取就用快取的學生清單
pub(crate) async fn cached_students(client: &GradClient) -> Result<Vec<Student>> {
    let api = client.api();
    client
        .cache
        .get_or_fetch(keys::STUDENT_LIST, || api.list_students())
        .await
}

/// 清除與學生相關的快取
pub(crate) async fn invalidate_student_caches(client: &GradClient, student_id: i64) {
    client.cache.invalidate(&keys::eligibility_results(student_id)).await;
    match client.api.get_student(student_id).await {
        Ok(Student {
            advisor_id: Some(advisor_id),
            ..
        }) => {
            client.cache.invalidate(&keys::advisor_data(advisor_id)).await;
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(
                "⚠️ Could not resolve advisor of student {} for cache invalidation: {}",
                student_id,
                e
            );
        }
    }
}

/// 顧問只能審自己的學生，系辦只能審自己系上的學生；admin 不受限
async fn ensure_reviews_student(
    client: &GradClient,
    user: &AuthUser,
    student_id: i64,
) -> Result<()> {
    let allowed = match user.role {
        Role::Advisor => {
            let student = client.api.get_student(student_id).await?;
            user.advisor_id.is_some() && student.advisor_id == user.advisor_id
        }
        Role::Secretary => match user.department.as_deref() {
            Some(department) => {
                let student = client.api.get_student(student_id).await?;
                student.department == department
            }
            None => true,
        },
        _ => true,
    };

    if allowed {
        Ok(())
    } else {
        Err(GradError::Forbidden {
            role: user.role.to_string(),
            action: format!("review student {}", student_id),
        })
    }
}

/// 送出審核動作
///
/// 先確認角色、目前狀態與審核範圍，不合法的動作不會送到後端。
pub(crate) async fn apply_review(
    client: &GradClient,
    action: ProcessAction,
    student_id: i64,
    comment: Option<String>,
) -> Result<GraduationProcess> {
    let user = client
        .session
        .require_role(&[action.role()], &action.to_string())?;

    let comment = comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if action.is_rejection() && comment.is_none() {
        return Err(GradError::ValidationError {
            message: "A comment is required when rejecting an application".to_string(),
        });
    }

    let current = client
        .api
        .get_process_for_student(student_id)
        .await?
        .ok_or_else(|| GradError::not_found("Graduation process for student", student_id))?;
    if action.apply(current.status).is_none() {
        return Err(GradError::InvalidTransition {
            action: action.to_string(),
            status: current.status,
        });
    }
    ensure_reviews_student(client, &user, student_id).await?;

    let updated = client
        .api
        .apply_action(action, &ActionRequest { student_id, comment })
        .await?;
    tracing::info!(
        "✅ {} applied to student {}: {} -> {}",
        action,
        student_id,
        current.status,
        updated.status
    );

    invalidate_student_caches(client, student_id).await;
    Ok(updated)
}

fn pending_status(role: Role) -> GraduationStatus {
    match role {
        Role::Advisor => GraduationStatus::AdvisorPending,
        Role::Secretary => GraduationStatus::DepartmentPending,
        Role::DeansOffice => GraduationStatus::DeansOfficePending,
        Role::StudentAffairs | Role::Student | Role::Admin => {
            GraduationStatus::StudentAffairsPending
        }
    }
}

/// 系辦、院辦、學務處共用的審核窗口
pub struct ReviewDesk<'a> {
    client: &'a GradClient,
    user: AuthUser,
    role: Role,
}

impl<'a> ReviewDesk<'a> {
    pub(crate) fn new(client: &'a GradClient, role: Role) -> Result<Self> {
        let user = client
            .session
            .require_role(&[role], "review graduation applications")?;
        Ok(Self { client, user, role })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn user(&self) -> &AuthUser {
        &self.user
    }

    pub async fn pending(&self) -> Result<Vec<PendingApplication>> {
        self.with_status(pending_status(self.role)).await
    }

    /// 指定狀態的申請；系辦帳號只會看到自己系上的學生
    pub async fn with_status(&self, status: GraduationStatus) -> Result<Vec<PendingApplication>> {
        let processes = self.client.api.list_processes(Some(status.code())).await?;
        let students = match cached_students(self.client).await {
            Ok(students) => students,
            Err(e) => {
                tracing::warn!("⚠️ Student list unavailable, showing bare processes: {}", e);
                Vec::new()
            }
        };

        let department = match (self.role, self.user.role) {
            (Role::Secretary, Role::Secretary) => self.user.department.as_deref(),
            _ => None,
        };

        let applications: Vec<PendingApplication> = processes
            .into_iter()
            .map(|process| PendingApplication {
                student: students.iter().find(|s| s.id == process.student_id).cloned(),
                process,
            })
            .filter(|app| match (department, &app.student) {
                (Some(dept), Some(student)) => student.department == dept,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .collect();

        tracing::debug!(
            "📋 {} applications in status {} for {}",
            applications.len(),
            status.code(),
            self.role
        );
        Ok(applications)
    }

    pub async fn approve(&self, student_id: i64, comment: Option<String>) -> Result<GraduationProcess> {
        let action = ProcessAction::approve_for(self.role).ok_or_else(|| GradError::Forbidden {
            role: self.role.to_string(),
            action: "approve applications".to_string(),
        })?;
        apply_review(self.client, action, student_id, comment).await
    }

    pub async fn reject(&self, student_id: i64, comment: &str) -> Result<GraduationProcess> {
        let action = ProcessAction::reject_for(self.role).ok_or_else(|| GradError::Forbidden {
            role: self.role.to_string(),
            action: "reject applications".to_string(),
        })?;
        apply_review(self.client, action, student_id, Some(comment.to_string())).await
    }
}
