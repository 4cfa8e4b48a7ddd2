//! 各角色的操作窗口
//!
//! 登入後由 [`GradClient`] 依角色取得對應的 desk；角色不符時回傳
//! `Forbidden`，admin 可以開啟任何 desk。

pub mod admin;
pub mod advisor;
pub mod review;
pub mod student;
pub mod student_affairs;

pub use admin::AdminDesk;
pub use advisor::{AdviseeSummary, AdvisorDesk};
pub use review::{PendingApplication, ReviewDesk};
pub use student::StudentDesk;
pub use student_affairs::StudentAffairsDesk;

use crate::core::progress::fetch_progress;
use crate::core::GradClient;
use crate::domain::model::{AuthUser, EligibilityCheckResult, Role};
use crate::domain::status::GraduationProgress;
use crate::utils::error::{GradError, Result};

impl GradClient {
    pub fn student(&self) -> Result<StudentDesk<'_>> {
        StudentDesk::new(self)
    }

    pub fn advisor(&self) -> Result<AdvisorDesk<'_>> {
        AdvisorDesk::new(self)
    }

    pub fn secretary(&self) -> Result<ReviewDesk<'_>> {
        ReviewDesk::new(self, Role::Secretary)
    }

    pub fn deans_office(&self) -> Result<ReviewDesk<'_>> {
        ReviewDesk::new(self, Role::DeansOffice)
    }

    pub fn student_affairs(&self) -> Result<StudentAffairsDesk<'_>> {
        StudentAffairsDesk::new(self)
    }

    pub fn admin(&self) -> Result<AdminDesk<'_>> {
        AdminDesk::new(self)
    }

    /// 學生帳號只能查自己的資料
    fn require_viewer_of(&self, student_id: i64, what: &str) -> Result<AuthUser> {
        let user = self.session.user().ok_or_else(|| GradError::Unauthorized {
            message: format!("login required to view {}", what),
        })?;
        if user.role == Role::Student && user.student_id != Some(student_id) {
            return Err(GradError::Forbidden {
                role: user.role.to_string(),
                action: format!("view the {} of student {}", what, student_id),
            });
        }
        Ok(user)
    }

    /// 任一學生的進度；學生帳號只能查自己
    pub async fn progress_of(&self, student_id: i64) -> Result<GraduationProgress> {
        self.require_viewer_of(student_id, "graduation progress")?;
        Ok(fetch_progress(self.api(), student_id).await)
    }

    /// 學生查自己的資格結果，其他角色經由顧問窗口查詢
    pub async fn eligibility_of(&self, student_id: i64) -> Result<Vec<EligibilityCheckResult>> {
        let user = self.require_viewer_of(student_id, "eligibility results")?;
        if user.role == Role::Student {
            return self.student()?.eligibility().await;
        }
        self.advisor()?.eligibility_for(student_id).await
    }
}
