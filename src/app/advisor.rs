use crate::app::review::apply_review;
use crate::core::cache::keys;
use crate::core::GradClient;
use crate::domain::model::{
    AuthUser, EligibilityCheckResult, GraduationProcess, ManualCheckRequest,
    NewManualCheckRequest, ProcessAction, Role, Student,
};
use crate::domain::status::{map_status, GraduationProgress, GraduationStatus};
use crate::utils::error::{GradError, Result};
use crate::utils::retry::{execute_with_rate_limit, BatchOutcome};
use serde::{Deserialize, Serialize};

/// 顧問名下學生與其目前的流程狀態
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviseeSummary {
    pub student: Student,
    pub status: Option<i32>,
}

impl AdviseeSummary {
    pub fn progress(&self) -> GraduationProgress {
        self.status
            .map(map_status)
            .unwrap_or_else(GraduationProgress::not_started)
    }
}

fn not_an_advisor(user: &AuthUser) -> GradError {
    GradError::ValidationError {
        message: format!("Account {} is not linked to an advisor record", user.email),
    }
}

pub type EligibilityOutcome = BatchOutcome<i64, Vec<EligibilityCheckResult>, GradError>;

pub struct AdvisorDesk<'a> {
    client: &'a GradClient,
    user: AuthUser,
    advisor_id: Option<i64>,
}

impl<'a> AdvisorDesk<'a> {
    pub(crate) fn new(client: &'a GradClient) -> Result<Self> {
        let user = client
            .session
            .require_role(&[Role::Advisor], "use the advisor desk")?;
        // admin 可以代審，不需要顧問資料
        if user.role != Role::Admin && user.advisor_id.is_none() {
            return Err(not_an_advisor(&user));
        }
        Ok(Self {
            client,
            advisor_id: user.advisor_id,
            user,
        })
    }

    pub fn advisor_id(&self) -> Option<i64> {
        self.advisor_id
    }

    fn own_advisor_id(&self) -> Result<i64> {
        self.advisor_id.ok_or_else(|| not_an_advisor(&self.user))
    }

    pub fn user(&self) -> &AuthUser {
        &self.user
    }

    /// 名下學生清單（含流程狀態），快取於 `advisorData_{id}`
    ///
    /// 有任何學生的狀態查詢失敗時，結果照常回傳但不寫入快取。
    pub async fn advisees(&self) -> Result<Vec<AdviseeSummary>> {
        let advisor_id = self.own_advisor_id()?;
        let key = keys::advisor_data(advisor_id);
        if let Some(cached) = self.client.cache.get(&key).await {
            return Ok(cached);
        }

        let students = self
            .client
            .api
            .list_students_by_advisor(advisor_id)
            .await?;
        let api = self.client.api();
        let outcomes = execute_with_rate_limit(
            students,
            |student: Student| async move { api.get_process_for_student(student.id).await },
            &self.client.rate_limit,
        )
        .await;

        let mut complete = true;
        let summaries: Vec<AdviseeSummary> = outcomes
            .into_iter()
            .map(|outcome| {
                let status = match outcome.result {
                    Ok(process) => process.map(|p| p.status),
                    Err(e) => {
                        tracing::warn!(
                            "⚠️ Could not load process for student {}: {}",
                            outcome.item.id,
                            e
                        );
                        complete = false;
                        None
                    }
                };
                AdviseeSummary {
                    student: outcome.item,
                    status,
                }
            })
            .collect();

        if complete {
            self.client.cache.put(&key, &summaries).await;
        }
        tracing::info!(
            "👥 Advisor {} has {} advisees",
            advisor_id,
            summaries.len()
        );
        Ok(summaries)
    }

    /// 等待顧問審核的學生
    pub async fn pending_reviews(&self) -> Result<Vec<AdviseeSummary>> {
        Ok(self
            .advisees()
            .await?
            .into_iter()
            .filter(|a| a.status == Some(GraduationStatus::AdvisorPending.code()))
            .collect())
    }

    pub async fn eligibility_for(&self, student_id: i64) -> Result<Vec<EligibilityCheckResult>> {
        let api = self.client.api();
        self.client
            .cache
            .get_or_fetch(&keys::eligibility_results(student_id), || {
                api.eligibility_results(student_id)
            })
            .await
    }

    /// 分批執行資格檢查；成功的結果會更新快取
    pub async fn run_eligibility_checks(&self, student_ids: Vec<i64>) -> Vec<EligibilityOutcome> {
        let api = self.client.api();
        tracing::info!(
            "🔍 Running eligibility checks for {} students",
            student_ids.len()
        );

        let outcomes = execute_with_rate_limit(
            student_ids,
            |student_id: i64| async move { api.run_eligibility_check(student_id).await },
            &self.client.rate_limit,
        )
        .await;

        for outcome in &outcomes {
            match &outcome.result {
                Ok(results) => {
                    self.client
                        .cache
                        .put(&keys::eligibility_results(outcome.item), results)
                        .await;
                }
                Err(e) => {
                    tracing::warn!(
                        "❌ Eligibility check failed for student {}: {}",
                        outcome.item,
                        e
                    );
                }
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.success()).count();
        tracing::info!(
            "✅ Eligibility checks finished: {}/{} succeeded",
            succeeded,
            outcomes.len()
        );
        outcomes
    }

    pub async fn check_all_advisees(&self) -> Result<Vec<EligibilityOutcome>> {
        let ids = self
            .advisees()
            .await?
            .into_iter()
            .map(|a| a.student.id)
            .collect();
        Ok(self.run_eligibility_checks(ids).await)
    }

    pub async fn approve(&self, student_id: i64, comment: Option<String>) -> Result<GraduationProcess> {
        apply_review(self.client, ProcessAction::AdvisorApprove, student_id, comment).await
    }

    pub async fn reject(&self, student_id: i64, comment: &str) -> Result<GraduationProcess> {
        apply_review(
            self.client,
            ProcessAction::AdvisorReject,
            student_id,
            Some(comment.to_string()),
        )
        .await
    }

    /// 請學務處人工確認畢業資格
    pub async fn request_manual_check(
        &self,
        student_id: i64,
        reason: &str,
    ) -> Result<ManualCheckRequest> {
        let advisor_id = self.own_advisor_id()?;
        if reason.trim().is_empty() {
            return Err(GradError::ValidationError {
                message: "A reason is required for a manual check".to_string(),
            });
        }
        let request = NewManualCheckRequest {
            student_id,
            advisor_id,
            reason: reason.trim().to_string(),
        };
        let created = self.client.api.submit_manual_check(&request).await?;
        tracing::info!(
            "📝 Manual check #{} requested for student {}",
            created.id,
            student_id
        );
        Ok(created)
    }
}
