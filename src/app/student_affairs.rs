use crate::app::review::{apply_review, PendingApplication, ReviewDesk};
use crate::core::GradClient;
use crate::domain::model::{GraduationProcess, ManualCheckRequest, ManualCheckStatus, ProcessAction, Role};
use crate::domain::status::GraduationStatus;
use crate::utils::error::Result;

/// 學務處：最終審核、完成畢業與人工資格確認
pub struct StudentAffairsDesk<'a> {
    client: &'a GradClient,
    review: ReviewDesk<'a>,
}

impl<'a> StudentAffairsDesk<'a> {
    pub(crate) fn new(client: &'a GradClient) -> Result<Self> {
        Ok(Self {
            client,
            review: ReviewDesk::new(client, Role::StudentAffairs)?,
        })
    }

    pub async fn pending(&self) -> Result<Vec<PendingApplication>> {
        self.review.pending().await
    }

    /// 已核准、等待完成畢業的申請
    pub async fn ready_to_graduate(&self) -> Result<Vec<PendingApplication>> {
        self.review
            .with_status(GraduationStatus::StudentAffairsApproved)
            .await
    }

    pub async fn approve(&self, student_id: i64, comment: Option<String>) -> Result<GraduationProcess> {
        self.review.approve(student_id, comment).await
    }

    pub async fn reject(&self, student_id: i64, comment: &str) -> Result<GraduationProcess> {
        self.review.reject(student_id, comment).await
    }

    pub async fn complete_graduation(&self, student_id: i64) -> Result<GraduationProcess> {
        let process =
            apply_review(self.client, ProcessAction::CompleteGraduation, student_id, None).await?;
        tracing::info!("🎓 Student {} graduated", student_id);
        Ok(process)
    }

    pub async fn manual_checks(&self) -> Result<Vec<ManualCheckRequest>> {
        self.client.api.list_manual_checks().await
    }

    pub async fn open_manual_checks(&self) -> Result<Vec<ManualCheckRequest>> {
        Ok(self
            .manual_checks()
            .await?
            .into_iter()
            .filter(|r| r.status == ManualCheckStatus::Pending)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client_with_sample_data, login};
    use crate::utils::error::GradError;

    #[tokio::test]
    async fn test_complete_graduation_only_after_approval() {
        let (client, api) = client_with_sample_data().await;
        api.set_status(100, GraduationStatus::StudentAffairsPending).await;
        login(&client, "affairs@uni.edu").await;
        let desk = client.student_affairs().unwrap();

        let err = desk.complete_graduation(100).await.unwrap_err();
        assert!(matches!(err, GradError::InvalidTransition { status: 7, .. }));

        desk.approve(100, None).await.unwrap();
        let ready = desk.ready_to_graduate().await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(
            ready[0].student.as_ref().map(|s| s.student_number.as_str()),
            Some("210201001")
        );

        let process = desk.complete_graduation(100).await.unwrap();
        assert_eq!(process.status, GraduationStatus::Graduated.code());
        assert!(desk.ready_to_graduate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manual_checks_visible_to_student_affairs() {
        let (client, _) = client_with_sample_data().await;
        login(&client, "advisor@uni.edu").await;
        client
            .advisor()
            .unwrap()
            .request_manual_check(101, "Exchange semester grades")
            .await
            .unwrap();

        login(&client, "affairs@uni.edu").await;
        let desk = client.student_affairs().unwrap();
        let open = desk.open_manual_checks().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].student_id, 101);

        let unread = client.unread_notifications().await.unwrap();
        assert_eq!(unread.len(), 1);
    }
}
