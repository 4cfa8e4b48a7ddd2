use crate::app::review::invalidate_student_caches;
use crate::core::cache::keys;
use crate::core::progress::fetch_progress;
use crate::core::GradClient;
use crate::domain::model::{
    AuthUser, Course, EligibilityCheckResult, GraduationProcess, Role, Student, TranscriptData,
};
use crate::domain::status::{GraduationProgress, GraduationStatus};
use crate::utils::error::{GradError, Result};

pub struct StudentDesk<'a> {
    client: &'a GradClient,
    user: AuthUser,
    student_id: i64,
}

impl<'a> StudentDesk<'a> {
    pub(crate) fn new(client: &'a GradClient) -> Result<Self> {
        let user = client
            .session
            .require_role(&[Role::Student], "use the student desk")?;
        let student_id = user.student_id.ok_or_else(|| GradError::ValidationError {
            message: format!("Account {} is not linked to a student record", user.email),
        })?;
        Ok(Self {
            client,
            user,
            student_id,
        })
    }

    pub fn student_id(&self) -> i64 {
        self.student_id
    }

    pub fn user(&self) -> &AuthUser {
        &self.user
    }

    pub async fn profile(&self) -> Result<Student> {
        self.client.api.get_student(self.student_id).await
    }

    pub async fn process(&self) -> Result<Option<GraduationProcess>> {
        self.client.api.get_process_for_student(self.student_id).await
    }

    pub async fn progress(&self) -> GraduationProgress {
        fetch_progress(self.client.api(), self.student_id).await
    }

    pub async fn courses(&self) -> Result<Vec<Course>> {
        self.client.api.list_courses(self.student_id).await
    }

    /// 上傳成績單，GPA 與學分由課程清單計算
    ///
    /// 只有尚未送審或被顧問退回時可以上傳。
    pub async fn upload_transcript(&self, courses: Vec<Course>) -> Result<GraduationProcess> {
        if courses.is_empty() {
            return Err(GradError::ValidationError {
                message: "A transcript must contain at least one course".to_string(),
            });
        }
        if let Some(course) = courses.iter().find(|c| c.code.trim().is_empty()) {
            return Err(GradError::ValidationError {
                message: format!("Course '{}' has no course code", course.name),
            });
        }

        if let Some(process) = self.process().await? {
            let resubmittable = matches!(
                process.status(),
                Some(GraduationStatus::AwaitingTranscript | GraduationStatus::AdvisorRejected)
            );
            if !resubmittable {
                return Err(GradError::InvalidTransition {
                    action: "UploadTranscript".to_string(),
                    status: process.status,
                });
            }
        }

        let transcript = TranscriptData::from_courses(self.student_id, courses);
        tracing::info!(
            "📤 Uploading transcript for student {}: {} courses, GPA {:.2}, {} credits",
            self.student_id,
            transcript.courses.len(),
            transcript.gpa,
            transcript.total_credits
        );

        let process = self.client.api.upload_transcript(&transcript).await?;
        self.client.cache.invalidate(keys::STUDENT_LIST).await;
        invalidate_student_caches(self.client, self.student_id).await;
        Ok(process)
    }

    pub async fn eligibility(&self) -> Result<Vec<EligibilityCheckResult>> {
        let api = self.client.api();
        let student_id = self.student_id;
        self.client
            .cache
            .get_or_fetch(&keys::eligibility_results(student_id), || {
                api.eligibility_results(student_id)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::StepStatus;
    use crate::testing::{client_with_sample_data, login};

    fn course(code: &str, credits: u32, grade: &str) -> Course {
        Course {
            code: code.to_string(),
            name: format!("{} course", code),
            credits,
            grade: grade.to_string(),
            semester: Some("2025-Spring".to_string()),
        }
    }

    #[tokio::test]
    async fn test_upload_transcript_starts_review() {
        let (client, _) = client_with_sample_data().await;
        login(&client, "zeynep.arslan@std.uni.edu").await;
        let desk = client.student().unwrap();

        let process = desk
            .upload_transcript(vec![course("CENG491", 8, "AA"), course("CENG492", 8, "BB")])
            .await
            .unwrap();
        assert_eq!(process.status, GraduationStatus::AdvisorPending.code());

        let profile = desk.profile().await.unwrap();
        assert_eq!(profile.gpa, 3.5);
        assert_eq!(profile.total_credits, 16);

        let progress = desk.progress().await;
        assert_eq!(progress.active_step, 1);
        assert_eq!(progress.step_statuses[0], StepStatus::Approved);
        assert_eq!(desk.courses().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_rejected_while_under_review() {
        let (client, api) = client_with_sample_data().await;
        api.set_status(100, GraduationStatus::DeansOfficePending).await;
        login(&client, "zeynep.arslan@std.uni.edu").await;

        let err = client
            .student()
            .unwrap()
            .upload_transcript(vec![course("CENG491", 8, "AA")])
            .await
            .unwrap_err();
        assert!(matches!(err, GradError::InvalidTransition { status: 5, .. }));
    }

    #[tokio::test]
    async fn test_empty_transcript_is_invalid() {
        let (client, _) = client_with_sample_data().await;
        login(&client, "burak.celik@std.uni.edu").await;
        let err = client
            .student()
            .unwrap()
            .upload_transcript(Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GradError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_staff_account_has_no_student_record() {
        let (client, _) = client_with_sample_data().await;
        login(&client, "admin@uni.edu").await;
        assert!(matches!(
            client.student(),
            Err(GradError::ValidationError { .. })
        ));
    }
}
