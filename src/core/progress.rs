use crate::domain::ports::ProcessApi;
use crate::domain::status::{map_status, GraduationProgress};

/// 查詢學生的畢業進度
///
/// 沒有流程或查詢失敗時回傳全 pending 的進度，而不是錯誤。
pub async fn fetch_progress<A: ProcessApi + ?Sized>(api: &A, student_id: i64) -> GraduationProgress {
    match api.get_process_for_student(student_id).await {
        Ok(Some(process)) => {
            let progress = map_status(process.status);
            tracing::debug!(
                "📍 Student {} status {} -> step {} ({})",
                student_id,
                process.status,
                progress.active_step,
                progress.active_stage_name()
            );
            progress
        }
        Ok(None) => {
            tracing::info!("Student {} has no graduation process yet", student_id);
            GraduationProgress::not_started()
        }
        Err(e) => {
            tracing::warn!(
                "⚠️ Could not load graduation process for student {}: {}. Showing default progress",
                student_id,
                e
            );
            GraduationProgress::not_started()
        }
    }
}
