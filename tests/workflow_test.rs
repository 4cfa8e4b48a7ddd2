use anyhow::Result;
use grad_manager::core::cache::{keys, ResponseCache};
use grad_manager::core::SessionStore;
use grad_manager::domain::model::Course;
use grad_manager::{
    AppConfig, GradClient, GradError, GraduationStatus, MemoryStorage, MockApi, RateLimitOptions,
    StepStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn mock_client() -> (GradClient, MockApi) {
    let api = MockApi::new().with_sample_data().await;
    let cache = ResponseCache::new(Arc::new(MemoryStorage::new()), Duration::from_secs(3600));
    let client = GradClient::new(Arc::new(api.clone()), SessionStore::new(), cache)
        .with_rate_limit(RateLimitOptions {
            batch_size: 3,
            delay_between_batches: Duration::ZERO,
            max_retries: 2,
            retry_delay: Duration::ZERO,
        });
    (client, api)
}

fn transcript() -> Vec<Course> {
    [
        ("CENG491", "Senior Design Project I", 120, "AA"),
        ("CENG492", "Senior Design Project II", 80, "BA"),
        ("MATH255", "Numerical Methods", 44, "CB"),
    ]
    .into_iter()
    .map(|(code, name, credits, grade)| Course {
        code: code.to_string(),
        name: name.to_string(),
        credits,
        grade: grade.to_string(),
        semester: Some("2025-Fall".to_string()),
    })
    .collect()
}

/// 從上傳成績單到完成畢業的完整流程
#[tokio::test]
async fn test_full_approval_chain() -> Result<()> {
    let (client, _) = mock_client().await;

    client.login("zeynep.arslan@std.uni.edu", "password").await?;
    client.student()?.upload_transcript(transcript()).await?;
    assert_eq!(client.progress_of(100).await?.active_step, 1);

    client.login("advisor@uni.edu", "password").await?;
    let advisor = client.advisor()?;
    let outcomes = advisor.check_all_advisees().await?;
    assert_eq!(outcomes.len(), 2);
    assert!(advisor.eligibility_for(100).await?.iter().all(|r| r.is_met));
    advisor.approve(100, None).await?;

    client.login("secretary@uni.edu", "password").await?;
    client.secretary()?.approve(100, None).await?;

    client.login("dean@uni.edu", "password").await?;
    client.deans_office()?.approve(100, None).await?;

    client.login("affairs@uni.edu", "password").await?;
    let affairs = client.student_affairs()?;
    affairs.approve(100, None).await?;
    let progress = client.progress_of(100).await?;
    assert_eq!(progress.active_step, 4);
    assert!(progress.step_statuses[..5]
        .iter()
        .all(|s| *s == StepStatus::Approved));

    let process = affairs.complete_graduation(100).await?;
    assert_eq!(process.status, GraduationStatus::Graduated.code());

    client.login("zeynep.arslan@std.uni.edu", "password").await?;
    let progress = client.student()?.progress().await;
    assert_eq!(progress.active_step, 5);
    assert_eq!(progress.step_statuses[5], StepStatus::Approved);

    // 每一關審核都會通知學生
    let notifications = client.unread_notifications().await?;
    assert_eq!(notifications.len(), 5);
    assert_eq!(client.mark_all_notifications_read().await?, 5);
    assert!(client.unread_notifications().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_rejected_transcript_can_be_resubmitted() -> Result<()> {
    let (client, _) = mock_client().await;

    client.login("burak.celik@std.uni.edu", "password").await?;
    client.student()?.upload_transcript(transcript()).await?;

    client.login("advisor@uni.edu", "password").await?;
    client
        .advisor()?
        .reject(101, "Missing internship credits")
        .await?;

    client.login("burak.celik@std.uni.edu", "password").await?;
    let desk = client.student()?;
    let progress = desk.progress().await;
    assert_eq!(progress.active_step, 1);
    assert_eq!(progress.step_statuses[1], StepStatus::Rejected);

    let process = desk.process().await?.expect("process exists");
    assert_eq!(process.last_comment.as_deref(), Some("Missing internship credits"));

    let process = desk.upload_transcript(transcript()).await?;
    assert_eq!(process.status, GraduationStatus::AdvisorPending.code());
    Ok(())
}

#[tokio::test]
async fn test_roles_are_enforced() -> Result<()> {
    let (client, api) = mock_client().await;
    api.set_status(100, GraduationStatus::DepartmentPending).await;

    assert!(matches!(
        client.secretary(),
        Err(GradError::Unauthorized { .. })
    ));

    client.login("zeynep.arslan@std.uni.edu", "password").await?;
    assert!(matches!(client.advisor(), Err(GradError::Forbidden { .. })));
    assert!(matches!(
        client.progress_of(101).await,
        Err(GradError::Forbidden { .. })
    ));

    // admin 可以代任何角色操作
    client.login("admin@uni.edu", "password").await?;
    let process = client.secretary()?.approve(100, None).await?;
    assert_eq!(process.status, GraduationStatus::DeansOfficePending.code());
    Ok(())
}

/// 暫時性失敗只重試失敗的項目
#[tokio::test]
async fn test_batch_checks_retry_network_failures() -> Result<()> {
    let (client, api) = mock_client().await;
    client.login("advisor@uni.edu", "password").await?;
    let desk = client.advisor()?;

    let before = api.call_count().await;
    api.fail_next(2).await;
    let outcomes = desk.run_eligibility_checks(vec![100, 101]).await;

    assert_eq!(
        outcomes.iter().map(|o| o.item).collect::<Vec<_>>(),
        vec![100, 101]
    );
    assert!(outcomes.iter().all(|o| o.success()));
    // 兩次失敗加上兩次成功的重試
    assert_eq!(api.call_count().await - before, 4);
    Ok(())
}

#[tokio::test]
async fn test_transcript_upload_invalidates_cached_lists() -> Result<()> {
    let (client, _) = mock_client().await;

    client.login("advisor@uni.edu", "password").await?;
    let before = client.advisor()?.advisees().await?;
    assert!(before.iter().all(|a| a.student.gpa == 0.0));

    client.login("zeynep.arslan@std.uni.edu", "password").await?;
    client.student()?.upload_transcript(transcript()).await?;

    client.login("advisor@uni.edu", "password").await?;
    let after = client.advisor()?.advisees().await?;
    let zeynep = after
        .iter()
        .find(|a| a.student.id == 100)
        .expect("advisee listed");
    assert!(zeynep.student.gpa > 3.0);
    assert_eq!(zeynep.status, Some(GraduationStatus::AdvisorPending.code()));
    Ok(())
}

/// 指定快取目錄時以 JSON 檔案保存
#[tokio::test]
async fn test_file_cache_from_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut config = AppConfig::default();
    config.mock.min_delay_ms = 0;
    config.mock.max_delay_ms = 0;
    config.cache.directory = Some(temp_dir.path().to_string_lossy().to_string());

    let client = GradClient::from_config(&config).await?;
    client.login("advisor@uni.edu", "password").await?;
    client.advisor()?.advisees().await?;

    let cache_file = temp_dir.path().join(format!("{}.json", keys::advisor_data(2)));
    assert!(cache_file.exists());
    Ok(())
}
