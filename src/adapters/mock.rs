//! 行程內的模擬後端
//!
//! `ApiSource::Mock` 時使用，行為與 REST 後端一致：同樣的狀態轉換規則、
//! 同樣以 [`GradError::Service`] 回報應用層錯誤，並可模擬隨機延遲與
//! 暫時性的網路失敗。

use crate::domain::model::{
    ActionRequest, AuthUser, Course, Credentials, EligibilityCheckResult, GraduationProcess,
    LoginResponse, ManualCheckRequest, ManualCheckStatus, NewManualCheckRequest, NewUser,
    Notification, ProcessAction, RequirementKind, Role, Student, TranscriptData,
};
use crate::domain::ports::{AuthApi, NotificationApi, ProcessApi, StudentApi, UserApi};
use crate::domain::status::GraduationStatus;
use crate::utils::error::{GradError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// 畢業資格門檻
#[derive(Debug, Clone)]
pub struct EligibilityRules {
    pub min_gpa: f64,
    pub min_credits: u32,
}

impl Default for EligibilityRules {
    fn default() -> Self {
        Self {
            min_gpa: 2.0,
            min_credits: 240,
        }
    }
}

#[derive(Debug, Clone)]
struct MockAccount {
    user: AuthUser,
    password: String,
}

#[derive(Debug, Default)]
struct MockState {
    accounts: Vec<MockAccount>,
    students: Vec<Student>,
    courses: HashMap<i64, Vec<Course>>,
    processes: Vec<GraduationProcess>,
    eligibility: HashMap<i64, Vec<EligibilityCheckResult>>,
    manual_checks: Vec<ManualCheckRequest>,
    notifications: Vec<Notification>,
    next_id: i64,
    pending_failures: u32,
    calls: u64,
}

impl MockState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn notify(&mut self, user_id: i64, title: &str, message: String) {
        let id = self.next_id();
        self.notifications.push(Notification {
            id,
            user_id,
            title: title.to_string(),
            message,
            is_read: false,
            created_at: Utc::now(),
        });
    }

    fn user_ids_where(&self, predicate: impl Fn(&AuthUser) -> bool) -> Vec<i64> {
        self.accounts
            .iter()
            .filter(|a| predicate(&a.user))
            .map(|a| a.user.id)
            .collect()
    }

    fn student(&self, student_id: i64) -> Result<&Student> {
        self.students
            .iter()
            .find(|s| s.id == student_id)
            .ok_or_else(|| GradError::service(404, format!("Student {} not found", student_id)))
    }
}

#[derive(Clone)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
    latency: (Duration, Duration),
    rules: EligibilityRules,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    /// 空白、無延遲的模擬後端
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            latency: (Duration::ZERO, Duration::ZERO),
            rules: EligibilityRules::default(),
        }
    }

    /// 每次呼叫隨機延遲 `min..=max`
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.latency = (min, max.max(min));
        self
    }

    pub fn with_rules(mut self, rules: EligibilityRules) -> Self {
        self.rules = rules;
        self
    }

    /// 讓接下來 `count` 次呼叫以 "Failed to fetch" 失敗
    pub async fn fail_next(&self, count: u32) {
        self.state.lock().await.pending_failures = count;
    }

    /// 已處理的呼叫次數（含模擬失敗）
    pub async fn call_count(&self) -> u64 {
        self.state.lock().await.calls
    }

    pub async fn add_account(&self, user: AuthUser, password: &str) {
        let mut state = self.state.lock().await;
        state.next_id = state.next_id.max(user.id);
        state.accounts.push(MockAccount {
            user,
            password: password.to_string(),
        });
    }

    pub async fn add_student(&self, student: Student) {
        let mut state = self.state.lock().await;
        state.next_id = state.next_id.max(student.id);
        state.students.push(student);
    }

    pub async fn set_courses(&self, student_id: i64, courses: Vec<Course>) {
        self.state.lock().await.courses.insert(student_id, courses);
    }

    pub async fn set_status(&self, student_id: i64, status: GraduationStatus) {
        let mut state = self.state.lock().await;
        if let Some(process) = state.processes.iter_mut().find(|p| p.student_id == student_id) {
            process.status = status.code();
            process.updated_at = Utc::now();
            return;
        }
        let id = state.next_id();
        state.processes.push(GraduationProcess {
            id,
            student_id,
            status: status.code(),
            last_comment: None,
            updated_at: Utc::now(),
        });
    }

    /// 小型示範資料：每個角色一個帳號、兩位學生，密碼皆為 `password`
    pub async fn with_sample_data(self) -> Self {
        let staff = [
            (1, "admin@uni.edu", "System Admin", Role::Admin, None, None),
            (2, "advisor@uni.edu", "Dr. Ayse Kaya", Role::Advisor, Some(2), Some("CENG")),
            (3, "secretary@uni.edu", "Mehmet Demir", Role::Secretary, None, Some("CENG")),
            (4, "dean@uni.edu", "Prof. Elif Sahin", Role::DeansOffice, None, None),
            (5, "affairs@uni.edu", "Can Yilmaz", Role::StudentAffairs, None, None),
        ];
        for (id, email, name, role, advisor_id, department) in staff {
            self.add_account(
                AuthUser {
                    id,
                    email: email.to_string(),
                    full_name: name.to_string(),
                    role,
                    student_id: None,
                    advisor_id,
                    department: department.map(str::to_string),
                },
                "password",
            )
            .await;
        }

        let students = [
            (10, 100, "210201001", "Zeynep", "Arslan"),
            (11, 101, "210201002", "Burak", "Celik"),
        ];
        for (user_id, student_id, number, first, last) in students {
            let email = format!("{}.{}@std.uni.edu", first.to_lowercase(), last.to_lowercase());
            self.add_account(
                AuthUser {
                    id: user_id,
                    email: email.clone(),
                    full_name: format!("{} {}", first, last),
                    role: Role::Student,
                    student_id: Some(student_id),
                    advisor_id: None,
                    department: Some("CENG".to_string()),
                },
                "password",
            )
            .await;
            self.add_student(Student {
                id: student_id,
                student_number: number.to_string(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                email,
                department: "CENG".to_string(),
                advisor_id: Some(2),
                gpa: 0.0,
                total_credits: 0,
            })
            .await;
            self.set_status(student_id, GraduationStatus::AwaitingTranscript)
                .await;
        }

        self
    }

    async fn simulate(&self) -> Result<()> {
        let (min, max) = self.latency;
        if !max.is_zero() {
            let millis = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        let mut state = self.state.lock().await;
        state.calls += 1;
        if state.pending_failures > 0 {
            state.pending_failures -= 1;
            tracing::debug!("🧪 Mock backend simulating a network failure");
            return Err(GradError::Network {
                message: "Failed to fetch".to_string(),
            });
        }
        Ok(())
    }

    fn evaluate(&self, student_id: i64, courses: &[Course]) -> Vec<EligibilityCheckResult> {
        let transcript = TranscriptData::from_courses(student_id, courses.to_vec());
        let failed = courses.iter().filter(|c| c.is_failed()).count();
        let checked_at = Utc::now();

        let checks = [
            (
                RequirementKind::Gpa,
                transcript.gpa >= self.rules.min_gpa,
                format!("{:.2}", transcript.gpa),
                format!("{:.2}", self.rules.min_gpa),
            ),
            (
                RequirementKind::TotalCredits,
                transcript.total_credits >= self.rules.min_credits,
                transcript.total_credits.to_string(),
                self.rules.min_credits.to_string(),
            ),
            (
                RequirementKind::NoFailedCourses,
                failed == 0,
                failed.to_string(),
                "0".to_string(),
            ),
        ];

        checks
            .into_iter()
            .enumerate()
            .map(
                |(index, (requirement, is_met, actual_value, required_value))| {
                    EligibilityCheckResult {
                        id: student_id * 10 + index as i64,
                        student_id,
                        requirement,
                        is_met,
                        actual_value,
                        required_value,
                        checked_at,
                    }
                },
            )
            .collect()
    }
}

#[async_trait]
impl AuthApi for MockApi {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        self.simulate().await?;
        let state = self.state.lock().await;
        let account = state
            .accounts
            .iter()
            .find(|a| {
                a.user.email.eq_ignore_ascii_case(&credentials.email)
                    && a.password == credentials.password
            })
            .ok_or_else(|| GradError::service(401, "Invalid email or password"))?;

        Ok(LoginResponse {
            token: format!("mock-token-{}", account.user.id),
            user: account.user.clone(),
        })
    }
}

#[async_trait]
impl StudentApi for MockApi {
    async fn list_students(&self) -> Result<Vec<Student>> {
        self.simulate().await?;
        Ok(self.state.lock().await.students.clone())
    }

    async fn get_student(&self, student_id: i64) -> Result<Student> {
        self.simulate().await?;
        let state = self.state.lock().await;
        state
            .students
            .iter()
            .find(|s| s.id == student_id)
            .cloned()
            .ok_or_else(|| GradError::not_found("Student", student_id))
    }

    async fn list_students_by_advisor(&self, advisor_id: i64) -> Result<Vec<Student>> {
        self.simulate().await?;
        let state = self.state.lock().await;
        Ok(state
            .students
            .iter()
            .filter(|s| s.advisor_id == Some(advisor_id))
            .cloned()
            .collect())
    }

    async fn list_courses(&self, student_id: i64) -> Result<Vec<Course>> {
        self.simulate().await?;
        let state = self.state.lock().await;
        state.student(student_id)?;
        Ok(state.courses.get(&student_id).cloned().unwrap_or_default())
    }

    async fn upload_transcript(&self, transcript: &TranscriptData) -> Result<GraduationProcess> {
        self.simulate().await?;
        let mut state = self.state.lock().await;
        let student_id = transcript.student_id;
        let advisor_id = state.student(student_id)?.advisor_id;

        let current = state
            .processes
            .iter()
            .find(|p| p.student_id == student_id)
            .map(|p| p.status);
        let resubmittable = [
            GraduationStatus::AwaitingTranscript.code(),
            GraduationStatus::AdvisorRejected.code(),
        ];
        if let Some(status) = current {
            if !resubmittable.contains(&status) {
                return Err(GradError::service(
                    409,
                    "Graduation process is already under review",
                ));
            }
        }

        state.courses.insert(student_id, transcript.courses.clone());
        if let Some(student) = state.students.iter_mut().find(|s| s.id == student_id) {
            student.gpa = transcript.gpa;
            student.total_credits = transcript.total_credits;
        }

        let now = Utc::now();
        let process = match state
            .processes
            .iter_mut()
            .find(|p| p.student_id == student_id)
        {
            Some(process) => {
                process.status = GraduationStatus::AdvisorPending.code();
                process.updated_at = now;
                process.clone()
            }
            None => {
                let id = state.next_id();
                let process = GraduationProcess {
                    id,
                    student_id,
                    status: GraduationStatus::AdvisorPending.code(),
                    last_comment: None,
                    updated_at: now,
                };
                state.processes.push(process.clone());
                process
            }
        };

        let advisors = state.user_ids_where(|u| u.role == Role::Advisor && u.advisor_id == advisor_id);
        for user_id in advisors {
            state.notify(
                user_id,
                "Transcript uploaded",
                format!("Student {} uploaded a transcript for review", student_id),
            );
        }

        Ok(process)
    }
}

#[async_trait]
impl ProcessApi for MockApi {
    async fn get_process_for_student(&self, student_id: i64) -> Result<Option<GraduationProcess>> {
        self.simulate().await?;
        let state = self.state.lock().await;
        Ok(state
            .processes
            .iter()
            .find(|p| p.student_id == student_id)
            .cloned())
    }

    async fn list_processes(&self, status: Option<i32>) -> Result<Vec<GraduationProcess>> {
        self.simulate().await?;
        let state = self.state.lock().await;
        Ok(state
            .processes
            .iter()
            .filter(|p| status.map_or(true, |code| p.status == code))
            .cloned()
            .collect())
    }

    async fn apply_action(
        &self,
        action: ProcessAction,
        request: &ActionRequest,
    ) -> Result<GraduationProcess> {
        self.simulate().await?;
        let mut state = self.state.lock().await;
        let process = state
            .processes
            .iter_mut()
            .find(|p| p.student_id == request.student_id)
            .ok_or_else(|| {
                GradError::service(
                    404,
                    format!("No graduation process for student {}", request.student_id),
                )
            })?;

        let next = action.apply(process.status).ok_or_else(|| {
            GradError::service(
                409,
                format!("{} is not allowed in status {}", action, process.status),
            )
        })?;

        process.status = next.code();
        process.last_comment = request.comment.clone();
        process.updated_at = Utc::now();
        let updated = process.clone();

        let student_users = state.user_ids_where(|u| u.student_id == Some(request.student_id));
        for user_id in student_users {
            state.notify(
                user_id,
                "Graduation status updated",
                format!("Your application is now: {}", next.label()),
            );
        }

        Ok(updated)
    }

    async fn eligibility_results(&self, student_id: i64) -> Result<Vec<EligibilityCheckResult>> {
        self.simulate().await?;
        let state = self.state.lock().await;
        Ok(state.eligibility.get(&student_id).cloned().unwrap_or_default())
    }

    async fn run_eligibility_check(&self, student_id: i64) -> Result<Vec<EligibilityCheckResult>> {
        self.simulate().await?;
        let mut state = self.state.lock().await;
        state.student(student_id)?;
        let courses = state.courses.get(&student_id).cloned().unwrap_or_default();
        let results = self.evaluate(student_id, &courses);
        state.eligibility.insert(student_id, results.clone());
        Ok(results)
    }

    async fn submit_manual_check(
        &self,
        request: &NewManualCheckRequest,
    ) -> Result<ManualCheckRequest> {
        self.simulate().await?;
        let mut state = self.state.lock().await;
        state.student(request.student_id)?;
        if request.reason.trim().is_empty() {
            return Err(GradError::service(400, "A reason is required"));
        }

        let id = state.next_id();
        let created = ManualCheckRequest {
            id,
            student_id: request.student_id,
            advisor_id: request.advisor_id,
            reason: request.reason.clone(),
            status: ManualCheckStatus::Pending,
            created_at: Utc::now(),
        };
        state.manual_checks.push(created.clone());

        let reviewers = state.user_ids_where(|u| u.role == Role::StudentAffairs);
        for user_id in reviewers {
            state.notify(
                user_id,
                "Manual check requested",
                format!("Manual eligibility review requested for student {}", request.student_id),
            );
        }
        Ok(created)
    }

    async fn list_manual_checks(&self) -> Result<Vec<ManualCheckRequest>> {
        self.simulate().await?;
        Ok(self.state.lock().await.manual_checks.clone())
    }
}

#[async_trait]
impl NotificationApi for MockApi {
    async fn notifications(&self, user_id: i64) -> Result<Vec<Notification>> {
        self.simulate().await?;
        let state = self.state.lock().await;
        let mut list: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn mark_notification_read(&self, notification_id: i64) -> Result<()> {
        self.simulate().await?;
        let mut state = self.state.lock().await;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(|| GradError::service(404, "Notification not found"))?;
        notification.is_read = true;
        Ok(())
    }
}

#[async_trait]
impl UserApi for MockApi {
    async fn list_users(&self) -> Result<Vec<AuthUser>> {
        self.simulate().await?;
        let state = self.state.lock().await;
        Ok(state.accounts.iter().map(|a| a.user.clone()).collect())
    }

    async fn create_user(&self, user: &NewUser) -> Result<AuthUser> {
        self.simulate().await?;
        let mut state = self.state.lock().await;
        if state
            .accounts
            .iter()
            .any(|a| a.user.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(GradError::service(409, "Email is already registered"));
        }

        let id = state.next_id();
        let created = AuthUser {
            id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            student_id: None,
            advisor_id: (user.role == Role::Advisor).then_some(id),
            department: user.department.clone(),
        };
        state.accounts.push(MockAccount {
            user: created.clone(),
            password: user.password.clone(),
        });
        Ok(created)
    }

    async fn update_user_role(&self, user_id: i64, role: Role) -> Result<AuthUser> {
        self.simulate().await?;
        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.user.id == user_id)
            .ok_or_else(|| GradError::service(404, "User not found"))?;
        account.user.role = role;
        Ok(account.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(code: &str, credits: u32, grade: &str) -> Course {
        Course {
            code: code.to_string(),
            name: code.to_string(),
            credits,
            grade: grade.to_string(),
            semester: Some("2025-Fall".to_string()),
        }
    }

    #[tokio::test]
    async fn test_login_with_sample_accounts() {
        let api = MockApi::new().with_sample_data().await;
        let response = api
            .login(&Credentials {
                email: "advisor@uni.edu".to_string(),
                password: "password".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.user.role, Role::Advisor);

        let err = api
            .login(&Credentials {
                email: "advisor@uni.edu".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_transition_rules_are_enforced() {
        let api = MockApi::new().with_sample_data().await;
        let request = ActionRequest {
            student_id: 100,
            comment: None,
        };

        // 尚未上傳成績單，顧問不能核准
        let err = api
            .apply_action(ProcessAction::AdvisorApprove, &request)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));

        let transcript = TranscriptData::from_courses(100, vec![course("CENG491", 8, "BA")]);
        let process = api.upload_transcript(&transcript).await.unwrap();
        assert_eq!(process.status, GraduationStatus::AdvisorPending.code());

        let process = api
            .apply_action(ProcessAction::AdvisorApprove, &request)
            .await
            .unwrap();
        assert_eq!(process.status, GraduationStatus::DepartmentPending.code());

        // 審核中不能重新上傳
        let err = api.upload_transcript(&transcript).await.unwrap_err();
        assert_eq!(err.status(), Some(409));

        let student_notifications = api.notifications(10).await.unwrap();
        assert_eq!(student_notifications.len(), 1);
        let advisor_notifications = api.notifications(2).await.unwrap();
        assert_eq!(advisor_notifications.len(), 1);
    }

    #[tokio::test]
    async fn test_eligibility_check_uses_rules() {
        let api = MockApi::new()
            .with_rules(EligibilityRules {
                min_gpa: 2.5,
                min_credits: 10,
            })
            .with_sample_data()
            .await;
        api.set_courses(
            101,
            vec![course("CENG101", 6, "BB"), course("MATH101", 6, "DD")],
        )
        .await;

        let results = api.run_eligibility_check(101).await.unwrap();
        assert_eq!(results.len(), 3);
        let by_kind: HashMap<RequirementKind, bool> =
            results.iter().map(|r| (r.requirement, r.is_met)).collect();
        // (18 + 6) / 12 = 2.0
        assert!(!by_kind[&RequirementKind::Gpa]);
        assert!(by_kind[&RequirementKind::TotalCredits]);
        assert!(by_kind[&RequirementKind::NoFailedCourses]);

        assert_eq!(api.eligibility_results(101).await.unwrap(), results);
    }

    #[tokio::test]
    async fn test_simulated_failures_are_transient() {
        use crate::utils::error::TransientError;

        let api = MockApi::new().with_sample_data().await;
        api.fail_next(2).await;
        assert!(api.list_students().await.unwrap_err().is_transient());
        assert!(api.list_students().await.unwrap_err().is_transient());
        assert_eq!(api.list_students().await.unwrap().len(), 2);
        assert_eq!(api.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicate_email() {
        let api = MockApi::new().with_sample_data().await;
        let new_user = NewUser {
            email: "ADVISOR@uni.edu".to_string(),
            full_name: "Copy".to_string(),
            password: "x".to_string(),
            role: Role::Advisor,
            department: None,
        };
        assert_eq!(api.create_user(&new_user).await.unwrap_err().status(), Some(409));
    }
}
