use crate::domain::status::GraduationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    #[serde(alias = "Student")]
    Student,
    #[serde(alias = "Advisor")]
    Advisor,
    #[serde(alias = "Secretary")]
    Secretary,
    #[serde(alias = "DeansOffice")]
    DeansOffice,
    #[serde(alias = "StudentAffairs")]
    StudentAffairs,
    #[serde(alias = "Admin")]
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Advisor => "advisor",
            Role::Secretary => "secretary",
            Role::DeansOffice => "deansOffice",
            Role::StudentAffairs => "studentAffairs",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "student" => Ok(Role::Student),
            "advisor" => Ok(Role::Advisor),
            "secretary" => Ok(Role::Secretary),
            "deansoffice" | "dean" => Ok(Role::DeansOffice),
            "studentaffairs" => Ok(Role::StudentAffairs),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub advisor_id: Option<i64>,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: AuthUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    #[serde(default)]
    pub advisor_id: Option<i64>,
    #[serde(default)]
    pub gpa: f64,
    #[serde(default)]
    pub total_credits: u32,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraduationProcess {
    pub id: i64,
    pub student_id: i64,
    /// 後端原始狀態碼，可能包含本端不認得的值
    pub status: i32,
    #[serde(default)]
    pub last_comment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl GraduationProcess {
    pub fn status(&self) -> Option<GraduationStatus> {
        GraduationStatus::from_code(self.status)
    }
}

/// 審核動作，名稱即為 `/GraduationProcesses/{Action}` 的路徑段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessAction {
    AdvisorApprove,
    AdvisorReject,
    DepartmentApprove,
    DepartmentReject,
    DeansOfficeApprove,
    DeansOfficeReject,
    StudentAffairsApprove,
    StudentAffairsReject,
    CompleteGraduation,
}

impl ProcessAction {
    pub fn path_segment(self) -> &'static str {
        match self {
            ProcessAction::AdvisorApprove => "AdvisorApprove",
            ProcessAction::AdvisorReject => "AdvisorReject",
            ProcessAction::DepartmentApprove => "DepartmentApprove",
            ProcessAction::DepartmentReject => "DepartmentReject",
            ProcessAction::DeansOfficeApprove => "DeansOfficeApprove",
            ProcessAction::DeansOfficeReject => "DeansOfficeReject",
            ProcessAction::StudentAffairsApprove => "StudentAffairsApprove",
            ProcessAction::StudentAffairsReject => "StudentAffairsReject",
            ProcessAction::CompleteGraduation => "CompleteGraduation",
        }
    }

    /// (允許的起始狀態, 結果狀態)
    pub fn transition(self) -> (GraduationStatus, GraduationStatus) {
        use GraduationStatus::*;
        match self {
            ProcessAction::AdvisorApprove => (AdvisorPending, DepartmentPending),
            ProcessAction::AdvisorReject => (AdvisorPending, AdvisorRejected),
            ProcessAction::DepartmentApprove => (DepartmentPending, DeansOfficePending),
            ProcessAction::DepartmentReject => (DepartmentPending, DepartmentRejected),
            ProcessAction::DeansOfficeApprove => (DeansOfficePending, StudentAffairsPending),
            ProcessAction::DeansOfficeReject => (DeansOfficePending, DeansOfficeRejected),
            ProcessAction::StudentAffairsApprove => {
                (StudentAffairsPending, StudentAffairsApproved)
            }
            ProcessAction::StudentAffairsReject => (StudentAffairsPending, StudentAffairsRejected),
            ProcessAction::CompleteGraduation => (StudentAffairsApproved, Graduated),
        }
    }

    /// 若目前狀態允許此動作，回傳新的狀態
    pub fn apply(self, current: i32) -> Option<GraduationStatus> {
        let (from, to) = self.transition();
        (from.code() == current).then_some(to)
    }

    pub fn role(self) -> Role {
        match self {
            ProcessAction::AdvisorApprove | ProcessAction::AdvisorReject => Role::Advisor,
            ProcessAction::DepartmentApprove | ProcessAction::DepartmentReject => Role::Secretary,
            ProcessAction::DeansOfficeApprove | ProcessAction::DeansOfficeReject => {
                Role::DeansOffice
            }
            ProcessAction::StudentAffairsApprove
            | ProcessAction::StudentAffairsReject
            | ProcessAction::CompleteGraduation => Role::StudentAffairs,
        }
    }

    pub fn is_rejection(self) -> bool {
        self.transition().1.is_rejected()
    }

    pub fn approve_for(role: Role) -> Option<Self> {
        match role {
            Role::Advisor => Some(ProcessAction::AdvisorApprove),
            Role::Secretary => Some(ProcessAction::DepartmentApprove),
            Role::DeansOffice => Some(ProcessAction::DeansOfficeApprove),
            Role::StudentAffairs => Some(ProcessAction::StudentAffairsApprove),
            Role::Student | Role::Admin => None,
        }
    }

    pub fn reject_for(role: Role) -> Option<Self> {
        match role {
            Role::Advisor => Some(ProcessAction::AdvisorReject),
            Role::Secretary => Some(ProcessAction::DepartmentReject),
            Role::DeansOffice => Some(ProcessAction::DeansOfficeReject),
            Role::StudentAffairs => Some(ProcessAction::StudentAffairsReject),
            Role::Student | Role::Admin => None,
        }
    }

    /// 目前關卡待審的核准或退回動作；非待審狀態回傳 None
    pub fn for_status(status: i32, approve: bool) -> Option<Self> {
        let role = match GraduationStatus::from_code(status)? {
            GraduationStatus::AdvisorPending => Role::Advisor,
            GraduationStatus::DepartmentPending => Role::Secretary,
            GraduationStatus::DeansOfficePending => Role::DeansOffice,
            GraduationStatus::StudentAffairsPending => Role::StudentAffairs,
            _ => return None,
        };
        if approve {
            Self::approve_for(role)
        } else {
            Self::reject_for(role)
        }
    }
}

impl fmt::Display for ProcessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub student_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub code: String,
    pub name: String,
    pub credits: u32,
    pub grade: String,
    #[serde(default)]
    pub semester: Option<String>,
}

impl Course {
    /// 四分制成績點數；未知等第（例如 P、W）不計入 GPA
    pub fn grade_points(&self) -> Option<f64> {
        let points = match self.grade.trim().to_ascii_uppercase().as_str() {
            "AA" => 4.0,
            "BA" => 3.5,
            "BB" => 3.0,
            "CB" => 2.5,
            "CC" => 2.0,
            "DC" => 1.5,
            "DD" => 1.0,
            "FD" => 0.5,
            "FF" => 0.0,
            _ => return None,
        };
        Some(points)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.grade_points(), Some(points) if points < 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptData {
    pub student_id: i64,
    pub courses: Vec<Course>,
    pub gpa: f64,
    pub total_credits: u32,
}

impl TranscriptData {
    /// 以學分加權計算 GPA，並只累計及格課程的學分
    pub fn from_courses(student_id: i64, courses: Vec<Course>) -> Self {
        let (weighted, graded_credits) = courses
            .iter()
            .filter_map(|c| c.grade_points().map(|p| (p * c.credits as f64, c.credits)))
            .fold((0.0, 0u32), |(sum, credits), (points, c)| {
                (sum + points, credits + c)
            });

        let gpa = if graded_credits == 0 {
            0.0
        } else {
            ((weighted / graded_credits as f64) * 100.0).round() / 100.0
        };

        let total_credits = courses
            .iter()
            .filter(|c| !c.is_failed())
            .map(|c| c.credits)
            .sum();

        Self {
            student_id,
            courses,
            gpa,
            total_credits,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequirementKind {
    Gpa,
    TotalCredits,
    NoFailedCourses,
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RequirementKind::Gpa => "GPA",
            RequirementKind::TotalCredits => "Total credits",
            RequirementKind::NoFailedCourses => "No failed courses",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityCheckResult {
    pub id: i64,
    pub student_id: i64,
    pub requirement: RequirementKind,
    pub is_met: bool,
    pub actual_value: String,
    pub required_value: String,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ManualCheckStatus {
    Pending,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewManualCheckRequest {
    pub student_id: i64,
    pub advisor_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualCheckRequest {
    pub id: i64,
    pub student_id: i64,
    pub advisor_id: i64,
    pub reason: String,
    pub status: ManualCheckStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}
