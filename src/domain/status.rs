//! 畢業流程狀態碼與進度條位置的對應
//!
//! 後端以整數表示申請目前所在的審核關卡；這裡把它轉成六個階段的
//! 進度條索引，以及每個階段的 `pending` / `approved` / `rejected` 標記。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 後端狀態碼
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum GraduationStatus {
    AwaitingTranscript = 0,
    AdvisorPending = 1,
    AdvisorRejected = 2,
    DepartmentPending = 3,
    DepartmentRejected = 4,
    DeansOfficePending = 5,
    DeansOfficeRejected = 6,
    StudentAffairsPending = 7,
    StudentAffairsRejected = 8,
    StudentAffairsApproved = 9,
    Graduated = 10,
}

impl GraduationStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        use GraduationStatus::*;
        let status = match code {
            0 => AwaitingTranscript,
            1 => AdvisorPending,
            2 => AdvisorRejected,
            3 => DepartmentPending,
            4 => DepartmentRejected,
            5 => DeansOfficePending,
            6 => DeansOfficeRejected,
            7 => StudentAffairsPending,
            8 => StudentAffairsRejected,
            9 => StudentAffairsApproved,
            10 => Graduated,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_rejected(self) -> bool {
        REJECTED_CODES.contains(&self.code())
    }

    pub fn label(self) -> &'static str {
        use GraduationStatus::*;
        match self {
            AwaitingTranscript => "Awaiting transcript",
            AdvisorPending => "Waiting for advisor review",
            AdvisorRejected => "Rejected by advisor",
            DepartmentPending => "Waiting for department approval",
            DepartmentRejected => "Rejected by department",
            DeansOfficePending => "Waiting for dean's office approval",
            DeansOfficeRejected => "Rejected by dean's office",
            StudentAffairsPending => "Waiting for student affairs",
            StudentAffairsRejected => "Rejected by student affairs",
            StudentAffairsApproved => "Approved by student affairs",
            Graduated => "Graduated",
        }
    }
}

impl TryFrom<i32> for GraduationStatus {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown graduation status code {}", code))
    }
}

impl From<GraduationStatus> for i32 {
    fn from(status: GraduationStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for GraduationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StepStatus::Pending => "pending",
            StepStatus::Approved => "approved",
            StepStatus::Rejected => "rejected",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub name: &'static str,
    pub codes: &'static [i32],
}

pub const STAGE_COUNT: usize = 6;

pub const GRADUATION_STAGES: [Stage; STAGE_COUNT] = [
    Stage {
        name: "Transcript Upload",
        codes: &[0],
    },
    Stage {
        name: "Advisor Review",
        codes: &[1, 2],
    },
    Stage {
        name: "Department",
        codes: &[3, 4],
    },
    Stage {
        name: "Dean's Office",
        codes: &[5, 6],
    },
    Stage {
        name: "Student Affairs",
        codes: &[7, 8, 9],
    },
    Stage {
        name: "Graduation",
        codes: &[10],
    },
];

const REJECTED_CODES: [i32; 4] = [2, 4, 6, 8];
const APPROVED_CODES: [i32; 2] = [9, 10];

/// 進度條狀態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraduationProgress {
    pub active_step: usize,
    pub step_statuses: [StepStatus; STAGE_COUNT],
}

impl GraduationProgress {
    /// 無流程或查詢失敗時使用的全 pending 進度
    pub fn not_started() -> Self {
        Self {
            active_step: 0,
            step_statuses: [StepStatus::Pending; STAGE_COUNT],
        }
    }

    pub fn stages(&self) -> impl Iterator<Item = (&'static str, StepStatus)> + '_ {
        GRADUATION_STAGES
            .iter()
            .zip(self.step_statuses.iter())
            .map(|(stage, status)| (stage.name, *status))
    }

    pub fn active_stage_name(&self) -> &'static str {
        GRADUATION_STAGES[self.active_step].name
    }
}

/// 將後端狀態碼轉為進度條位置；未知狀態碼回傳 [`GraduationProgress::not_started`]
pub fn map_status(code: i32) -> GraduationProgress {
    let Some(active_step) = GRADUATION_STAGES
        .iter()
        .position(|stage| stage.codes.contains(&code))
    else {
        return GraduationProgress::not_started();
    };

    let mut step_statuses = [StepStatus::Pending; STAGE_COUNT];
    // 假設流程只會前進，之前的階段一律視為通過
    for status in step_statuses.iter_mut().take(active_step) {
        *status = StepStatus::Approved;
    }
    step_statuses[active_step] = if REJECTED_CODES.contains(&code) {
        StepStatus::Rejected
    } else if APPROVED_CODES.contains(&code) {
        StepStatus::Approved
    } else {
        StepStatus::Pending
    };

    GraduationProgress {
        active_step,
        step_statuses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StepStatus::*;

    #[test]
    fn test_student_affairs_approved_maps_to_stage_four() {
        let progress = map_status(9);
        assert_eq!(progress.active_step, 4);
        assert_eq!(
            progress.step_statuses,
            [Approved, Approved, Approved, Approved, Approved, Pending]
        );
        assert_eq!(progress.active_stage_name(), "Student Affairs");
    }

    #[test]
    fn test_unknown_code_falls_back_to_not_started() {
        for code in [-1, 11, 42, i32::MAX] {
            assert_eq!(map_status(code), GraduationProgress::not_started());
        }
        assert_eq!(map_status(42).step_statuses, [Pending; STAGE_COUNT]);
    }

    #[test]
    fn test_rejection_marks_only_current_stage() {
        let progress = map_status(GraduationStatus::DeansOfficeRejected.code());
        assert_eq!(progress.active_step, 3);
        assert_eq!(
            progress.step_statuses,
            [Approved, Approved, Approved, Rejected, Pending, Pending]
        );
    }

    #[test]
    fn test_every_known_code_is_idempotent_and_monotonic() {
        for code in 0..=10 {
            let first = map_status(code);
            assert_eq!(first, map_status(code));
            assert!(first
                .step_statuses
                .iter()
                .take(first.active_step)
                .all(|s| *s == Approved));
            assert!(first
                .step_statuses
                .iter()
                .skip(first.active_step + 1)
                .all(|s| *s == Pending));
        }
    }

    #[test]
    fn test_graduated_completes_every_stage() {
        let progress = map_status(GraduationStatus::Graduated.code());
        assert_eq!(progress.active_step, 5);
        assert!(progress.step_statuses.iter().all(|s| *s == Approved));
    }

    #[test]
    fn test_status_codes_round_trip_through_serde() {
        let status: GraduationStatus = serde_json::from_str("7").unwrap();
        assert_eq!(status, GraduationStatus::StudentAffairsPending);
        assert!(serde_json::from_str::<GraduationStatus>("99").is_err());
        assert!(GraduationStatus::AdvisorRejected.is_rejected());
    }
}
