use crate::config::{AppConfig, ApiSource};
use crate::domain::model::Role;
use crate::utils::error::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "grad-manager")]
#[command(about = "Graduation workflow client for students and reviewers")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Backend to talk to (mock, test, development, production)
    #[arg(long, global = true)]
    pub api_source: Option<ApiSource>,

    /// Override the backend base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Account email
    #[arg(long, env = "GRAD_EMAIL", global = true)]
    pub email: Option<String>,

    /// Account password
    #[arg(long, env = "GRAD_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show the logged-in account
    Whoami,
    /// Show the six-stage graduation progress
    Progress {
        /// Student id (reviewers only; students see their own)
        #[arg(long)]
        student: Option<i64>,
    },
    /// List the courses on record
    Courses,
    /// Upload a transcript from a JSON array of courses
    UploadTranscript { file: String },
    /// Show stored eligibility results
    Eligibility {
        #[arg(long)]
        student: Option<i64>,
    },
    /// Run eligibility checks for advisees (all when no ids are given)
    CheckEligibility { students: Vec<i64> },
    /// List applications waiting for the current role
    Pending,
    /// Approve a student's application at the current stage
    Approve {
        student: i64,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Reject a student's application at the current stage
    Reject {
        student: i64,
        #[arg(long)]
        comment: String,
    },
    /// Mark an approved student as graduated
    Complete { student: i64 },
    /// Ask student affairs for a manual eligibility review
    ManualCheck {
        student: i64,
        #[arg(long)]
        reason: String,
    },
    /// List notifications
    Notifications {
        #[arg(long)]
        unread: bool,
    },
    /// Mark a notification (or all with --all) as read
    MarkRead {
        id: Option<i64>,
        #[arg(long)]
        all: bool,
    },
    /// Administer user accounts
    Users {
        #[command(subcommand)]
        action: Option<UserCommand>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum UserCommand {
    /// List accounts (default)
    List,
    /// Create an account
    Create {
        email: String,
        full_name: String,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        password: String,
        #[arg(long)]
        department: Option<String>,
    },
    /// Change an account's role
    SetRole { user_id: i64, role: Role },
}

impl CliConfig {
    /// 設定優先順序：預設值 < TOML < 環境變數 < 命令列
    pub fn load_app_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path);
                AppConfig::from_file(path)?
            }
            None => AppConfig::default(),
        };
        config.apply_env()?;
        self.apply_to(&mut config);
        Ok(config)
    }

    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(source) = self.api_source {
            config.api.source = source;
        }
        if let Some(base_url) = &self.base_url {
            config.api.base_url = Some(base_url.clone());
        }
    }
}
