use anyhow::Context;
use clap::Parser;
use grad_manager::app::{AdviseeSummary, PendingApplication};
use grad_manager::config::cli::UserCommand;
use grad_manager::domain::model::{
    AuthUser, Course, EligibilityCheckResult, GraduationProcess, NewUser, Role,
};
use grad_manager::utils::error::GradError;
use grad_manager::utils::{logger, validation::Validate};
use grad_manager::{CliConfig, Command, GradClient, GraduationProgress, GraduationStatus, StepStatus};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting grad-manager");

    let config = match cli.load_app_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
    tracing::debug!("Effective configuration: {:?}", config);

    let client = match GradClient::from_config(&config).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&cli, &client).await {
        let exit_code = match e.downcast_ref::<GradError>() {
            Some(grad_error) => {
                tracing::error!(
                    "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
                    grad_error,
                    grad_error.category(),
                    grad_error.severity()
                );
                eprintln!("❌ {}", grad_error.user_friendly_message());
                eprintln!("💡 建議: {}", grad_error.recovery_suggestion());

                // 根據錯誤嚴重程度決定退出碼
                grad_error.severity().exit_code()
            }
            None => {
                eprintln!("❌ {:#}", e);
                1
            }
        };

        std::process::exit(exit_code);
    }
}

async fn run(cli: &CliConfig, client: &GradClient) -> anyhow::Result<()> {
    let email = cli
        .email
        .as_deref()
        .ok_or_else(|| GradError::MissingConfigError {
            field: "--email (or GRAD_EMAIL)".to_string(),
        })?;
    let password = cli
        .password
        .as_deref()
        .ok_or_else(|| GradError::MissingConfigError {
            field: "--password (or GRAD_PASSWORD)".to_string(),
        })?;
    let user = client.login(email, password).await?;

    match &cli.command {
        Command::Whoami => print_user(&user),
        Command::Progress { student } => {
            let student_id = student
                .or(user.student_id)
                .context("--student is required for staff accounts")?;
            let progress = client.progress_of(student_id).await?;
            print_progress(student_id, &progress);
        }
        Command::Courses => {
            let courses = client.student()?.courses().await?;
            if courses.is_empty() {
                println!("📭 No courses on record");
            }
            for course in &courses {
                println!(
                    "  {:<10} {:<40} {:>3} cr  {}",
                    course.code, course.name, course.credits, course.grade
                );
            }
        }
        Command::UploadTranscript { file } => {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read transcript file '{}'", file))?;
            let courses: Vec<Course> = serde_json::from_str(&content)
                .with_context(|| format!("'{}' is not a JSON array of courses", file))?;
            let process = client.student()?.upload_transcript(courses).await?;
            println!("✅ Transcript uploaded");
            println!("📍 Status: {}", describe_status(process.status));
        }
        Command::Eligibility { student } => {
            let student_id = student
                .or(user.student_id)
                .context("--student is required for staff accounts")?;
            let results = client.eligibility_of(student_id).await?;
            print_eligibility(&results);
        }
        Command::CheckEligibility { students } => {
            let desk = client.advisor()?;
            let outcomes = if students.is_empty() {
                desk.check_all_advisees().await?
            } else {
                desk.run_eligibility_checks(students.clone()).await
            };
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(results) => {
                        let met = results.iter().filter(|r| r.is_met).count();
                        let icon = if met == results.len() { "✅" } else { "⚠️" };
                        println!(
                            "{} Student {}: {}/{} requirements met",
                            icon,
                            outcome.item,
                            met,
                            results.len()
                        );
                    }
                    Err(e) => println!(
                        "❌ Student {}: {}",
                        outcome.item,
                        e.user_friendly_message()
                    ),
                }
            }
        }
        Command::Pending => match user.role {
            Role::Advisor => print_advisees(&client.advisor()?.pending_reviews().await?),
            Role::Secretary => print_applications(&client.secretary()?.pending().await?),
            Role::DeansOffice => print_applications(&client.deans_office()?.pending().await?),
            Role::StudentAffairs => {
                let desk = client.student_affairs()?;
                print_applications(&desk.pending().await?);
                let ready = desk.ready_to_graduate().await?;
                if !ready.is_empty() {
                    println!("🎓 Ready to graduate:");
                    print_applications(&ready);
                }
            }
            Role::Admin => {
                let desk = client.admin()?;
                let students = desk.students().await?;
                let applications: Vec<PendingApplication> = desk
                    .processes(None)
                    .await?
                    .into_iter()
                    .filter(|p| p.status != GraduationStatus::Graduated.code())
                    .map(|process| PendingApplication {
                        student: students.iter().find(|s| s.id == process.student_id).cloned(),
                        process,
                    })
                    .collect();
                print_applications(&applications);
            }
            Role::Student => anyhow::bail!("'pending' is only available to staff accounts"),
        },
        Command::Approve { student, comment } => {
            let process = approve(client, user.role, *student, comment.clone()).await?;
            println!("✅ Approved student {}", student);
            println!("📍 Status: {}", describe_status(process.status));
        }
        Command::Reject { student, comment } => {
            let process = reject(client, user.role, *student, comment).await?;
            println!("🚫 Rejected student {}", student);
            println!("📍 Status: {}", describe_status(process.status));
        }
        Command::Complete { student } => {
            let process = client.student_affairs()?.complete_graduation(*student).await?;
            println!("🎓 Student {} graduated", student);
            println!("📍 Status: {}", describe_status(process.status));
        }
        Command::ManualCheck { student, reason } => {
            let request = client
                .advisor()?
                .request_manual_check(*student, reason)
                .await?;
            println!("📝 Manual check #{} submitted", request.id);
        }
        Command::Notifications { unread } => {
            let notifications = if *unread {
                client.unread_notifications().await?
            } else {
                client.notifications().await?
            };
            if notifications.is_empty() {
                println!("📭 No notifications");
            }
            for n in &notifications {
                let marker = if n.is_read { " " } else { "•" };
                println!(
                    "{} #{} [{}] {}: {}",
                    marker,
                    n.id,
                    n.created_at.format("%Y-%m-%d %H:%M"),
                    n.title,
                    n.message
                );
            }
        }
        Command::MarkRead { id, all } => match (id, all) {
            (_, true) => {
                let count = client.mark_all_notifications_read().await?;
                println!("✅ Marked {} notifications as read", count);
            }
            (Some(id), false) => {
                client.mark_notification_read(*id).await?;
                println!("✅ Notification #{} marked as read", id);
            }
            (None, false) => anyhow::bail!("Give a notification id or --all"),
        },
        Command::Users { action } => {
            let desk = client.admin()?;
            match action.clone().unwrap_or(UserCommand::List) {
                UserCommand::List => {
                    for account in desk.users().await? {
                        println!(
                            "  #{:<4} {:<30} {:<16} {}",
                            account.id, account.email, account.role, account.full_name
                        );
                    }
                }
                UserCommand::Create {
                    email,
                    full_name,
                    role,
                    password,
                    department,
                } => {
                    let created = desk
                        .create_user(&NewUser {
                            email,
                            full_name,
                            password,
                            role,
                            department,
                        })
                        .await?;
                    println!("👤 Created account #{} ({})", created.id, created.role);
                }
                UserCommand::SetRole { user_id, role } => {
                    let updated = desk.update_user_role(user_id, role).await?;
                    println!("👤 {} is now {}", updated.email, updated.role);
                }
            }
        }
    }

    client.logout();
    Ok(())
}

async fn approve(
    client: &GradClient,
    role: Role,
    student_id: i64,
    comment: Option<String>,
) -> grad_manager::Result<GraduationProcess> {
    match role {
        Role::Advisor => client.advisor()?.approve(student_id, comment).await,
        Role::Secretary => client.secretary()?.approve(student_id, comment).await,
        Role::DeansOffice => client.deans_office()?.approve(student_id, comment).await,
        Role::StudentAffairs => client.student_affairs()?.approve(student_id, comment).await,
        Role::Admin => client.admin()?.approve(student_id, comment).await,
        Role::Student => Err(GradError::Forbidden {
            role: role.to_string(),
            action: "approve applications".to_string(),
        }),
    }
}

async fn reject(
    client: &GradClient,
    role: Role,
    student_id: i64,
    comment: &str,
) -> grad_manager::Result<GraduationProcess> {
    match role {
        Role::Advisor => client.advisor()?.reject(student_id, comment).await,
        Role::Secretary => client.secretary()?.reject(student_id, comment).await,
        Role::DeansOffice => client.deans_office()?.reject(student_id, comment).await,
        Role::StudentAffairs => client.student_affairs()?.reject(student_id, comment).await,
        Role::Admin => client.admin()?.reject(student_id, comment).await,
        Role::Student => Err(GradError::Forbidden {
            role: role.to_string(),
            action: "reject applications".to_string(),
        }),
    }
}

fn describe_status(code: i32) -> String {
    GraduationStatus::from_code(code)
        .map(|status| status.to_string())
        .unwrap_or_else(|| format!("Unknown status ({})", code))
}

fn print_user(user: &AuthUser) {
    println!("👤 {} <{}>", user.full_name, user.email);
    println!("   Role: {}", user.role);
    if let Some(department) = &user.department {
        println!("   Department: {}", department);
    }
    if let Some(student_id) = user.student_id {
        println!("   Student id: {}", student_id);
    }
}

fn print_progress(student_id: i64, progress: &GraduationProgress) {
    println!("🎓 Graduation progress for student {}", student_id);
    for (index, (name, status)) in progress.stages().enumerate() {
        let icon = match status {
            StepStatus::Approved => "✅",
            StepStatus::Rejected => "❌",
            StepStatus::Pending => "⏳",
        };
        let marker = if index == progress.active_step {
            "  ◀ current"
        } else {
            ""
        };
        println!("  {} {}. {}{}", icon, index + 1, name, marker);
    }
}

fn print_eligibility(results: &[EligibilityCheckResult]) {
    if results.is_empty() {
        println!("📭 No eligibility results yet");
        return;
    }
    for result in results {
        let icon = if result.is_met { "✅" } else { "❌" };
        println!(
            "  {} {:<20} {} (required {})",
            icon,
            result.requirement.to_string(),
            result.actual_value,
            result.required_value
        );
    }
}

fn print_applications(applications: &[PendingApplication]) {
    if applications.is_empty() {
        println!("📭 Nothing waiting for review");
        return;
    }
    for app in applications {
        let name = app
            .student
            .as_ref()
            .map(|s| format!("{} ({})", s.full_name(), s.student_number))
            .unwrap_or_else(|| format!("student {}", app.process.student_id));
        println!(
            "  #{:<5} {:<36} {}",
            app.process.student_id,
            name,
            describe_status(app.process.status)
        );
    }
}

fn print_advisees(advisees: &[AdviseeSummary]) {
    if advisees.is_empty() {
        println!("📭 Nothing waiting for review");
        return;
    }
    for advisee in advisees {
        println!(
            "  #{:<5} {:<36} GPA {:.2}, {} credits, {}",
            advisee.student.id,
            advisee.student.full_name(),
            advisee.student.gpa,
            advisee.student.total_credits,
            advisee.progress().active_stage_name()
        );
    }
}
