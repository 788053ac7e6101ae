use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use nextstep::api::{JobBoardApi, connect};
use nextstep::config::{Backend, Config};
use nextstep::enrich::{NO_COMPANY, deadline_text};
use nextstep::models::{
    AccountKind, Author, Credentials, EmployerPatch, FeedbackUpdate, JobPatch, NewComment,
    NewEmployer, NewJob, NewPost, NewStudent, PostPatch, Role, StudentPatch, Subject,
};
use nextstep::query::{ApplicationFilter, JobFilter, PostQuery, SortKey};
use nextstep::session::Session;
use nextstep::status::{ApplicationStatus, JobStatus, VerificationStatus};

#[derive(Parser)]
#[command(name = "nextstep")]
#[command(about = "Campus job board - postings, applications, verifications and forum")]
struct Cli {
    /// Data backend (mock, http)
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Base URL of the REST backend
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and remember the session
    Login {
        /// Account email
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },

    /// Forget the saved session
    Logout,

    /// Show the logged-in account
    Whoami,

    /// Create an account
    Register {
        #[command(subcommand)]
        command: RegisterCommands,
    },

    /// Browse and manage job postings
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Job applications
    Apps {
        #[command(subcommand)]
        command: AppCommands,
    },

    /// A student's saved jobs
    Saved {
        #[command(subcommand)]
        command: SavedCommands,
    },

    /// Account verification queue
    Verify {
        #[command(subcommand)]
        command: VerifyCommands,
    },

    /// Community forum
    Forum {
        #[command(subcommand)]
        command: ForumCommands,
    },

    /// Your profile and the employer directory
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(Subcommand)]
enum RegisterCommands {
    /// Register a student account
    Student {
        /// University id (letters and digits, up to 8)
        ucid: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        #[arg(long, default_value = "")]
        phone: String,

        #[arg(long, default_value = "")]
        major: String,

        #[arg(long)]
        graduation_year: Option<i32>,
    },

    /// Register an employer account
    Employer {
        /// Company name
        company_name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        #[arg(short, long)]
        industry: Option<String>,

        #[arg(short, long)]
        website: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// List job postings
    List {
        /// Title keyword
        #[arg(short, long)]
        keyword: Option<String>,

        /// Location substring
        #[arg(short, long)]
        location: Option<String>,

        /// Employer id
        #[arg(short, long)]
        employer: Option<i64>,

        #[arg(long)]
        min_salary: Option<f64>,

        #[arg(long)]
        max_salary: Option<f64>,

        /// Employer industry
        #[arg(short, long)]
        industry: Option<String>,

        /// Filter by status (pending, active, rejected, closed)
        #[arg(short, long)]
        status: Option<JobStatus>,
    },

    /// Show job details
    Show {
        /// Job ID
        id: i64,
    },

    /// Post a new job (employers); it waits for moderator approval
    Create {
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(short, long, default_value = "")]
        location: String,

        #[arg(short, long, default_value = "0")]
        salary: f64,

        /// Application deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<NaiveDate>,

        #[arg(long)]
        requirements: Option<String>,

        #[arg(long)]
        responsibilities: Option<String>,

        #[arg(long)]
        benefits: Option<String>,
    },

    /// Edit one of your postings (employers)
    Update {
        /// Job ID
        id: i64,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        salary: Option<f64>,

        #[arg(long)]
        deadline: Option<NaiveDate>,

        #[arg(long)]
        requirements: Option<String>,

        #[arg(long)]
        responsibilities: Option<String>,

        #[arg(long)]
        benefits: Option<String>,
    },

    /// Delete one of your postings (employers)
    Delete {
        /// Job ID
        id: i64,
    },

    /// Stop accepting applications (employers)
    Close {
        /// Job ID
        id: i64,
    },

    /// Your company's postings (employers)
    Mine,

    /// Postings awaiting review (moderators)
    Pending,

    /// Publish a pending posting (moderators)
    Approve {
        /// Job ID
        id: i64,
    },

    /// Reject a pending posting (moderators)
    Reject {
        /// Job ID
        id: i64,

        /// Reason shown to the employer
        #[arg(short, long)]
        feedback: String,
    },
}

#[derive(Subcommand)]
enum AppCommands {
    /// Your applications (students) or your company's (employers)
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<ApplicationStatus>,

        /// Filter by job
        #[arg(short, long)]
        job: Option<i64>,
    },

    /// Show one application
    Show {
        /// Application ID
        id: i64,
    },

    /// Apply for a job (students)
    Apply {
        /// Job ID
        job_id: i64,
    },

    /// Move an application to a new status (employers)
    Status {
        /// Application ID
        id: i64,

        /// submitted, under-review, interview-scheduled, offer-extended, rejected
        status: ApplicationStatus,

        #[arg(short, long)]
        feedback: Option<String>,
    },

    /// Leave feedback on an application (employers)
    Feedback {
        /// Application ID
        id: i64,

        feedback: String,

        /// Also change the status
        #[arg(short, long)]
        status: Option<ApplicationStatus>,
    },
}

#[derive(Subcommand)]
enum SavedCommands {
    /// List saved jobs
    List,

    /// Save a job
    Add {
        /// Job ID
        job_id: i64,
    },

    /// Remove a saved job
    Remove {
        /// Job ID
        job_id: i64,
    },

    /// Check whether a job is saved
    Check {
        /// Job ID
        job_id: i64,
    },
}

#[derive(Subcommand)]
enum VerifyCommands {
    /// List verification requests (moderators)
    List {
        /// student or employer
        #[arg(short, long)]
        kind: Option<String>,

        /// Filter by status (pending, approved, rejected)
        #[arg(short, long)]
        status: Option<VerificationStatus>,
    },

    /// Verification status of your account, or of any account (moderators)
    Status {
        /// student or employer
        kind: Option<String>,

        /// UCID or employer id
        id: Option<String>,
    },

    /// Approve an account (moderators)
    Approve {
        /// student or employer
        kind: String,

        /// UCID or employer id
        id: String,
    },

    /// Reject an account (moderators)
    Reject {
        /// student or employer
        kind: String,

        /// UCID or employer id
        id: String,

        /// Reason shown to the account holder
        #[arg(short, long)]
        feedback: String,
    },
}

#[derive(Subcommand)]
enum ForumCommands {
    /// List posts
    List {
        /// Match title, content or author name
        #[arg(short, long)]
        keyword: Option<String>,

        /// recent or popular
        #[arg(short, long, default_value = "recent")]
        sort: String,

        /// Page number (5 posts per page)
        #[arg(short, long)]
        page: Option<usize>,

        /// Only your own posts
        #[arg(long)]
        mine: bool,
    },

    /// Show a post and its comments
    Show {
        /// Post ID
        id: i64,
    },

    /// Write a post
    Post {
        title: String,
        content: String,
    },

    /// Edit your post
    Edit {
        /// Post ID
        id: i64,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        content: Option<String>,
    },

    /// Upvote a post
    Upvote {
        /// Post ID
        id: i64,
    },

    /// Delete your post (moderators may delete any)
    Delete {
        /// Post ID
        id: i64,
    },

    /// Comment on a post
    Comment {
        /// Post ID
        post_id: i64,

        content: String,
    },

    /// Delete a comment (moderators)
    DeleteComment {
        /// Comment ID
        id: i64,
    },

    /// Community score for yourself or another member
    Score {
        /// Student UCID
        #[arg(long, conflicts_with_all = ["employer", "moderator"])]
        student: Option<String>,

        #[arg(long, conflicts_with = "moderator")]
        employer: Option<i64>,

        #[arg(long)]
        moderator: Option<i64>,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show your profile
    Show,

    /// Update your profile; only the given fields change
    Update {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        major: Option<String>,

        #[arg(long)]
        graduation_year: Option<i32>,

        #[arg(long)]
        company_name: Option<String>,

        #[arg(long)]
        industry: Option<String>,

        #[arg(long)]
        website: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// List employers
    Employers,
}

impl Commands {
    /// Whether the mock store should be written back afterwards.
    fn mutates(&self) -> bool {
        match self {
            Commands::Login { .. } | Commands::Logout | Commands::Whoami => false,
            Commands::Register { .. } => true,
            Commands::Jobs { command } => !matches!(
                command,
                JobCommands::List { .. } | JobCommands::Show { .. } | JobCommands::Mine | JobCommands::Pending
            ),
            Commands::Apps { command } => !matches!(command, AppCommands::List { .. } | AppCommands::Show { .. }),
            Commands::Saved { command } => !matches!(command, SavedCommands::List | SavedCommands::Check { .. }),
            Commands::Verify { command } => {
                !matches!(command, VerifyCommands::List { .. } | VerifyCommands::Status { .. })
            }
            Commands::Forum { command } => !matches!(
                command,
                ForumCommands::List { .. } | ForumCommands::Show { .. } | ForumCommands::Score { .. }
            ),
            Commands::Profile { command } => matches!(command, ProfileCommands::Update { .. }),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "nextstep=debug" } else { "nextstep=warn" };
    let env_filter = EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()
        .context("Failed to load configuration")?
        .with_overrides(cli.backend, cli.api_url);
    let session_path = config.session_path();
    let session = Session::load(&session_path)
        .with_context(|| format!("Failed to read session from {}", session_path.display()))?;

    let api = connect(&config, session.as_ref().map(|s| s.token.clone()))
        .context("Failed to set up backend")?;
    let mutates = cli.command.mutates();

    match cli.command {
        Commands::Login { email, password } => {
            let credentials = Credentials { email, password };
            let login = api.login(&credentials).await?.into_data();
            let session = Session::from_login(&login);
            session
                .save(&session_path)
                .with_context(|| format!("Failed to save session to {}", session_path.display()))?;
            println!("Logged in as {} ({}).", session.display_name, session.role());
        }

        Commands::Logout => {
            if Session::clear(&session_path)? {
                println!("Logged out.");
            } else {
                println!("Not logged in.");
            }
        }

        Commands::Whoami => {
            let session = require_session(session)?;
            println!("{} <{}>", session.display_name, session.email);
            println!("Role: {}", session.role());
            println!("Backend: {:?}", api.backend());
            let subject = match session.role() {
                Role::Student => Some(Subject::Student(session.ucid()?.to_string())),
                Role::Employer => Some(Subject::Employer(session.employer_id()?)),
                Role::Moderator => None,
            };
            if let Some(subject) = subject {
                let check = api.check_verification_status(&subject).await?.into_data();
                println!("Verification: {}", check.status);
                if !check.feedback.is_empty() {
                    println!("Feedback: {}", check.feedback);
                }
            }
        }

        Commands::Register { command } => register(api.as_ref(), command).await?,
        Commands::Jobs { command } => jobs(api.as_ref(), session, command).await?,
        Commands::Apps { command } => apps(api.as_ref(), require_session(session)?, command).await?,
        Commands::Saved { command } => saved(api.as_ref(), require_session(session)?, command).await?,
        Commands::Verify { command } => verify(api.as_ref(), require_session(session)?, command).await?,
        Commands::Forum { command } => forum(api.as_ref(), session, command).await?,
        Commands::Profile { command } => profile(api.as_ref(), session, command).await?,
    }

    if mutates {
        api.persist().await.context("Failed to save mock store")?;
    }

    Ok(())
}

fn require_session(session: Option<Session>) -> Result<Session> {
    session.ok_or_else(|| anyhow!("Not logged in. Run `nextstep login <email> -p <password>` first."))
}

fn parse_kind(kind: &str) -> Result<AccountKind> {
    match kind.trim().to_lowercase().as_str() {
        "student" | "students" => Ok(AccountKind::Student),
        "employer" | "employers" => Ok(AccountKind::Employer),
        other => bail!("Unknown account kind '{}'. Use student or employer", other),
    }
}

fn parse_subject(kind: &str, id: &str) -> Result<Subject> {
    let kind = parse_kind(kind)?;
    Subject::parse(kind, id).ok_or_else(|| anyhow!("Invalid {} id '{}'", kind, id))
}

// --- Register ---

async fn register(api: &dyn JobBoardApi, command: RegisterCommands) -> Result<()> {
    match command {
        RegisterCommands::Student {
            ucid,
            first_name,
            last_name,
            email,
            password,
            phone,
            major,
            graduation_year,
        } => {
            let student = api
                .register_student(NewStudent {
                    ucid,
                    first_name,
                    last_name,
                    email,
                    phone,
                    major,
                    graduation_year,
                    password,
                })
                .await?
                .into_data();
            println!("Registered student {} ({}).", student.full_name(), student.ucid);
            println!("Your account is awaiting verification by a moderator.");
        }

        RegisterCommands::Employer {
            company_name,
            email,
            password,
            industry,
            website,
            location,
            description,
        } => {
            let employer = api
                .register_employer(NewEmployer {
                    company_name,
                    email,
                    industry,
                    website,
                    location,
                    description,
                    password,
                })
                .await?
                .into_data();
            println!(
                "Registered employer '{}' (ID: {}).",
                employer.company_name, employer.employer_id
            );
            println!("Your account is awaiting verification by a moderator.");
        }
    }
    Ok(())
}

// --- Jobs ---

async fn jobs(api: &dyn JobBoardApi, session: Option<Session>, command: JobCommands) -> Result<()> {
    match command {
        JobCommands::List {
            keyword,
            location,
            employer,
            min_salary,
            max_salary,
            industry,
            status,
        } => {
            let filter = JobFilter {
                employer_id: employer,
                status,
                keyword,
                location,
                min_salary,
                max_salary,
                industry,
            };
            let list = api.get_jobs(&filter).await?.into_data();
            print_jobs(api, &list).await?;
        }

        JobCommands::Show { id } => {
            let job = api.get_job(id).await?.into_data();
            let company = api
                .get_employer(job.employer_id)
                .await
                .map(|r| r.into_data().company_name)
                .unwrap_or_else(|_| NO_COMPANY.to_string());
            println!("Job #{}", job.job_id);
            println!("Title: {}", job.title);
            println!("Company: {}", company);
            println!("Status: {}", job.status);
            if !job.location.is_empty() {
                println!("Location: {}", job.location);
            }
            println!("Salary: {}", money(job.salary));
            println!("Deadline: {}", deadline_text(job.deadline));
            if let Some(posted) = job.date_posted {
                println!("Posted: {}", posted);
            }
            if let Some(feedback) = &job.feedback {
                println!("Moderator feedback: {}", feedback);
            }
            for (heading, text) in [
                ("Description", Some(&job.description)),
                ("Requirements", job.requirements.as_ref()),
                ("Responsibilities", job.responsibilities.as_ref()),
                ("Benefits", job.benefits.as_ref()),
            ] {
                if let Some(text) = text.filter(|t| !t.is_empty()) {
                    println!("\n--- {} ---", heading);
                    println!("{}", textwrap::fill(text, 78));
                }
            }
        }

        JobCommands::Create {
            title,
            description,
            location,
            salary,
            deadline,
            requirements,
            responsibilities,
            benefits,
        } => {
            let employer_id = require_session(session)?.employer_id()?;
            let job = api
                .create_job(NewJob {
                    employer_id,
                    title,
                    description,
                    location,
                    salary,
                    deadline,
                    requirements,
                    responsibilities,
                    benefits,
                })
                .await?
                .into_data();
            println!("Created job #{} '{}' (status: {}).", job.job_id, job.title, job.status);
        }

        JobCommands::Update {
            id,
            title,
            description,
            location,
            salary,
            deadline,
            requirements,
            responsibilities,
            benefits,
        } => {
            let employer_id = require_session(session)?.employer_id()?;
            require_own_job(api, id, employer_id).await?;
            let patch = JobPatch {
                title,
                description,
                location,
                salary,
                deadline,
                requirements,
                responsibilities,
                benefits,
            };
            let job = api.update_job(id, patch).await?.into_data();
            println!("Updated job #{} '{}'.", job.job_id, job.title);
        }

        JobCommands::Delete { id } => {
            let employer_id = require_session(session)?.employer_id()?;
            require_own_job(api, id, employer_id).await?;
            if api.delete_job(id).await?.into_data().existed {
                println!("Deleted job #{}.", id);
            } else {
                println!("Job #{} not found.", id);
            }
        }

        JobCommands::Close { id } => {
            let employer_id = require_session(session)?.employer_id()?;
            require_own_job(api, id, employer_id).await?;
            let job = api.close_job(id).await?.into_data();
            println!("Closed job #{} '{}'.", job.job_id, job.title);
        }

        JobCommands::Mine => {
            let employer_id = require_session(session)?.employer_id()?;
            let list = api.get_company_jobs(employer_id).await?.into_data();
            print_jobs(api, &list).await?;
        }

        JobCommands::Pending => {
            require_session(session)?.require(Role::Moderator)?;
            let list = api.get_pending_jobs().await?.into_data();
            print_jobs(api, &list).await?;
        }

        JobCommands::Approve { id } => {
            require_session(session)?.require(Role::Moderator)?;
            let job = api.approve_job(id).await?.into_data();
            println!("Approved job #{} '{}'; it is now {}.", job.job_id, job.title, job.status);
        }

        JobCommands::Reject { id, feedback } => {
            require_session(session)?.require(Role::Moderator)?;
            let job = api.reject_job(id, &feedback).await?.into_data();
            println!("Rejected job #{} '{}'.", job.job_id, job.title);
        }
    }
    Ok(())
}

async fn require_own_job(api: &dyn JobBoardApi, job_id: i64, employer_id: i64) -> Result<()> {
    let job = api.get_job(job_id).await?.into_data();
    if job.employer_id != employer_id {
        bail!("Job #{} belongs to another employer", job_id);
    }
    Ok(())
}

async fn print_jobs(api: &dyn JobBoardApi, list: &[nextstep::models::Job]) -> Result<()> {
    if list.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }
    let companies: HashMap<i64, String> = api
        .get_employers()
        .await?
        .into_data()
        .into_iter()
        .map(|e| (e.employer_id, e.company_name))
        .collect();

    println!(
        "{:<6} {:<9} {:<30} {:<24} {:>10} {:<12}",
        "ID", "STATUS", "TITLE", "COMPANY", "SALARY", "DEADLINE"
    );
    println!("{}", "-".repeat(96));
    for job in list {
        let company = companies.get(&job.employer_id).map(String::as_str).unwrap_or(NO_COMPANY);
        println!(
            "{:<6} {:<9} {:<30} {:<24} {:>10} {:<12}",
            job.job_id,
            job.status,
            truncate(&job.title, 28),
            truncate(company, 22),
            money(job.salary),
            job.deadline.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

// --- Applications ---

async fn apps(api: &dyn JobBoardApi, session: Session, command: AppCommands) -> Result<()> {
    match command {
        AppCommands::List { status, job } => {
            let mut filter = match session.role() {
                Role::Student => ApplicationFilter::by_applicant(session.ucid()?),
                Role::Employer => ApplicationFilter::by_employer(session.employer_id()?),
                Role::Moderator => ApplicationFilter::default(),
            };
            filter.status = status;
            filter.job_id = job;
            let list = api.get_applications(&filter).await?.into_data();
            if list.is_empty() {
                println!("No applications found.");
                return Ok(());
            }
            println!(
                "{:<6} {:<20} {:<26} {:<22} {:<18} {:<10}",
                "ID", "STATUS", "JOB", "COMPANY", "STUDENT", "APPLIED"
            );
            println!("{}", "-".repeat(107));
            for view in list {
                println!(
                    "{:<6} {:<20} {:<26} {:<22} {:<18} {:<10}",
                    view.application.application_id,
                    view.application.status,
                    truncate(&view.job_title, 24),
                    truncate(&view.company_name, 20),
                    truncate(&view.student_name, 16),
                    date_or_dash(view.application.date_applied)
                );
            }
        }

        AppCommands::Show { id } => {
            let detail = api.get_application_detail(id).await?.into_data();
            let app = &detail.application;
            let allowed = match session.role() {
                Role::Student => app.applicant_ucid == session.ucid()?,
                Role::Employer => app.employer_id == session.employer_id()?,
                Role::Moderator => true,
            };
            if !allowed {
                bail!("Application #{} is not yours to view", id);
            }
            println!("Application #{}", app.application_id);
            println!("Status: {}", app.status);
            println!("Applied: {}", date_or_dash(app.date_applied));
            println!("Student: {} ({})", detail.student_name, app.applicant_ucid);
            if let Some(student) = &detail.student {
                println!("Email: {}", student.email);
                if !student.major.is_empty() {
                    println!("Major: {}", student.major);
                }
            }
            println!("\nJob #{}: {}", detail.job.job_id, detail.job.title);
            println!("Company: {}", detail.company_name);
            println!("Industry: {}", detail.job.industry);
            println!("Salary: {}", money(detail.job.salary));
            println!("Deadline: {}", detail.job.deadline);
            if let Some(feedback) = &app.feedback {
                println!("\n--- Feedback ---\n{}", textwrap::fill(feedback, 78));
            }
        }

        AppCommands::Apply { job_id } => {
            let ucid = session.ucid()?;
            let app = api.apply_for_job(ucid, job_id).await?.into_data();
            println!("Applied for job #{} (application #{}).", job_id, app.application_id);
        }

        AppCommands::Status { id, status, feedback } => {
            session.require(Role::Employer)?;
            require_own_application(api, &session, id).await?;
            let app = api.update_application_status(id, status, feedback).await?.into_data();
            println!("Application #{} is now {}.", app.application_id, app.status);
        }

        AppCommands::Feedback { id, feedback, status } => {
            session.require(Role::Employer)?;
            require_own_application(api, &session, id).await?;
            let app = api
                .update_application_feedback(id, FeedbackUpdate { feedback, status })
                .await?
                .into_data();
            println!("Saved feedback on application #{} ({}).", app.application_id, app.status);
        }
    }
    Ok(())
}

async fn require_own_application(api: &dyn JobBoardApi, session: &Session, id: i64) -> Result<()> {
    let detail = api.get_application_detail(id).await?.into_data();
    if detail.application.employer_id != session.employer_id()? {
        bail!("Application #{} is for another employer's job", id);
    }
    Ok(())
}

// --- Saved jobs ---

async fn saved(api: &dyn JobBoardApi, session: Session, command: SavedCommands) -> Result<()> {
    let ucid = session.ucid()?;
    match command {
        SavedCommands::List => {
            let list = api.get_saved_jobs(ucid).await?.into_data();
            if list.is_empty() {
                println!("No saved jobs.");
                return Ok(());
            }
            println!(
                "{:<6} {:<30} {:<24} {:<9} {:<12}",
                "JOB", "TITLE", "COMPANY", "STATUS", "DEADLINE"
            );
            println!("{}", "-".repeat(85));
            for view in list {
                let status = view.job.status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<6} {:<30} {:<24} {:<9} {:<12}",
                    view.saved.job_id,
                    truncate(&view.job.title, 28),
                    truncate(&view.job.company_name, 22),
                    status,
                    view.job.deadline
                );
            }
        }

        SavedCommands::Add { job_id } => {
            let outcome = api.save_job(ucid, job_id).await?.into_data();
            if outcome.already_saved {
                println!("Job #{} was already saved.", job_id);
            } else {
                println!("Saved job #{}.", job_id);
            }
        }

        SavedCommands::Remove { job_id } => {
            if api.unsave_job(ucid, job_id).await?.into_data().existed {
                println!("Removed job #{} from saved jobs.", job_id);
            } else {
                println!("Job #{} was not saved.", job_id);
            }
        }

        SavedCommands::Check { job_id } => {
            let saved = api.is_job_saved(ucid, job_id).await?.into_data();
            println!("Job #{} is {}saved.", job_id, if saved { "" } else { "not " });
        }
    }
    Ok(())
}

// --- Verifications ---

async fn verify(api: &dyn JobBoardApi, session: Session, command: VerifyCommands) -> Result<()> {
    match command {
        VerifyCommands::List { kind, status } => {
            session.require(Role::Moderator)?;
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            let entries = api.get_verifications(kind, status).await?.into_data();
            if entries.is_empty() {
                println!("No verification requests.");
                return Ok(());
            }
            println!(
                "{:<5} {:<9} {:<8} {:<28} {:<26} {:<9} {:<10}",
                "VID", "KIND", "ID", "NAME", "EMAIL", "STATUS", "DATE"
            );
            println!("{}", "-".repeat(101));
            for entry in entries {
                let v = &entry.verification;
                let id = match &v.subject {
                    Subject::Student(ucid) => ucid.clone(),
                    Subject::Employer(id) => id.to_string(),
                };
                println!(
                    "{:<5} {:<9} {:<8} {:<28} {:<26} {:<9} {:<10}",
                    v.vid,
                    v.subject.kind(),
                    id,
                    truncate(&entry.display_name, 26),
                    truncate(&entry.email, 24),
                    v.status,
                    date_or_dash(v.date)
                );
            }
        }

        VerifyCommands::Status { kind, id } => {
            let subject = match (kind, id) {
                (Some(kind), Some(id)) => {
                    session.require(Role::Moderator)?;
                    parse_subject(&kind, &id)?
                }
                (None, None) => match session.role() {
                    Role::Student => Subject::Student(session.ucid()?.to_string()),
                    Role::Employer => Subject::Employer(session.employer_id()?),
                    Role::Moderator => bail!("Moderators must name an account: verify status <kind> <id>"),
                },
                _ => bail!("Give both kind and id, or neither"),
            };
            let check = api.check_verification_status(&subject).await?.into_data();
            println!("{}: {}", subject, check.status);
            if !check.feedback.is_empty() {
                println!("Feedback: {}", check.feedback);
            }
        }

        VerifyCommands::Approve { kind, id } => {
            let moderator_id = session.moderator_id()?;
            let subject = parse_subject(&kind, &id)?;
            let record = api
                .approve_verification(&subject, Some(moderator_id))
                .await?
                .into_data();
            println!("Approved {} (verification #{}).", subject, record.vid);
        }

        VerifyCommands::Reject { kind, id, feedback } => {
            let moderator_id = session.moderator_id()?;
            let subject = parse_subject(&kind, &id)?;
            let record = api
                .reject_verification(&subject, Some(moderator_id), &feedback)
                .await?
                .into_data();
            println!("Rejected {} (verification #{}).", subject, record.vid);
        }
    }
    Ok(())
}

// --- Forum ---

async fn forum(api: &dyn JobBoardApi, session: Option<Session>, command: ForumCommands) -> Result<()> {
    match command {
        ForumCommands::List {
            keyword,
            sort,
            page,
            mine,
        } => {
            let sort = match sort.trim().to_lowercase().as_str() {
                "recent" => SortKey::Recent,
                "popular" => SortKey::Popular,
                other => bail!("Unknown sort '{}'. Use recent or popular", other),
            };
            let author = if mine {
                Some(require_session(session)?.author())
            } else {
                None
            };
            let query = PostQuery {
                keyword,
                author,
                sort,
                page: Some(page.unwrap_or(1)),
            };
            let page = api.get_forum_posts(&query).await?.into_data();
            if page.items.is_empty() {
                println!("No posts found.");
                return Ok(());
            }
            println!(
                "{:<6} {:>4} {:>4} {:<34} {:<22} {:<10}",
                "ID", "UP", "CMT", "TITLE", "AUTHOR", "DATE"
            );
            println!("{}", "-".repeat(85));
            for view in &page.items {
                println!(
                    "{:<6} {:>4} {:>4} {:<34} {:<22} {:<10}",
                    view.post.post_id,
                    view.post.upvotes,
                    view.comment_count,
                    truncate(&view.post.title, 32),
                    truncate(&view.author_name, 20),
                    date_or_dash(view.post.date_posted)
                );
            }
            println!(
                "\nPage {} of {} ({} posts)",
                page.page, page.total_pages, page.total_items
            );
        }

        ForumCommands::Show { id } => {
            let view = api.get_forum_post(id).await?.into_data();
            println!("#{} {}", view.post.post_id, view.post.title);
            match &view.company_name {
                Some(company) => println!("by {} ({})", view.author_name, company),
                None => println!("by {}", view.author_name),
            }
            println!(
                "{} | {} upvotes | {} comments",
                date_or_dash(view.post.date_posted),
                view.post.upvotes,
                view.comment_count
            );
            println!("\n{}", textwrap::fill(&view.post.content, 78));

            let comments = api.get_forum_comments(id).await?.into_data();
            if !comments.is_empty() {
                println!("\n--- Comments ---");
                for c in comments {
                    println!(
                        "[#{}] {} ({}):",
                        c.comment.comment_id,
                        c.author_name,
                        date_or_dash(c.comment.date_posted)
                    );
                    for line in textwrap::fill(&c.comment.content, 74).lines() {
                        println!("    {}", line);
                    }
                }
            }
        }

        ForumCommands::Post { title, content } => {
            let author = require_session(session)?.author();
            let post = api
                .create_forum_post(NewPost { author, title, content })
                .await?
                .into_data();
            println!("Posted #{} '{}'.", post.post_id, post.title);
        }

        ForumCommands::Edit { id, title, content } => {
            let session = require_session(session)?;
            require_own_post(api, &session, id).await?;
            let post = api
                .update_forum_post(id, PostPatch { title, content })
                .await?
                .into_data();
            println!("Updated post #{} '{}'.", post.post_id, post.title);
        }

        ForumCommands::Upvote { id } => {
            let voter = require_session(session)?.author();
            let post = api.upvote_forum_post(id, &voter).await?.into_data();
            println!("Upvoted post #{} ({} upvotes).", post.post_id, post.upvotes);
        }

        ForumCommands::Delete { id } => {
            let session = require_session(session)?;
            require_own_post(api, &session, id).await?;
            if api.delete_forum_post(id).await?.into_data().existed {
                println!("Deleted post #{}.", id);
            } else {
                println!("Post #{} not found.", id);
            }
        }

        ForumCommands::Comment { post_id, content } => {
            let author = require_session(session)?.author();
            let comment = api
                .create_forum_comment(NewComment {
                    post_id,
                    author,
                    content,
                })
                .await?
                .into_data();
            println!("Added comment #{} on post #{}.", comment.comment_id, post_id);
        }

        ForumCommands::DeleteComment { id } => {
            require_session(session)?.require(Role::Moderator)?;
            if api.delete_forum_comment(id).await?.into_data().existed {
                println!("Deleted comment #{}.", id);
            } else {
                println!("Comment #{} not found.", id);
            }
        }

        ForumCommands::Score {
            student,
            employer,
            moderator,
        } => {
            let author = match (student, employer, moderator) {
                (Some(ucid), _, _) => Author::Student(ucid),
                (_, Some(id), _) => Author::Employer(id),
                (_, _, Some(id)) => Author::Moderator(id),
                _ => require_session(session)?.author(),
            };
            let score = api.get_user_community_score(&author).await?.into_data();
            println!("Community score for {}: {}", author, score.score);
            println!("  Posts:      {}", score.post_count);
            println!("  Upvotes:    {}", score.upvotes);
            println!("  Post bonus: {}", score.post_bonus);
        }
    }
    Ok(())
}

async fn require_own_post(api: &dyn JobBoardApi, session: &Session, id: i64) -> Result<()> {
    if session.role() == Role::Moderator {
        return Ok(());
    }
    let view = api.get_forum_post(id).await?.into_data();
    if view.post.author != session.author() {
        bail!("Post #{} was written by someone else", id);
    }
    Ok(())
}

// --- Profile ---

async fn profile(api: &dyn JobBoardApi, session: Option<Session>, command: ProfileCommands) -> Result<()> {
    match command {
        ProfileCommands::Show => {
            let session = require_session(session)?;
            match session.role() {
                Role::Student => {
                    let s = api.get_student_profile(session.ucid()?).await?.into_data();
                    println!("{} ({})", s.full_name(), s.ucid);
                    println!("Email: {}", s.email);
                    println!("Phone: {}", or_dash(&s.phone));
                    println!("Major: {}", or_dash(&s.major));
                    if let Some(year) = s.graduation_year {
                        println!("Graduation year: {}", year);
                    }
                    println!("Verification: {}", s.verification_status);
                }
                Role::Employer => {
                    let e = api.get_employer(session.employer_id()?).await?.into_data();
                    println!("{} (ID: {})", e.company_name, e.employer_id);
                    println!("Email: {}", e.email);
                    for (label, value) in [
                        ("Industry", &e.industry),
                        ("Website", &e.website),
                        ("Location", &e.location),
                    ] {
                        println!("{}: {}", label, value.as_deref().unwrap_or("-"));
                    }
                    println!("Verification: {}", e.verification_status);
                    if let Some(description) = &e.description {
                        println!("\n{}", textwrap::fill(description, 78));
                    }
                }
                Role::Moderator => {
                    let id = session.moderator_id()?;
                    let status = api.check_moderator_status(id).await?.into_data();
                    println!("{} <{}>", session.display_name, session.email);
                    println!(
                        "Moderator #{}: {}",
                        id,
                        if status.is_moderator { "active" } else { "not found" }
                    );
                }
            }
        }

        ProfileCommands::Update {
            first_name,
            last_name,
            email,
            phone,
            major,
            graduation_year,
            company_name,
            industry,
            website,
            location,
            description,
        } => {
            let session = require_session(session)?;
            match session.role() {
                Role::Student => {
                    let patch = StudentPatch {
                        first_name,
                        last_name,
                        email,
                        phone,
                        major,
                        graduation_year,
                    };
                    let s = api
                        .update_student_profile(session.ucid()?, patch)
                        .await?
                        .into_data();
                    println!("Updated profile for {} ({}).", s.full_name(), s.ucid);
                }
                Role::Employer => {
                    let patch = EmployerPatch {
                        company_name,
                        email,
                        industry,
                        website,
                        location,
                        description,
                    };
                    let e = api
                        .update_employer(session.employer_id()?, patch)
                        .await?
                        .into_data();
                    println!("Updated profile for {}.", e.company_name);
                }
                Role::Moderator => bail!("Moderator profiles cannot be edited here"),
            }
        }

        ProfileCommands::Employers => {
            let employers = api.get_employers().await?.into_data();
            if employers.is_empty() {
                println!("No employers found.");
                return Ok(());
            }
            println!(
                "{:<6} {:<30} {:<16} {:<22} {:<9}",
                "ID", "COMPANY", "INDUSTRY", "LOCATION", "VERIFIED"
            );
            println!("{}", "-".repeat(87));
            for e in employers {
                println!(
                    "{:<6} {:<30} {:<16} {:<22} {:<9}",
                    e.employer_id,
                    truncate(&e.company_name, 28),
                    truncate(e.industry.as_deref().unwrap_or("-"), 14),
                    truncate(e.location.as_deref().unwrap_or("-"), 20),
                    e.verification_status
                );
            }
        }
    }
    Ok(())
}

// --- Formatting ---

fn money(amount: f64) -> String {
    if amount > 0.0 {
        format!("${:.0}", amount)
    } else {
        "-".to_string()
    }
}

fn date_or_dash(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Software Engineering Intern", 10), "Softwar...");
        assert_eq!(truncate("Café Société", 7), "Café...");
    }

    #[test]
    fn test_parse_subject() {
        assert_eq!(parse_subject("employer", "3").unwrap(), Subject::Employer(3));
        assert_eq!(
            parse_subject("Student", "jd45").unwrap(),
            Subject::Student("jd45".into())
        );
        assert!(parse_subject("employer", "three").is_err());
        assert!(parse_subject("admin", "1").is_err());
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "nextstep", "jobs", "list", "--backend", "http", "-s", "active", "-k", "intern",
        ])
        .unwrap();
        assert_eq!(cli.backend, Some(Backend::Http));
        match cli.command {
            Commands::Jobs {
                command: JobCommands::List { status, keyword, .. },
            } => {
                assert_eq!(status, Some(JobStatus::Active));
                assert_eq!(keyword.as_deref(), Some("intern"));
            }
            _ => panic!("expected jobs list"),
        }
    }

    #[test]
    fn test_mutating_commands() {
        let read = Cli::try_parse_from(["nextstep", "forum", "list"]).unwrap();
        assert!(!read.command.mutates());
        let write = Cli::try_parse_from(["nextstep", "saved", "add", "2"]).unwrap();
        assert!(write.command.mutates());
        let status = Cli::try_parse_from(["nextstep", "apps", "status", "1", "under-review"]).unwrap();
        assert!(status.command.mutates());
    }
}
