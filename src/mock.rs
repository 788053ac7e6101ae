//! In-memory backend over a [`Fixture`].
//!
//! All collections sit behind one `RwLock`. Reads share it; every mutation
//! holds the write guard for its whole read-modify-write, so concurrent tasks
//! sharing a `MockApi` never see half-applied changes.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use rand::{Rng, distributions::Alphanumeric};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, instrument};

use crate::api::{JobBoardApi, ModeratorStatus, Reply, ok};
use crate::config::Backend;
use crate::enrich::{
    self, ApplicationDetail, ApplicationView, CommentView, Lookup, PostView, SavedJobView,
    VerificationEntry,
};
use crate::error::{ApiError, Result};
use crate::fixture::Fixture;
use crate::models::{
    AccountKind, Application, Author, Comment, CommunityScore, Credentials, DeleteOutcome,
    Employer, EmployerPatch, FeedbackUpdate, ForumPost, Job, JobPatch, LoginResponse, NewComment,
    NewEmployer, NewJob, NewPost, NewStudent, PostPatch, SaveOutcome, SavedJob, Student,
    StudentPatch, Subject, Upvote, UserProfile, Verification, VerificationCheck,
};
use crate::query::{self, ApplicationFilter, JobFilter, Page, PostQuery};
use crate::status::{ApplicationStatus, JobStatus, VerificationStatus};
use crate::store;

#[derive(Debug, Clone)]
pub struct MockApi {
    fixture: Arc<RwLock<Fixture>>,
    latency: Duration,
    today: Option<NaiveDate>,
    store_path: Option<PathBuf>,
}

impl MockApi {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture: Arc::new(RwLock::new(fixture)),
            latency: Duration::ZERO,
            today: None,
            store_path: None,
        }
    }

    /// Simulated network delay before every operation.
    pub fn with_latency_ms(mut self, ms: u64) -> Self {
        self.latency = Duration::from_millis(ms);
        self
    }

    /// Pin the date used for deadlines and new records.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn persist_to(mut self, path: PathBuf) -> Self {
        self.store_path = Some(path);
        self
    }

    pub async fn snapshot(&self) -> Fixture {
        self.fixture.read().await.clone()
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn read(&self) -> RwLockReadGuard<'_, Fixture> {
        self.pause().await;
        self.fixture.read().await
    }

    async fn write(&self) -> RwLockWriteGuard<'_, Fixture> {
        self.pause().await;
        self.fixture.write().await
    }

    async fn set_job_status(&self, job_id: i64, next: JobStatus, feedback: Option<&str>) -> Reply<Job> {
        let today = self.today();
        let mut f = self.write().await;
        let job = store::get_mut(&mut f.jobs, &job_id)?;
        let current = job.effective_status(today);
        job.status = current.transition(next)?;
        if let Some(feedback) = feedback {
            job.feedback = Some(feedback.to_string());
        }
        info!(job_id, from = %current, to = %next, "job status changed");
        ok(job.clone())
    }

    async fn decide(
        &self,
        subject: &Subject,
        next: VerificationStatus,
        moderator_id: Option<i64>,
        feedback: Option<&str>,
    ) -> Reply<Verification> {
        let today = self.today();
        let feedback = feedback.map(str::to_string);
        let mut f = self.write().await;

        let account_status = match subject {
            Subject::Student(ucid) => store::get(&f.students, ucid)?.verification_status,
            Subject::Employer(id) => store::get(&f.employers, id)?.verification_status,
        };

        // The newest record for the subject carries the decision; one is
        // created when the account has none.
        let newest = f
            .verifications
            .iter()
            .filter(|v| v.subject == *subject)
            .map(|v| v.vid)
            .max();
        let record = match newest {
            Some(vid) => {
                let v = store::get_mut(&mut f.verifications, &vid)?;
                v.status = v.status.transition(next)?;
                v.date = Some(today);
                v.moderator_id = moderator_id.or(v.moderator_id);
                v.feedback = feedback.clone();
                v.clone()
            }
            None => {
                account_status.transition(next)?;
                store::insert(
                    &mut f.verifications,
                    Verification {
                        vid: 0,
                        subject: subject.clone(),
                        status: next,
                        date: Some(today),
                        moderator_id,
                        feedback: feedback.clone(),
                    },
                )
            }
        };

        match subject {
            Subject::Student(ucid) => {
                let student = store::get_mut(&mut f.students, ucid)?;
                student.verification_status = next;
                student.feedback = feedback;
            }
            Subject::Employer(id) => {
                let employer = store::get_mut(&mut f.employers, id)?;
                employer.verification_status = next;
                employer.feedback = feedback;
            }
        }
        info!(%subject, status = %next, vid = record.vid, "verification decided");
        ok(record)
    }
}

fn mock_token() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("mock-{}", suffix)
}

/// Whether any account other than `except` already uses `email`.
fn email_taken(f: &Fixture, email: &str, except: Option<&Subject>) -> bool {
    let email = email.trim();
    let is_self = |subject: Subject| except == Some(&subject);
    f.students
        .iter()
        .any(|s| s.email.eq_ignore_ascii_case(email) && !is_self(Subject::Student(s.ucid.clone())))
        || f.employers
            .iter()
            .any(|e| e.email.eq_ignore_ascii_case(email) && !is_self(Subject::Employer(e.employer_id)))
        || f.moderators.iter().any(|m| m.email.eq_ignore_ascii_case(email))
}

fn check_email_free(f: &Fixture, email: &str, except: Option<&Subject>) -> Result<()> {
    if email_taken(f, email, except) {
        Err(ApiError::validation(format!("{} is already registered", email.trim())))
    } else {
        Ok(())
    }
}

fn author_exists(f: &Fixture, author: &Author) -> bool {
    match author {
        Author::Student(ucid) => store::find(&f.students, ucid).is_some(),
        Author::Employer(id) => store::find(&f.employers, id).is_some(),
        Author::Moderator(id) => store::find(&f.moderators, id).is_some(),
    }
}

fn check_author(f: &Fixture, author: &Author) -> Result<()> {
    if author_exists(f, author) {
        Ok(())
    } else {
        Err(ApiError::validation(format!("Unknown {}", author)))
    }
}

#[async_trait]
impl JobBoardApi for MockApi {
    fn backend(&self) -> Backend {
        Backend::Mock
    }

    async fn persist(&self) -> Result<()> {
        if let Some(path) = &self.store_path {
            let snapshot = self.snapshot().await;
            snapshot.save(path)?;
            debug!(path = %path.display(), "mock store saved");
        }
        Ok(())
    }

    // --- Auth ---

    // Passwords are not stored in fixtures; any non-empty password is accepted.
    async fn login(&self, credentials: &Credentials) -> Reply<LoginResponse> {
        let email = credentials.email.trim();
        if email.is_empty() || credentials.password.is_empty() {
            return Err(ApiError::validation("Email and password are required"));
        }
        let f = self.read().await;
        let user = f
            .students
            .iter()
            .find(|s| s.email.eq_ignore_ascii_case(email))
            .cloned()
            .map(UserProfile::Student)
            .or_else(|| {
                f.employers
                    .iter()
                    .find(|e| e.email.eq_ignore_ascii_case(email))
                    .cloned()
                    .map(UserProfile::Employer)
            })
            .or_else(|| {
                f.moderators
                    .iter()
                    .find(|m| m.email.eq_ignore_ascii_case(email))
                    .cloned()
                    .map(UserProfile::Moderator)
            })
            .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
        let role = user.role();
        info!(%role, "logged in");
        ok(LoginResponse {
            token: mock_token(),
            user,
            role,
        })
    }

    #[instrument(level = "debug", skip_all, fields(ucid = %new.ucid))]
    async fn register_student(&self, new: NewStudent) -> Reply<Student> {
        new.validate()?;
        let today = self.today();
        let mut f = self.write().await;
        if store::find(&f.students, &new.ucid).is_some() {
            return Err(ApiError::validation(format!("UCID {} is already registered", new.ucid)));
        }
        check_email_free(&f, &new.email, None)?;
        let student = Student {
            ucid: new.ucid,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email.trim().to_string(),
            phone: new.phone,
            major: new.major,
            graduation_year: new.graduation_year,
            verification_status: VerificationStatus::Pending,
            feedback: None,
        };
        f.students.push(student.clone());
        store::insert(
            &mut f.verifications,
            Verification {
                vid: 0,
                subject: Subject::Student(student.ucid.clone()),
                status: VerificationStatus::Pending,
                date: Some(today),
                moderator_id: None,
                feedback: None,
            },
        );
        info!("student registered, awaiting verification");
        ok(student)
    }

    #[instrument(level = "debug", skip_all, fields(company = %new.company_name))]
    async fn register_employer(&self, new: NewEmployer) -> Reply<Employer> {
        new.validate()?;
        let today = self.today();
        let mut f = self.write().await;
        check_email_free(&f, &new.email, None)?;
        let employer = store::insert(
            &mut f.employers,
            Employer {
                employer_id: 0,
                company_name: new.company_name.trim().to_string(),
                email: new.email.trim().to_string(),
                industry: new.industry,
                website: new.website,
                location: new.location,
                description: new.description,
                verification_status: VerificationStatus::Pending,
                feedback: None,
            },
        );
        store::insert(
            &mut f.verifications,
            Verification {
                vid: 0,
                subject: Subject::Employer(employer.employer_id),
                status: VerificationStatus::Pending,
                date: Some(today),
                moderator_id: None,
                feedback: None,
            },
        );
        info!(employer_id = employer.employer_id, "employer registered, awaiting verification");
        ok(employer)
    }

    async fn check_moderator_status(&self, moderator_id: i64) -> Reply<ModeratorStatus> {
        let f = self.read().await;
        let found = store::find(&f.moderators, &moderator_id).map(|m| m.moderator_id);
        ok(ModeratorStatus {
            is_moderator: found.is_some(),
            moderator_id: found,
        })
    }

    // --- Profiles ---

    async fn get_student_profile(&self, ucid: &str) -> Reply<Student> {
        let f = self.read().await;
        ok(store::get(&f.students, &ucid.to_string())?.clone())
    }

    async fn update_student_profile(&self, ucid: &str, patch: StudentPatch) -> Reply<Student> {
        let mut f = self.write().await;
        store::get(&f.students, &ucid.to_string())?;
        if let Some(email) = &patch.email {
            check_email_free(&f, email, Some(&Subject::Student(ucid.to_string())))?;
        }
        ok(store::update(&mut f.students, &ucid.to_string(), patch)?)
    }

    async fn get_employers(&self) -> Reply<Vec<Employer>> {
        let f = self.read().await;
        ok(f.employers.clone())
    }

    async fn get_employer(&self, employer_id: i64) -> Reply<Employer> {
        let f = self.read().await;
        ok(store::get(&f.employers, &employer_id)?.clone())
    }

    async fn update_employer(&self, employer_id: i64, patch: EmployerPatch) -> Reply<Employer> {
        let mut f = self.write().await;
        store::get(&f.employers, &employer_id)?;
        if let Some(email) = &patch.email {
            check_email_free(&f, email, Some(&Subject::Employer(employer_id)))?;
        }
        ok(store::update(&mut f.employers, &employer_id, patch)?)
    }

    // --- Jobs ---

    async fn get_jobs(&self, filter: &JobFilter) -> Reply<Vec<Job>> {
        let today = self.today();
        let f = self.read().await;
        let jobs = query::filter_jobs(&f.jobs, &f.employers, filter, today);
        debug!(count = jobs.len(), "jobs matched");
        ok(jobs)
    }

    async fn get_job(&self, job_id: i64) -> Reply<Job> {
        let today = self.today();
        let f = self.read().await;
        ok(store::get(&f.jobs, &job_id)?.clone().with_effective_status(today))
    }

    #[instrument(level = "debug", skip_all, fields(employer_id = new.employer_id))]
    async fn create_job(&self, new: NewJob) -> Reply<Job> {
        new.validate()?;
        let today = self.today();
        let mut f = self.write().await;
        if store::find(&f.employers, &new.employer_id).is_none() {
            return Err(ApiError::validation(format!(
                "Employer {} does not exist",
                new.employer_id
            )));
        }
        let job = store::insert(
            &mut f.jobs,
            Job {
                job_id: 0,
                employer_id: new.employer_id,
                title: new.title,
                description: new.description,
                location: new.location,
                salary: new.salary,
                deadline: new.deadline,
                requirements: new.requirements,
                responsibilities: new.responsibilities,
                benefits: new.benefits,
                status: JobStatus::Pending,
                feedback: None,
                date_posted: Some(today),
            },
        );
        info!(job_id = job.job_id, "job created, pending review");
        ok(job)
    }

    async fn update_job(&self, job_id: i64, patch: JobPatch) -> Reply<Job> {
        let today = self.today();
        let mut f = self.write().await;
        let job = store::update(&mut f.jobs, &job_id, patch)?;
        ok(job.with_effective_status(today))
    }

    async fn delete_job(&self, job_id: i64) -> Reply<DeleteOutcome> {
        let mut f = self.write().await;
        let existed = store::remove(&mut f.jobs, &job_id);
        debug!(job_id, existed, "job deleted");
        ok(DeleteOutcome { existed })
    }

    async fn approve_job(&self, job_id: i64) -> Reply<Job> {
        self.set_job_status(job_id, JobStatus::Active, None).await
    }

    async fn reject_job(&self, job_id: i64, feedback: &str) -> Reply<Job> {
        if feedback.trim().is_empty() {
            return Err(ApiError::validation("Feedback is required when rejecting a job"));
        }
        self.set_job_status(job_id, JobStatus::Rejected, Some(feedback)).await
    }

    async fn close_job(&self, job_id: i64) -> Reply<Job> {
        self.set_job_status(job_id, JobStatus::Closed, None).await
    }

    async fn get_company_jobs(&self, employer_id: i64) -> Reply<Vec<Job>> {
        self.get_jobs(&JobFilter::by_employer(employer_id)).await
    }

    async fn get_pending_jobs(&self) -> Reply<Vec<Job>> {
        self.get_jobs(&JobFilter::by_status(JobStatus::Pending)).await
    }

    // --- Applications ---

    async fn get_applications(&self, filter: &ApplicationFilter) -> Reply<Vec<ApplicationView>> {
        let today = self.today();
        let f = self.read().await;
        let lookup = Lookup::new(&f, today);
        let views = f
            .applications
            .iter()
            .filter(|app| filter.matches(app))
            .map(|app| lookup.application_view(app))
            .collect();
        ok(views)
    }

    async fn get_student_applications(&self, ucid: &str) -> Reply<Vec<ApplicationView>> {
        self.get_applications(&ApplicationFilter::by_applicant(ucid)).await
    }

    async fn get_company_applications(&self, employer_id: i64) -> Reply<Vec<ApplicationView>> {
        self.get_applications(&ApplicationFilter::by_employer(employer_id)).await
    }

    async fn get_application_detail(&self, application_id: i64) -> Reply<ApplicationDetail> {
        let today = self.today();
        let f = self.read().await;
        let app = store::get(&f.applications, &application_id)?;
        ok(Lookup::new(&f, today).application_detail(app))
    }

    #[instrument(level = "debug", skip(self))]
    async fn apply_for_job(&self, ucid: &str, job_id: i64) -> Reply<Application> {
        let today = self.today();
        let mut f = self.write().await;
        store::get(&f.students, &ucid.to_string())?;
        let job = store::get(&f.jobs, &job_id)?;
        if job.effective_status(today) != JobStatus::Active {
            return Err(ApiError::validation(format!(
                "Job {} is not accepting applications",
                job_id
            )));
        }
        let employer_id = job.employer_id;
        let duplicate = f
            .applications
            .iter()
            .any(|a| a.applicant_ucid == ucid && a.job_id == job_id);
        if duplicate {
            return Err(ApiError::validation("You have already applied for this job"));
        }
        let app = store::insert(
            &mut f.applications,
            Application {
                application_id: 0,
                applicant_ucid: ucid.to_string(),
                job_id,
                employer_id,
                status: ApplicationStatus::Submitted,
                date_applied: Some(today),
                feedback: None,
            },
        );
        info!(application_id = app.application_id, "application submitted");
        ok(app)
    }

    async fn update_application_status(
        &self,
        application_id: i64,
        status: ApplicationStatus,
        feedback: Option<String>,
    ) -> Reply<Application> {
        let mut f = self.write().await;
        let app = store::get_mut(&mut f.applications, &application_id)?;
        let previous = app.status;
        app.status = previous.transition(status)?;
        if let Some(feedback) = feedback {
            app.feedback = Some(feedback);
        }
        info!(application_id, from = %previous, to = %status, "application status changed");
        ok(app.clone())
    }

    async fn update_application_feedback(
        &self,
        application_id: i64,
        update: FeedbackUpdate,
    ) -> Reply<Application> {
        let mut f = self.write().await;
        let app = store::get_mut(&mut f.applications, &application_id)?;
        if let Some(status) = update.status {
            app.status = app.status.transition(status)?;
        }
        app.feedback = Some(update.feedback);
        ok(app.clone())
    }

    // --- Saved jobs ---

    async fn get_saved_jobs(&self, ucid: &str) -> Reply<Vec<SavedJobView>> {
        let today = self.today();
        let f = self.read().await;
        let lookup = Lookup::new(&f, today);
        let views = f
            .saved_jobs
            .iter()
            .filter(|s| s.ucid == ucid)
            .map(|s| lookup.saved_job_view(s))
            .collect();
        ok(views)
    }

    async fn save_job(&self, ucid: &str, job_id: i64) -> Reply<SaveOutcome> {
        let today = self.today();
        let mut f = self.write().await;
        store::get(&f.jobs, &job_id)?;
        let already_saved = f.saved_jobs.iter().any(|s| s.ucid == ucid && s.job_id == job_id);
        if !already_saved {
            store::insert(
                &mut f.saved_jobs,
                SavedJob {
                    saved_job_id: 0,
                    ucid: ucid.to_string(),
                    job_id,
                    date_saved: Some(today),
                },
            );
        }
        ok(SaveOutcome {
            success: true,
            is_saved: true,
            already_saved,
        })
    }

    async fn unsave_job(&self, ucid: &str, job_id: i64) -> Reply<DeleteOutcome> {
        let mut f = self.write().await;
        let before = f.saved_jobs.len();
        f.saved_jobs.retain(|s| !(s.ucid == ucid && s.job_id == job_id));
        ok(DeleteOutcome {
            existed: f.saved_jobs.len() != before,
        })
    }

    async fn is_job_saved(&self, ucid: &str, job_id: i64) -> Reply<bool> {
        let f = self.read().await;
        ok(f.saved_jobs.iter().any(|s| s.ucid == ucid && s.job_id == job_id))
    }

    // --- Verifications ---

    async fn get_verifications(
        &self,
        kind: Option<AccountKind>,
        status: Option<VerificationStatus>,
    ) -> Reply<Vec<VerificationEntry>> {
        let today = self.today();
        let f = self.read().await;
        let lookup = Lookup::new(&f, today);
        ok(enrich::verification_queue(&f.verifications, kind, status, &lookup))
    }

    async fn check_verification_status(&self, subject: &Subject) -> Reply<VerificationCheck> {
        let f = self.read().await;
        let newest = f
            .verifications
            .iter()
            .filter(|v| v.subject == *subject)
            .max_by_key(|v| v.vid);
        if let Some(v) = newest {
            return ok(VerificationCheck {
                status: v.status,
                feedback: v.feedback.clone().unwrap_or_default(),
            });
        }
        let (status, feedback) = match subject {
            Subject::Student(ucid) => {
                let s = store::get(&f.students, ucid)?;
                (s.verification_status, s.feedback.clone())
            }
            Subject::Employer(id) => {
                let e = store::get(&f.employers, id)?;
                (e.verification_status, e.feedback.clone())
            }
        };
        ok(VerificationCheck {
            status,
            feedback: feedback.unwrap_or_default(),
        })
    }

    async fn approve_verification(
        &self,
        subject: &Subject,
        moderator_id: Option<i64>,
    ) -> Reply<Verification> {
        self.decide(subject, VerificationStatus::Approved, moderator_id, None)
            .await
    }

    async fn reject_verification(
        &self,
        subject: &Subject,
        moderator_id: Option<i64>,
        feedback: &str,
    ) -> Reply<Verification> {
        if feedback.trim().is_empty() {
            return Err(ApiError::validation("Feedback is required when rejecting"));
        }
        self.decide(subject, VerificationStatus::Rejected, moderator_id, Some(feedback))
            .await
    }

    // --- Forum ---

    async fn get_forum_posts(&self, q: &PostQuery) -> Reply<Page<PostView>> {
        let today = self.today();
        let f = self.read().await;
        let lookup = Lookup::new(&f, today);
        ok(enrich::post_page(&f.forum_posts, &f.comments, &lookup, q))
    }

    async fn get_forum_post(&self, post_id: i64) -> Reply<PostView> {
        let today = self.today();
        let f = self.read().await;
        let post = store::get(&f.forum_posts, &post_id)?;
        let comments = f.comments.iter().filter(|c| c.post_id == post_id).count();
        ok(Lookup::new(&f, today).post_view(post, comments))
    }

    async fn create_forum_post(&self, new: NewPost) -> Reply<ForumPost> {
        new.validate()?;
        let today = self.today();
        let mut f = self.write().await;
        check_author(&f, &new.author)?;
        let post = store::insert(
            &mut f.forum_posts,
            ForumPost {
                post_id: 0,
                author: new.author,
                title: new.title,
                content: new.content,
                date_posted: Some(today),
                upvotes: 0,
            },
        );
        debug!(post_id = post.post_id, "post created");
        ok(post)
    }

    async fn update_forum_post(&self, post_id: i64, patch: PostPatch) -> Reply<ForumPost> {
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&patch.title) || blank(&patch.content) {
            return Err(ApiError::validation("Title and content cannot be empty"));
        }
        let mut f = self.write().await;
        ok(store::update(&mut f.forum_posts, &post_id, patch)?)
    }

    async fn upvote_forum_post(&self, post_id: i64, voter: &Author) -> Reply<ForumPost> {
        let mut f = self.write().await;
        check_author(&f, voter)?;
        store::get(&f.forum_posts, &post_id)?;
        if f.upvotes.iter().any(|u| u.post_id == post_id && u.voter == *voter) {
            return Err(ApiError::validation("You have already upvoted this post"));
        }
        store::insert(
            &mut f.upvotes,
            Upvote {
                upvote_id: 0,
                post_id,
                voter: voter.clone(),
            },
        );
        let post = store::get_mut(&mut f.forum_posts, &post_id)?;
        post.upvotes = post.upvotes.saturating_add(1);
        ok(post.clone())
    }

    async fn delete_forum_post(&self, post_id: i64) -> Reply<DeleteOutcome> {
        let mut f = self.write().await;
        let existed = store::remove(&mut f.forum_posts, &post_id);
        f.comments.retain(|c| c.post_id != post_id);
        f.upvotes.retain(|u| u.post_id != post_id);
        debug!(post_id, existed, "post deleted");
        ok(DeleteOutcome { existed })
    }

    async fn get_forum_comments(&self, post_id: i64) -> Reply<Vec<CommentView>> {
        let today = self.today();
        let f = self.read().await;
        store::get(&f.forum_posts, &post_id)?;
        let lookup = Lookup::new(&f, today);
        ok(enrich::comment_thread(&f.comments, post_id, &lookup))
    }

    async fn create_forum_comment(&self, new: NewComment) -> Reply<Comment> {
        new.validate()?;
        let today = self.today();
        let mut f = self.write().await;
        check_author(&f, &new.author)?;
        store::get(&f.forum_posts, &new.post_id)?;
        let comment = store::insert(
            &mut f.comments,
            Comment {
                comment_id: 0,
                post_id: new.post_id,
                author: new.author,
                content: new.content,
                date_posted: Some(today),
            },
        );
        ok(comment)
    }

    async fn delete_forum_comment(&self, comment_id: i64) -> Reply<DeleteOutcome> {
        let mut f = self.write().await;
        let existed = store::remove(&mut f.comments, &comment_id);
        ok(DeleteOutcome { existed })
    }

    async fn get_user_community_score(&self, author: &Author) -> Reply<CommunityScore> {
        let f = self.read().await;
        ok(CommunityScore::from_posts(
            f.forum_posts.iter().filter(|p| p.author == *author),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::NO_JOB_TITLE;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn api() -> MockApi {
        MockApi::new(Fixture::seed().unwrap()).with_today(today())
    }

    fn new_job(employer_id: i64, title: &str) -> NewJob {
        NewJob {
            employer_id,
            title: title.to_string(),
            description: "Build things".into(),
            location: "Newark, NJ".into(),
            salary: 80000.0,
            deadline: NaiveDate::from_ymd_opt(2027, 6, 30),
            requirements: None,
            responsibilities: None,
            benefits: None,
        }
    }

    fn post_by(author: Author, title: &str) -> NewPost {
        NewPost {
            author,
            title: title.to_string(),
            content: "body".into(),
        }
    }

    #[tokio::test]
    async fn test_create_approve_then_listed_as_active() {
        let api = api();
        let job = api.create_job(new_job(1, "Platform Engineer")).await.unwrap().data;
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.job_id, 8);
        assert_eq!(job.date_posted, Some(today()));

        let active = JobFilter::by_status(JobStatus::Active);
        let before = api.get_jobs(&active).await.unwrap().data;
        assert!(before.iter().all(|j| j.job_id != job.job_id));
        let pending = api.get_pending_jobs().await.unwrap().data;
        assert!(pending.iter().any(|j| j.job_id == job.job_id));

        let approved = api.approve_job(job.job_id).await.unwrap().data;
        assert_eq!(approved.status, JobStatus::Active);
        let after = api.get_jobs(&active).await.unwrap().data;
        assert!(after.iter().any(|j| j.job_id == job.job_id));
    }

    #[tokio::test]
    async fn test_create_job_requires_existing_employer() {
        let err = api().create_job(new_job(404, "Ghost")).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_expired_job_reads_closed_and_rejects_transitions() {
        let api = api();
        let job = api.get_job(4).await.unwrap().data;
        assert_eq!(job.status, JobStatus::Closed);
        let err = api.approve_job(4).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_reject_job_needs_feedback() {
        let api = api();
        assert!(matches!(
            api.reject_job(5, " ").await.unwrap_err(),
            ApiError::ValidationFailed(_)
        ));
        let job = api.reject_job(5, "Add a salary range").await.unwrap().data;
        assert_eq!(job.status, JobStatus::Rejected);
        assert_eq!(job.feedback.as_deref(), Some("Add a salary range"));
    }

    #[tokio::test]
    async fn test_update_job_merges_and_missing_is_not_found() {
        let api = api();
        let original = api.get_job(1).await.unwrap().data;
        let patch = JobPatch {
            salary: Some(48000.0),
            ..JobPatch::default()
        };
        let updated = api.update_job(1, patch).await.unwrap().data;
        assert_eq!(updated, Job { salary: 48000.0, ..original });

        let err = api.update_job(999, JobPatch::default()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_save_twice_keeps_one_record() {
        let api = api();
        let first = api.save_job("pk7", 1).await.unwrap().data;
        assert!(first.success && first.is_saved && !first.already_saved);
        let second = api.save_job("pk7", 1).await.unwrap().data;
        assert!(second.already_saved);

        let saved = api.get_saved_jobs("pk7").await.unwrap().data;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].job.title, "Software Engineer Intern");
        assert!(api.is_job_saved("pk7", 1).await.unwrap().data);

        assert!(api.unsave_job("pk7", 1).await.unwrap().data.existed);
        assert!(!api.unsave_job("pk7", 1).await.unwrap().data.existed);
        assert!(!api.is_job_saved("pk7", 1).await.unwrap().data);
    }

    #[tokio::test]
    async fn test_community_score_example() {
        let api = api();
        let author = Author::Student("pk7".into());
        let p1 = api.create_forum_post(post_by(author.clone(), "one")).await.unwrap().data;
        api.create_forum_post(post_by(author.clone(), "two")).await.unwrap();
        let p3 = api.create_forum_post(post_by(author.clone(), "three")).await.unwrap().data;

        for voter in [Author::Student("jd45".into()), Author::Student("ms23".into())] {
            api.upvote_forum_post(p1.post_id, &voter).await.unwrap();
        }
        let voters = [
            Author::Student("jd45".into()),
            Author::Student("ms23".into()),
            Author::Student("al88".into()),
            Author::Employer(1),
            Author::Moderator(1),
        ];
        for voter in &voters {
            api.upvote_forum_post(p3.post_id, voter).await.unwrap();
        }

        let score = api.get_user_community_score(&author).await.unwrap().data;
        assert_eq!(score.upvotes, 7);
        assert_eq!(score.post_count, 3);
        assert_eq!(score.post_bonus, 6);
        assert_eq!(score.score, 13);
    }

    #[tokio::test]
    async fn test_second_upvote_by_same_voter_fails() {
        let api = api();
        let voter = Author::Student("pk7".into());
        let post = api.upvote_forum_post(4, &voter).await.unwrap().data;
        assert_eq!(post.upvotes, 1);
        let err = api.upvote_forum_post(4, &voter).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed(_)));
        assert_eq!(api.get_forum_post(4).await.unwrap().data.post.upvotes, 1);
    }

    #[tokio::test]
    async fn test_delete_post_is_idempotent_and_cascades() {
        let api = api();
        assert!(api.delete_forum_post(1).await.unwrap().data.existed);
        assert!(!api.delete_forum_post(1).await.unwrap().data.existed);

        let snapshot = api.snapshot().await;
        assert!(snapshot.comments.iter().all(|c| c.post_id != 1));
        assert!(snapshot.upvotes.iter().all(|u| u.post_id != 1));
        assert!(api.get_forum_post(1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_forum_comments_round() {
        let api = api();
        let comment = api
            .create_forum_comment(NewComment {
                post_id: 4,
                author: Author::Moderator(2),
                content: "Happy to help".into(),
            })
            .await
            .unwrap()
            .data;
        let thread = api.get_forum_comments(4).await.unwrap().data;
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].author_name, "Omar Haddad");

        assert!(api.delete_forum_comment(comment.comment_id).await.unwrap().data.existed);
        assert!(api.get_forum_comments(4).await.unwrap().data.is_empty());
        assert!(api.get_forum_comments(999).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_post_author_must_exist() {
        let err = api()
            .create_forum_post(post_by(Author::Employer(404), "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_forum_page_size() {
        let api = api();
        let q = PostQuery {
            page: Some(2),
            ..PostQuery::default()
        };
        let page = api.get_forum_posts(&q).await.unwrap().data;
        assert_eq!(page.total_items, 6);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_login_by_email() {
        let api = api();
        let creds = |email: &str, password: &str| Credentials {
            email: email.into(),
            password: password.into(),
        };
        let login = api.login(&creds("JD45@njit.edu", "pw")).await.unwrap().data;
        assert_eq!(login.role, crate::models::Role::Student);
        assert!(login.token.starts_with("mock-"));
        let employer = api.login(&creds("careers@technova.example.com", "pw")).await.unwrap().data;
        assert_eq!(employer.user.display_name(), "TechNova Solutions");

        assert!(matches!(
            api.login(&creds("nobody@example.com", "pw")).await.unwrap_err(),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            api.login(&creds("jd45@njit.edu", "")).await.unwrap_err(),
            ApiError::ValidationFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_register_student_queues_verification() {
        let api = api();
        let new = NewStudent {
            ucid: "zq9".into(),
            first_name: "Zoe".into(),
            last_name: "Quinn".into(),
            email: "zq9@njit.edu".into(),
            phone: String::new(),
            major: "Physics".into(),
            graduation_year: Some(2028),
            password: "pw".into(),
        };
        let student = api.register_student(new.clone()).await.unwrap().data;
        assert_eq!(student.verification_status, VerificationStatus::Pending);

        let queue = api
            .get_verifications(Some(AccountKind::Student), Some(VerificationStatus::Pending))
            .await
            .unwrap()
            .data;
        assert!(queue.iter().any(|e| e.verification.subject == Subject::Student("zq9".into())));

        let err = api.register_student(new).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_register_employer_assigns_id() {
        let api = api();
        let employer = api
            .register_employer(NewEmployer {
                company_name: "Harbor Logistics".into(),
                email: "talent@harbor.example.com".into(),
                industry: Some("Logistics".into()),
                website: None,
                location: None,
                description: None,
                password: "pw".into(),
            })
            .await
            .unwrap()
            .data;
        assert_eq!(employer.employer_id, 5);
        let check = api
            .check_verification_status(&Subject::Employer(5))
            .await
            .unwrap()
            .data;
        assert_eq!(check.status, VerificationStatus::Pending);
    }

    #[tokio::test]
    async fn test_apply_for_job() {
        let api = api();
        let app = api.apply_for_job("jd45", 2).await.unwrap().data;
        assert_eq!(app.status, ApplicationStatus::Submitted);
        assert_eq!(app.employer_id, 1);
        assert_eq!(app.application_id, 5);

        let dup = api.apply_for_job("jd45", 2).await.unwrap_err();
        assert!(matches!(dup, ApiError::ValidationFailed(_)));
        let closed = api.apply_for_job("jd45", 4).await.unwrap_err();
        assert!(matches!(closed, ApiError::ValidationFailed(_)));
        assert!(api.apply_for_job("nobody", 2).await.unwrap_err().is_not_found());

        let mine = api.get_student_applications("jd45").await.unwrap().data;
        assert_eq!(mine.len(), 3);
        let company = api.get_company_applications(1).await.unwrap().data;
        assert!(company.iter().all(|v| v.application.employer_id == 1));
    }

    #[tokio::test]
    async fn test_application_status_moves_forward_only() {
        let api = api();
        let app = api
            .update_application_status(1, ApplicationStatus::InterviewScheduled, Some("Tue 3pm".into()))
            .await
            .unwrap()
            .data;
        assert_eq!(app.status, ApplicationStatus::InterviewScheduled);
        assert_eq!(app.feedback.as_deref(), Some("Tue 3pm"));

        let err = api
            .update_application_status(1, ApplicationStatus::Submitted, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidTransition { .. }));

        let app = api
            .update_application_feedback(
                1,
                FeedbackUpdate {
                    feedback: "Bring a portfolio".into(),
                    status: None,
                },
            )
            .await
            .unwrap()
            .data;
        assert_eq!(app.status, ApplicationStatus::InterviewScheduled);
        assert_eq!(app.feedback.as_deref(), Some("Bring a portfolio"));
    }

    #[tokio::test]
    async fn test_detail_survives_deleted_job() {
        let api = api();
        api.delete_job(3).await.unwrap();
        let detail = api.get_application_detail(2).await.unwrap().data;
        assert_eq!(detail.job.title, NO_JOB_TITLE);
        assert_eq!(detail.company_name, "Garden State Financial");
        assert_eq!(detail.student_name, "Jane Doe");
    }

    #[tokio::test]
    async fn test_verification_decisions_mirror_onto_account() {
        let api = api();
        let subject = Subject::Student("ms23".into());
        let record = api.approve_verification(&subject, Some(1)).await.unwrap().data;
        assert_eq!(record.status, VerificationStatus::Approved);
        assert_eq!(record.vid, 2);
        assert_eq!(record.moderator_id, Some(1));
        let student = api.get_student_profile("ms23").await.unwrap().data;
        assert_eq!(student.verification_status, VerificationStatus::Approved);

        let err = api.reject_verification(&subject, Some(1), "").await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed(_)));

        let employer = Subject::Employer(3);
        api.reject_verification(&employer, Some(2), "Missing business license")
            .await
            .unwrap();
        let check = api.check_verification_status(&employer).await.unwrap().data;
        assert_eq!(check.status, VerificationStatus::Rejected);
        assert_eq!(check.feedback, "Missing business license");
        let account = api.get_employer(3).await.unwrap().data;
        assert_eq!(account.feedback.as_deref(), Some("Missing business license"));
    }

    #[tokio::test]
    async fn test_verification_of_missing_account() {
        let api = api();
        let ghost = Subject::Student("ghost".into());
        assert!(api.check_verification_status(&ghost).await.unwrap_err().is_not_found());
        assert!(api.approve_verification(&ghost, None).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_profile_update_keeps_verification() {
        let api = api();
        let patch = EmployerPatch {
            website: Some("https://technova.example.org".into()),
            ..EmployerPatch::default()
        };
        let employer = api.update_employer(1, patch).await.unwrap().data;
        assert_eq!(employer.verification_status, VerificationStatus::Approved);
        assert_eq!(employer.website.as_deref(), Some("https://technova.example.org"));
    }

    #[tokio::test]
    async fn test_profile_email_must_stay_unique() {
        let api = api();
        let taken = StudentPatch {
            email: Some("MS23@njit.edu".into()),
            ..StudentPatch::default()
        };
        let err = api.update_student_profile("jd45", taken).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed(_)));

        let own = StudentPatch {
            email: Some("jd45@njit.edu".into()),
            major: Some("Data Science".into()),
            ..StudentPatch::default()
        };
        let student = api.update_student_profile("jd45", own).await.unwrap().data;
        assert_eq!(student.major, "Data Science");

        let taken = EmployerPatch {
            email: Some("dw12@njit.edu".into()),
            ..EmployerPatch::default()
        };
        let err = api.update_employer(2, taken).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed(_)));
        assert_eq!(
            api.get_employer(2).await.unwrap().data.email,
            "recruiting@gsfinancial.example.com"
        );

        let creds = Credentials {
            email: "ms23@njit.edu".into(),
            password: "pw".into(),
        };
        let login = api.login(&creds).await.unwrap().data;
        assert_eq!(login.user.display_name(), "Marcus Smith");
    }

    #[tokio::test]
    async fn test_delete_job_and_comment_twice() {
        let api = api();
        assert!(api.delete_job(6).await.unwrap().data.existed);
        assert!(!api.delete_job(6).await.unwrap().data.existed);
        assert!(api.get_job(6).await.unwrap_err().is_not_found());

        assert!(api.delete_forum_comment(2).await.unwrap().data.existed);
        assert!(!api.delete_forum_comment(2).await.unwrap().data.existed);
        assert!(!api.delete_forum_comment(999).await.unwrap().data.existed);
        let thread = api.get_forum_comments(2).await.unwrap().data;
        assert!(thread.iter().all(|c| c.comment.comment_id != 2));
    }

    #[tokio::test]
    async fn test_upvote_count_saturates() {
        let api = api();
        {
            let mut f = api.write().await;
            store::get_mut(&mut f.forum_posts, &4).unwrap().upvotes = u32::MAX;
        }
        let post = api
            .upvote_forum_post(4, &Author::Student("pk7".into()))
            .await
            .unwrap()
            .data;
        assert_eq!(post.upvotes, u32::MAX);
    }

    #[tokio::test]
    async fn test_moderator_status() {
        let api = api();
        assert!(api.check_moderator_status(1).await.unwrap().data.is_moderator);
        let none = api.check_moderator_status(9).await.unwrap().data;
        assert!(!none.is_moderator);
        assert_eq!(none.moderator_id, None);
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_ids() {
        let api = api();
        let mut handles = Vec::new();
        for i in 0..8 {
            let api = api.clone();
            handles.push(tokio::spawn(async move {
                api.create_forum_post(post_by(Author::Moderator(1), &format!("post {}", i)))
                    .await
                    .unwrap()
                    .data
                    .post_id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }
}
