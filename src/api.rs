//! The data-access facade: one async interface, two backends, picked once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Backend, Config};
use crate::enrich::{
    ApplicationDetail, ApplicationView, CommentView, PostView, SavedJobView, VerificationEntry,
};
use crate::error::Result;
use crate::fixture::Fixture;
use crate::http::HttpApi;
use crate::mock::MockApi;
use crate::models::{
    AccountKind, Application, Author, Comment, CommunityScore, Credentials, DeleteOutcome,
    Employer, EmployerPatch, FeedbackUpdate, ForumPost, Job, JobPatch, LoginResponse, NewComment,
    NewEmployer, NewJob, NewPost, NewStudent, PostPatch, SaveOutcome, Student, StudentPatch,
    Subject, Verification, VerificationCheck,
};
use crate::query::{ApplicationFilter, JobFilter, Page, PostQuery};
use crate::status::{ApplicationStatus, VerificationStatus};

/// Every operation answers in the `{ data }` envelope the REST backend uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

pub type Reply<T> = Result<ApiResponse<T>>;

pub(crate) fn ok<T>(data: T) -> Reply<T> {
    Ok(ApiResponse::new(data))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeratorStatus {
    pub is_moderator: bool,
    pub moderator_id: Option<i64>,
}

// --- Facade trait ---

#[async_trait]
pub trait JobBoardApi: Send + Sync {
    fn backend(&self) -> Backend;

    /// Write any local state back to disk. Only the mock backend has any.
    async fn persist(&self) -> Result<()> {
        Ok(())
    }

    // Auth
    async fn login(&self, credentials: &Credentials) -> Reply<LoginResponse>;
    async fn register_student(&self, new: NewStudent) -> Reply<Student>;
    async fn register_employer(&self, new: NewEmployer) -> Reply<Employer>;
    async fn check_moderator_status(&self, moderator_id: i64) -> Reply<ModeratorStatus>;

    // Profiles
    async fn get_student_profile(&self, ucid: &str) -> Reply<Student>;
    async fn update_student_profile(&self, ucid: &str, patch: StudentPatch) -> Reply<Student>;
    async fn get_employers(&self) -> Reply<Vec<Employer>>;
    async fn get_employer(&self, employer_id: i64) -> Reply<Employer>;
    async fn update_employer(&self, employer_id: i64, patch: EmployerPatch) -> Reply<Employer>;

    // Jobs
    async fn get_jobs(&self, filter: &JobFilter) -> Reply<Vec<Job>>;
    async fn get_job(&self, job_id: i64) -> Reply<Job>;
    async fn create_job(&self, new: NewJob) -> Reply<Job>;
    async fn update_job(&self, job_id: i64, patch: JobPatch) -> Reply<Job>;
    async fn delete_job(&self, job_id: i64) -> Reply<DeleteOutcome>;
    async fn approve_job(&self, job_id: i64) -> Reply<Job>;
    async fn reject_job(&self, job_id: i64, feedback: &str) -> Reply<Job>;
    async fn close_job(&self, job_id: i64) -> Reply<Job>;
    async fn get_company_jobs(&self, employer_id: i64) -> Reply<Vec<Job>>;
    async fn get_pending_jobs(&self) -> Reply<Vec<Job>>;

    // Applications
    async fn get_applications(&self, filter: &ApplicationFilter) -> Reply<Vec<ApplicationView>>;
    async fn get_student_applications(&self, ucid: &str) -> Reply<Vec<ApplicationView>>;
    async fn get_company_applications(&self, employer_id: i64) -> Reply<Vec<ApplicationView>>;
    async fn get_application_detail(&self, application_id: i64) -> Reply<ApplicationDetail>;
    async fn apply_for_job(&self, ucid: &str, job_id: i64) -> Reply<Application>;
    async fn update_application_status(
        &self,
        application_id: i64,
        status: ApplicationStatus,
        feedback: Option<String>,
    ) -> Reply<Application>;
    async fn update_application_feedback(
        &self,
        application_id: i64,
        update: FeedbackUpdate,
    ) -> Reply<Application>;

    // Saved jobs
    async fn get_saved_jobs(&self, ucid: &str) -> Reply<Vec<SavedJobView>>;
    async fn save_job(&self, ucid: &str, job_id: i64) -> Reply<SaveOutcome>;
    async fn unsave_job(&self, ucid: &str, job_id: i64) -> Reply<DeleteOutcome>;
    async fn is_job_saved(&self, ucid: &str, job_id: i64) -> Reply<bool>;

    // Verifications
    async fn get_verifications(
        &self,
        kind: Option<AccountKind>,
        status: Option<VerificationStatus>,
    ) -> Reply<Vec<VerificationEntry>>;
    async fn check_verification_status(&self, subject: &Subject) -> Reply<VerificationCheck>;
    async fn approve_verification(
        &self,
        subject: &Subject,
        moderator_id: Option<i64>,
    ) -> Reply<Verification>;
    async fn reject_verification(
        &self,
        subject: &Subject,
        moderator_id: Option<i64>,
        feedback: &str,
    ) -> Reply<Verification>;

    // Forum
    async fn get_forum_posts(&self, query: &PostQuery) -> Reply<Page<PostView>>;
    async fn get_forum_post(&self, post_id: i64) -> Reply<PostView>;
    async fn create_forum_post(&self, new: NewPost) -> Reply<ForumPost>;
    async fn update_forum_post(&self, post_id: i64, patch: PostPatch) -> Reply<ForumPost>;
    async fn upvote_forum_post(&self, post_id: i64, voter: &Author) -> Reply<ForumPost>;
    async fn delete_forum_post(&self, post_id: i64) -> Reply<DeleteOutcome>;
    async fn get_forum_comments(&self, post_id: i64) -> Reply<Vec<CommentView>>;
    async fn create_forum_comment(&self, new: NewComment) -> Reply<Comment>;
    async fn delete_forum_comment(&self, comment_id: i64) -> Reply<DeleteOutcome>;
    async fn get_user_community_score(&self, author: &Author) -> Reply<CommunityScore>;
}

// --- Backend selection ---

/// Build the backend named by `config`. The mock backend starts from the
/// persisted store when one exists, else from the bundled seed data.
pub fn connect(config: &Config, token: Option<String>) -> Result<Box<dyn JobBoardApi>> {
    match config.backend {
        Backend::Mock => {
            let path = config.store_path();
            let fixture = if path.exists() {
                Fixture::load(&path)?
            } else {
                Fixture::seed()?
            };
            info!(store = %path.display(), "using mock backend");
            let api = MockApi::new(fixture)
                .with_latency_ms(config.mock_latency_ms)
                .persist_to(path);
            Ok(Box::new(api))
        }
        Backend::Http => {
            info!(url = %config.api_url, "using http backend");
            let api = HttpApi::new(&config.api_url, config.request_timeout_secs, token)?;
            Ok(Box::new(api))
        }
    }
}
