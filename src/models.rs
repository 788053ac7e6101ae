use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ApiError, Result};
use crate::status::{ApplicationStatus, JobStatus, VerificationStatus};

pub type Ucid = String;

// --- Accounts ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub ucid: Ucid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub major: String,
    pub graduation_year: Option<i32>,
    pub verification_status: VerificationStatus,
    pub feedback: Option<String>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employer {
    pub employer_id: i64,
    pub company_name: String,
    pub email: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub verification_status: VerificationStatus,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Moderator {
    pub moderator_id: i64,
    pub name: String,
    pub email: String,
}

// --- Jobs ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: i64,
    pub employer_id: i64,
    pub title: String,
    pub description: String,
    pub location: String,
    pub salary: f64,
    pub deadline: Option<NaiveDate>,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
    pub status: JobStatus,
    pub feedback: Option<String>,
    pub date_posted: Option<NaiveDate>,
}

impl Job {
    /// Status as seen by readers: an open posting whose deadline has passed
    /// reads as Closed. Never written back.
    pub fn effective_status(&self, today: NaiveDate) -> JobStatus {
        match (self.status, self.deadline) {
            (JobStatus::Pending | JobStatus::Active, Some(deadline)) if deadline < today => {
                JobStatus::Closed
            }
            (status, _) => status,
        }
    }

    pub fn with_effective_status(mut self, today: NaiveDate) -> Self {
        self.status = self.effective_status(today);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub employer_id: i64,
    pub title: String,
    pub description: String,
    pub location: String,
    pub salary: f64,
    pub deadline: Option<NaiveDate>,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub salary: Option<f64>,
    pub deadline: Option<NaiveDate>,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
}

// --- Applications ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub application_id: i64,
    pub applicant_ucid: Ucid,
    pub job_id: i64,
    pub employer_id: i64,
    pub status: ApplicationStatus,
    pub date_applied: Option<NaiveDate>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackUpdate {
    pub feedback: String,
    pub status: Option<ApplicationStatus>,
}

// --- Saved jobs ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedJob {
    pub saved_job_id: i64,
    pub ucid: Ucid,
    pub job_id: i64,
    pub date_saved: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub success: bool,
    pub is_saved: bool,
    pub already_saved: bool,
}

// --- Verifications ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Student,
    Employer,
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKind::Student => f.write_str("student"),
            AccountKind::Employer => f.write_str("employer"),
        }
    }
}

/// Whose account a verification record is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Subject {
    Student(Ucid),
    Employer(i64),
}

impl Subject {
    pub fn kind(&self) -> AccountKind {
        match self {
            Subject::Student(_) => AccountKind::Student,
            Subject::Employer(_) => AccountKind::Employer,
        }
    }

    /// Build a subject from a kind and the textual id a caller supplied.
    pub fn parse(kind: AccountKind, id: &str) -> Option<Self> {
        match kind {
            AccountKind::Student => Some(Subject::Student(id.to_string())),
            AccountKind::Employer => id.trim().parse().ok().map(Subject::Employer),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Student(ucid) => write!(f, "student {}", ucid),
            Subject::Employer(id) => write!(f, "employer #{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub vid: i64,
    pub subject: Subject,
    pub status: VerificationStatus,
    pub date: Option<NaiveDate>,
    pub moderator_id: Option<i64>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCheck {
    pub status: VerificationStatus,
    pub feedback: String,
}

// --- Forum ---

/// Who wrote a post or comment, or cast a vote. Exactly one kind of id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Author {
    Student(Ucid),
    Employer(i64),
    Moderator(i64),
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Author::Student(ucid) => write!(f, "student {}", ucid),
            Author::Employer(id) => write!(f, "employer #{}", id),
            Author::Moderator(id) => write!(f, "moderator #{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumPost {
    pub post_id: i64,
    pub author: Author,
    pub title: String,
    pub content: String,
    pub date_posted: Option<NaiveDate>,
    pub upvotes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub author: Author,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub comment_id: i64,
    pub post_id: i64,
    pub author: Author,
    pub content: String,
    pub date_posted: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub post_id: i64,
    pub author: Author,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upvote {
    pub upvote_id: i64,
    pub post_id: i64,
    pub voter: Author,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityScore {
    pub score: u32,
    pub post_count: u32,
    pub upvotes: u32,
    pub post_bonus: u32,
}

/// Posts beyond this many stop adding to the post bonus.
pub const POST_BONUS_CAP: u32 = 10;
pub const POINTS_PER_POST: u32 = 2;

impl CommunityScore {
    /// Score over an author's own posts: every upvote counts once, plus two
    /// points for each of the first ten posts.
    pub fn from_posts<'a>(posts: impl IntoIterator<Item = &'a ForumPost>) -> Self {
        let (post_count, upvotes) = posts
            .into_iter()
            .fold((0u32, 0u32), |(count, votes), post| {
                (count.saturating_add(1), votes.saturating_add(post.upvotes))
            });
        let post_bonus = post_count.min(POST_BONUS_CAP) * POINTS_PER_POST;
        Self {
            score: upvotes.saturating_add(post_bonus),
            post_count,
            upvotes,
            post_bonus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub existed: bool,
}

// --- Registration & profiles ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub ucid: Ucid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub major: String,
    pub graduation_year: Option<i32>,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployer {
    pub company_name: String,
    pub email: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub major: Option<String>,
    pub graduation_year: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployerPatch {
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
const UCID_PATTERN: &str = r"^[A-Za-z0-9]{1,8}$";

fn check_pattern(pattern: &str, value: &str, what: &str) -> Result<()> {
    let re = regex::Regex::new(pattern).map_err(|e| ApiError::Config(e.to_string()))?;
    if re.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ApiError::validation(format!("Invalid {}: '{}'", what, value)))
    }
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(ApiError::validation(format!("{} is required", what)))
    } else {
        Ok(())
    }
}

impl NewStudent {
    pub fn validate(&self) -> Result<()> {
        check_pattern(UCID_PATTERN, &self.ucid, "UCID")?;
        require(&self.first_name, "First name")?;
        require(&self.last_name, "Last name")?;
        check_pattern(EMAIL_PATTERN, &self.email, "email")?;
        require(&self.password, "Password")
    }
}

impl NewEmployer {
    pub fn validate(&self) -> Result<()> {
        require(&self.company_name, "Company name")?;
        check_pattern(EMAIL_PATTERN, &self.email, "email")?;
        require(&self.password, "Password")
    }
}

impl NewJob {
    pub fn validate(&self) -> Result<()> {
        require(&self.title, "Job title")?;
        if self.salary < 0.0 {
            return Err(ApiError::validation("Salary cannot be negative"));
        }
        Ok(())
    }
}

impl NewPost {
    pub fn validate(&self) -> Result<()> {
        require(&self.title, "Title")?;
        require(&self.content, "Content")
    }
}

impl NewComment {
    pub fn validate(&self) -> Result<()> {
        require(&self.content, "Comment")
    }
}

// --- Login ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Employer,
    Moderator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => f.write_str("student"),
            Role::Employer => f.write_str("employer"),
            Role::Moderator => f.write_str("moderator"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum UserProfile {
    Student(Student),
    Employer(Employer),
    Moderator(Moderator),
}

impl UserProfile {
    pub fn role(&self) -> Role {
        match self {
            UserProfile::Student(_) => Role::Student,
            UserProfile::Employer(_) => Role::Employer,
            UserProfile::Moderator(_) => Role::Moderator,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            UserProfile::Student(s) => s.full_name(),
            UserProfile::Employer(e) => e.company_name.clone(),
            UserProfile::Moderator(m) => m.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(upvotes: u32) -> ForumPost {
        ForumPost {
            post_id: 1,
            author: Author::Student("ab12".into()),
            title: "t".into(),
            content: "c".into(),
            date_posted: None,
            upvotes,
        }
    }

    #[test]
    fn test_community_score_example() {
        let posts = vec![post(2), post(0), post(5)];
        let score = CommunityScore::from_posts(&posts);
        assert_eq!(score.upvotes, 7);
        assert_eq!(score.post_count, 3);
        assert_eq!(score.post_bonus, 6);
        assert_eq!(score.score, 13);
    }

    #[test]
    fn test_community_score_bonus_capped() {
        let posts: Vec<ForumPost> = (0..14).map(|_| post(1)).collect();
        let score = CommunityScore::from_posts(&posts);
        assert_eq!(score.post_bonus, 20);
        assert_eq!(score.score, 34);
    }

    #[test]
    fn test_community_score_empty() {
        let none: Vec<ForumPost> = Vec::new();
        assert_eq!(CommunityScore::from_posts(&none), CommunityScore::default());
    }

    #[test]
    fn test_community_score_saturates() {
        let posts = vec![post(u32::MAX), post(7)];
        let score = CommunityScore::from_posts(&posts);
        assert_eq!(score.upvotes, u32::MAX);
        assert_eq!(score.score, u32::MAX);
        assert_eq!(score.post_count, 2);
    }

    #[test]
    fn test_effective_status_closes_after_deadline() {
        let job = Job {
            job_id: 1,
            employer_id: 1,
            title: "Intern".into(),
            description: String::new(),
            location: String::new(),
            salary: 0.0,
            deadline: NaiveDate::from_ymd_opt(2026, 3, 1),
            requirements: None,
            responsibilities: None,
            benefits: None,
            status: JobStatus::Active,
            feedback: None,
            date_posted: None,
        };
        let before = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        let on = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let after = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(job.effective_status(before), JobStatus::Active);
        assert_eq!(job.effective_status(on), JobStatus::Active);
        assert_eq!(job.effective_status(after), JobStatus::Closed);

        let rejected = Job { status: JobStatus::Rejected, ..job };
        assert_eq!(rejected.effective_status(after), JobStatus::Rejected);
    }

    #[test]
    fn test_subject_parse() {
        assert_eq!(
            Subject::parse(AccountKind::Employer, "3"),
            Some(Subject::Employer(3))
        );
        assert_eq!(Subject::parse(AccountKind::Employer, "abc"), None);
        assert_eq!(
            Subject::parse(AccountKind::Student, "jd45"),
            Some(Subject::Student("jd45".into()))
        );
    }

    #[test]
    fn test_registration_validation() {
        let mut student = NewStudent {
            ucid: "jd45".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: "jd45@njit.edu".into(),
            phone: String::new(),
            major: String::new(),
            graduation_year: None,
            password: "secret".into(),
        };
        assert!(student.validate().is_ok());

        student.ucid = "toolong123".into();
        assert!(matches!(student.validate(), Err(ApiError::ValidationFailed(_))));
        student.ucid = "ab-1".into();
        assert!(student.validate().is_err());
        student.ucid = "ab1".into();
        student.email = "not-an-email".into();
        assert!(student.validate().is_err());

        let employer = NewEmployer {
            company_name: "  ".into(),
            email: "hr@acme.example.com".into(),
            industry: None,
            website: None,
            location: None,
            description: None,
            password: "pw".into(),
        };
        assert!(employer.validate().is_err());
    }
}
