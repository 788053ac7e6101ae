//! Joins records with the entities they reference and fills in display text.
//!
//! Every lookup is a linear scan over the borrowed collections. A missing
//! referent never fails an operation: the view carries a fallback string and
//! a warning is logged.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::fixture::Fixture;
use crate::models::{
    AccountKind, Application, Author, Comment, Employer, ForumPost, Job, Moderator, SavedJob,
    Student, Subject, Verification,
};
use crate::query::{self, FORUM_PAGE_SIZE, Page, PostQuery, SortKey};
use crate::status::{JobStatus, VerificationStatus};

pub const NO_COMPANY: &str = "Company Name Not Available";
pub const NO_JOB_TITLE: &str = "Job Title Not Available";
pub const UNKNOWN_STUDENT: &str = "Unknown Student";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const NO_DEADLINE: &str = "No deadline";
pub const NO_INDUSTRY: &str = "Not specified";

// --- Views ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: i64,
    pub title: String,
    pub company_name: String,
    pub industry: String,
    pub location: String,
    pub salary: f64,
    pub deadline: String,
    pub status: Option<JobStatus>,
}

/// One row of an application list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: Application,
    pub job_title: String,
    pub company_name: String,
    pub student_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: Application,
    pub student: Option<Student>,
    pub student_name: String,
    pub job: JobSummary,
    pub company_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedJobView {
    #[serde(flatten)]
    pub saved: SavedJob,
    pub job: JobSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationEntry {
    #[serde(flatten)]
    pub verification: Verification,
    pub display_name: String,
    pub email: String,
    pub student: Option<Student>,
    pub employer: Option<Employer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: ForumPost,
    pub author_name: String,
    pub company_name: Option<String>,
    pub comment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_name: String,
    pub company_name: Option<String>,
}

pub fn deadline_text(deadline: Option<NaiveDate>) -> String {
    deadline.map_or_else(|| NO_DEADLINE.to_string(), |d| d.format("%Y-%m-%d").to_string())
}

// --- Lookup ---

/// Borrowed reference collections to join against.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    pub students: &'a [Student],
    pub employers: &'a [Employer],
    pub moderators: &'a [Moderator],
    pub jobs: &'a [Job],
    pub today: NaiveDate,
}

impl<'a> Lookup<'a> {
    pub fn new(fixture: &'a Fixture, today: NaiveDate) -> Self {
        Self {
            students: &fixture.students,
            employers: &fixture.employers,
            moderators: &fixture.moderators,
            jobs: &fixture.jobs,
            today,
        }
    }

    pub fn student(&self, ucid: &str) -> Option<&'a Student> {
        self.students.iter().find(|s| s.ucid == ucid)
    }

    pub fn employer(&self, employer_id: i64) -> Option<&'a Employer> {
        self.employers.iter().find(|e| e.employer_id == employer_id)
    }

    pub fn job(&self, job_id: i64) -> Option<&'a Job> {
        self.jobs.iter().find(|j| j.job_id == job_id)
    }

    pub fn company_name(&self, employer_id: i64) -> String {
        match self.employer(employer_id) {
            Some(e) if !e.company_name.is_empty() => e.company_name.clone(),
            _ => {
                warn!(employer_id, "employer missing, using fallback company name");
                NO_COMPANY.to_string()
            }
        }
    }

    pub fn job_title(&self, job_id: i64) -> String {
        match self.job(job_id) {
            Some(j) if !j.title.is_empty() => j.title.clone(),
            _ => {
                warn!(job_id, "job missing, using fallback title");
                NO_JOB_TITLE.to_string()
            }
        }
    }

    pub fn student_name(&self, ucid: &str) -> String {
        match self.student(ucid).map(Student::full_name) {
            Some(name) if !name.is_empty() => name,
            _ => {
                warn!(ucid, "student missing, using fallback name");
                UNKNOWN_STUDENT.to_string()
            }
        }
    }

    pub fn author_name(&self, author: &Author) -> String {
        let name = match author {
            Author::Student(ucid) => self.student(ucid).map(Student::full_name),
            Author::Employer(id) => self.employer(*id).map(|e| e.company_name.clone()),
            Author::Moderator(id) => self
                .moderators
                .iter()
                .find(|m| m.moderator_id == *id)
                .map(|m| m.name.clone()),
        };
        match name {
            Some(name) if !name.is_empty() => name,
            _ => {
                warn!(%author, "author missing, using fallback name");
                UNKNOWN_AUTHOR.to_string()
            }
        }
    }

    /// Only employer authors have a company.
    pub fn author_company(&self, author: &Author) -> Option<String> {
        match author {
            Author::Employer(id) => Some(self.company_name(*id)),
            _ => None,
        }
    }

    pub fn job_summary(&self, job_id: i64) -> JobSummary {
        match self.job(job_id) {
            Some(job) => {
                let industry = self
                    .employer(job.employer_id)
                    .and_then(|e| e.industry.clone())
                    .filter(|i| !i.is_empty())
                    .unwrap_or_else(|| NO_INDUSTRY.to_string());
                JobSummary {
                    job_id,
                    title: self.job_title(job_id),
                    company_name: self.company_name(job.employer_id),
                    industry,
                    location: job.location.clone(),
                    salary: job.salary,
                    deadline: deadline_text(job.deadline),
                    status: Some(job.effective_status(self.today)),
                }
            }
            None => {
                warn!(job_id, "job missing, using fallback summary");
                JobSummary {
                    job_id,
                    title: NO_JOB_TITLE.to_string(),
                    company_name: NO_COMPANY.to_string(),
                    industry: NO_INDUSTRY.to_string(),
                    location: String::new(),
                    salary: 0.0,
                    deadline: NO_DEADLINE.to_string(),
                    status: None,
                }
            }
        }
    }

    // --- Builders ---

    pub fn application_view(&self, app: &Application) -> ApplicationView {
        ApplicationView {
            application: app.clone(),
            job_title: self.job_title(app.job_id),
            company_name: self.company_name(app.employer_id),
            student_name: self.student_name(&app.applicant_ucid),
        }
    }

    pub fn application_detail(&self, app: &Application) -> ApplicationDetail {
        ApplicationDetail {
            application: app.clone(),
            student: self.student(&app.applicant_ucid).cloned(),
            student_name: self.student_name(&app.applicant_ucid),
            job: self.job_summary(app.job_id),
            company_name: self.company_name(app.employer_id),
        }
    }

    pub fn saved_job_view(&self, saved: &SavedJob) -> SavedJobView {
        SavedJobView {
            saved: saved.clone(),
            job: self.job_summary(saved.job_id),
        }
    }

    /// `None` when the subject account no longer exists.
    pub fn verification_entry(&self, v: &Verification) -> Option<VerificationEntry> {
        let entry = match &v.subject {
            Subject::Student(ucid) => {
                let student = self.student(ucid)?;
                VerificationEntry {
                    verification: v.clone(),
                    display_name: student.full_name(),
                    email: student.email.clone(),
                    student: Some(student.clone()),
                    employer: None,
                }
            }
            Subject::Employer(id) => {
                let employer = self.employer(*id)?;
                VerificationEntry {
                    verification: v.clone(),
                    display_name: employer.company_name.clone(),
                    email: employer.email.clone(),
                    student: None,
                    employer: Some(employer.clone()),
                }
            }
        };
        Some(entry)
    }

    pub fn post_view(&self, post: &ForumPost, comment_count: usize) -> PostView {
        PostView {
            post: post.clone(),
            author_name: self.author_name(&post.author),
            company_name: self.author_company(&post.author),
            comment_count,
        }
    }

    pub fn comment_view(&self, comment: &Comment) -> CommentView {
        CommentView {
            comment: comment.clone(),
            author_name: self.author_name(&comment.author),
            company_name: self.author_company(&comment.author),
        }
    }
}

// --- Composite listings ---

/// Verification queue, newest first, optionally narrowed by account kind and
/// status. Entries whose subject is gone are dropped.
pub fn verification_queue(
    verifications: &[Verification],
    kind: Option<AccountKind>,
    status: Option<VerificationStatus>,
    lookup: &Lookup<'_>,
) -> Vec<VerificationEntry> {
    let mut entries: Vec<VerificationEntry> = verifications
        .iter()
        .filter(|v| kind.is_none_or(|k| v.subject.kind() == k))
        .filter(|v| status.is_none_or(|s| v.status == s))
        .filter_map(|v| {
            let entry = lookup.verification_entry(v);
            if entry.is_none() {
                warn!(vid = v.vid, subject = %v.subject, "verification subject missing, skipping");
            }
            entry
        })
        .collect();
    query::sort_recent(&mut entries, |e| e.verification.date);
    entries
}

/// Filter, sort and page forum posts into views.
pub fn post_page(
    posts: &[ForumPost],
    comments: &[Comment],
    lookup: &Lookup<'_>,
    q: &PostQuery,
) -> Page<PostView> {
    let keyword = q
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    let mut views: Vec<PostView> = posts
        .iter()
        .filter(|p| q.author.as_ref().is_none_or(|a| p.author == *a))
        .map(|p| {
            let count = comments.iter().filter(|c| c.post_id == p.post_id).count();
            lookup.post_view(p, count)
        })
        .filter(|v| {
            keyword.is_none_or(|k| {
                query::contains_ignore_case(&v.post.title, k)
                    || query::contains_ignore_case(&v.post.content, k)
                    || query::contains_ignore_case(&v.author_name, k)
            })
        })
        .collect();

    match q.sort {
        SortKey::Recent => query::sort_recent(&mut views, |v| v.post.date_posted),
        SortKey::Popular => query::sort_popular(&mut views, |v| v.post.upvotes),
    }

    match q.page {
        Some(page) => Page::of(&views, FORUM_PAGE_SIZE, page),
        None => Page::single(views),
    }
}

/// Comments on one post, oldest first.
pub fn comment_thread(comments: &[Comment], post_id: i64, lookup: &Lookup<'_>) -> Vec<CommentView> {
    let mut thread: Vec<CommentView> = comments
        .iter()
        .filter(|c| c.post_id == post_id)
        .map(|c| lookup.comment_view(c))
        .collect();
    thread.sort_by_key(|c| c.comment.date_posted);
    thread
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn seed() -> Fixture {
        Fixture::seed().unwrap()
    }

    fn application(job_id: i64, employer_id: i64, ucid: &str) -> Application {
        Application {
            application_id: 50,
            applicant_ucid: ucid.to_string(),
            job_id,
            employer_id,
            status: crate::status::ApplicationStatus::Submitted,
            date_applied: None,
            feedback: None,
        }
    }

    #[test]
    fn test_application_view_joins_names() {
        let f = seed();
        let lookup = Lookup::new(&f, today());
        let view = lookup.application_view(&application(1, 1, "jd45"));
        assert_eq!(view.job_title, "Software Engineer Intern");
        assert_eq!(view.company_name, "TechNova Solutions");
        assert_eq!(view.student_name, "Jane Doe");
    }

    #[test]
    fn test_missing_referents_use_fallbacks() {
        let f = seed();
        let lookup = Lookup::new(&f, today());
        let view = lookup.application_view(&application(999, 999, "nobody"));
        assert_eq!(view.job_title, NO_JOB_TITLE);
        assert_eq!(view.company_name, NO_COMPANY);
        assert_eq!(view.student_name, UNKNOWN_STUDENT);

        let detail = lookup.application_detail(&application(999, 999, "nobody"));
        assert!(detail.student.is_none());
        assert_eq!(detail.job.deadline, NO_DEADLINE);
        assert_eq!(detail.job.industry, NO_INDUSTRY);
        assert_eq!(detail.job.status, None);
    }

    #[test]
    fn test_job_summary_reads_effective_status() {
        let f = seed();
        let lookup = Lookup::new(&f, today());
        // Job 4's deadline has passed.
        let summary = lookup.job_summary(4);
        assert_eq!(summary.status, Some(JobStatus::Closed));
        assert_eq!(summary.deadline, "2026-08-01");
        assert_eq!(summary.industry, "Finance");
    }

    #[test]
    fn test_unknown_author() {
        let f = seed();
        let lookup = Lookup::new(&f, today());
        assert_eq!(lookup.author_name(&Author::Moderator(77)), UNKNOWN_AUTHOR);
        assert_eq!(lookup.author_name(&Author::Moderator(1)), "Dana Whitfield");
        assert_eq!(
            lookup.author_company(&Author::Employer(2)).as_deref(),
            Some("Garden State Financial")
        );
        assert_eq!(lookup.author_company(&Author::Student("jd45".into())), None);
    }

    #[test]
    fn test_verification_queue_skips_missing_subjects() {
        let mut f = seed();
        f.students.retain(|s| s.ucid != "ms23");
        let lookup = Lookup::new(&f, today());
        let pending = verification_queue(
            &f.verifications,
            None,
            Some(VerificationStatus::Pending),
            &lookup,
        );
        assert!(pending.iter().all(|e| e.verification.status == VerificationStatus::Pending));
        assert!(
            pending
                .iter()
                .all(|e| e.verification.subject != Subject::Student("ms23".into()))
        );
        let employers = verification_queue(&f.verifications, Some(AccountKind::Employer), None, &lookup);
        assert!(employers.iter().all(|e| e.employer.is_some()));
        assert!(!employers.is_empty());
    }

    #[test]
    fn test_post_page_keyword_matches_author_name() {
        let f = seed();
        let lookup = Lookup::new(&f, today());
        let q = PostQuery {
            keyword: Some("technova".into()),
            ..PostQuery::default()
        };
        let page = post_page(&f.forum_posts, &f.comments, &lookup, &q);
        assert!(!page.items.is_empty());
        assert!(page.items.iter().all(|v| {
            v.author_name.to_lowercase().contains("technova")
                || v.post.title.to_lowercase().contains("technova")
                || v.post.content.to_lowercase().contains("technova")
        }));
    }

    #[test]
    fn test_post_page_sorts_and_pages() {
        let f = seed();
        let lookup = Lookup::new(&f, today());
        let popular = PostQuery {
            sort: SortKey::Popular,
            page: Some(1),
            ..PostQuery::default()
        };
        let page = post_page(&f.forum_posts, &f.comments, &lookup, &popular);
        assert_eq!(page.items.len(), FORUM_PAGE_SIZE.min(f.forum_posts.len()));
        let votes: Vec<u32> = page.items.iter().map(|v| v.post.upvotes).collect();
        assert!(votes.windows(2).all(|w| w[0] >= w[1]));

        let recent = post_page(&f.forum_posts, &f.comments, &lookup, &PostQuery::default());
        assert_eq!(recent.total_items, f.forum_posts.len());
        let dates: Vec<_> = recent.items.iter().map(|v| v.post.date_posted).collect();
        assert!(dates.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_comment_thread_counts() {
        let f = seed();
        let lookup = Lookup::new(&f, today());
        let thread = comment_thread(&f.comments, 1, &lookup);
        let expected = f.comments.iter().filter(|c| c.post_id == 1).count();
        assert_eq!(thread.len(), expected);
        let page = post_page(&f.forum_posts, &f.comments, &lookup, &PostQuery::default());
        let post_one = page.items.iter().find(|v| v.post.post_id == 1).unwrap();
        assert_eq!(post_one.comment_count, expected);
    }
}
