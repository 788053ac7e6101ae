//! The in-memory document the mock backend serves from.

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::models::{
    Application, Comment, Employer, ForumPost, Job, Moderator, SavedJob, Student, Upvote,
    Verification,
};
use crate::normalize;

const SEED: &str = include_str!("../fixtures/seed.json");

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub students: Vec<Student>,
    pub employers: Vec<Employer>,
    pub moderators: Vec<Moderator>,
    pub jobs: Vec<Job>,
    pub applications: Vec<Application>,
    pub saved_jobs: Vec<SavedJob>,
    pub verifications: Vec<Verification>,
    pub forum_posts: Vec<ForumPost>,
    pub upvotes: Vec<Upvote>,
    pub comments: Vec<Comment>,
}

impl Fixture {
    /// The demo data set shipped with the crate.
    ///
    /// Job deadlines are fixed calendar dates between 2026-08-01 and
    /// 2027-03-31, not offsets from the load time. Job 4 has already expired
    /// and the rest stay open until their own deadline, so once the clock
    /// passes 2027-03-31 every open seeded job reads as Closed.
    pub fn seed() -> Result<Self> {
        Self::from_json(SEED)
    }

    /// Parse a fixture document. Collection names and record fields may use
    /// either naming convention.
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&doc))
    }

    pub fn from_value(doc: &Value) -> Self {
        let section = |keys: &[&str]| -> &Value {
            keys.iter()
                .filter_map(|k| doc.get(*k))
                .find(|v| !v.is_null())
                .unwrap_or(&Value::Null)
        };

        let fixture = Self {
            students: normalize::many(section(&["Students", "students"]), normalize::student),
            employers: normalize::many(section(&["Employers", "employers"]), normalize::employer),
            moderators: normalize::many(section(&["Moderators", "moderators"]), normalize::moderator),
            jobs: normalize::many(section(&["Jobs", "jobs"]), normalize::job),
            applications: normalize::many(
                section(&["Applications", "applications"]),
                normalize::application,
            ),
            saved_jobs: normalize::many(section(&["SavedJobs", "savedJobs"]), normalize::saved_job),
            verifications: normalize::many_valid(
                section(&["Verifications", "verifications"]),
                "verification",
                normalize::verification,
            ),
            forum_posts: normalize::many_valid(
                section(&["ForumPosts", "forumPosts"]),
                "forum post",
                normalize::forum_post,
            ),
            upvotes: normalize::many_valid(section(&["Upvotes", "upvotes"]), "upvote", normalize::upvote),
            comments: normalize::many_valid(
                section(&["Comments", "comments"]),
                "comment",
                normalize::comment,
            ),
        };
        debug!(
            students = fixture.students.len(),
            employers = fixture.employers.len(),
            jobs = fixture.jobs.len(),
            posts = fixture.forum_posts.len(),
            "fixture loaded"
        );
        fixture
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Written in the canonical camelCase shape, which [`Fixture::load`] reads back.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Author;
    use chrono::NaiveDate;
    use crate::status::{JobStatus, VerificationStatus};

    #[test]
    fn test_seed_loads_every_collection() {
        let f = Fixture::seed().unwrap();
        assert!(!f.students.is_empty());
        assert!(!f.employers.is_empty());
        assert!(!f.moderators.is_empty());
        assert!(!f.jobs.is_empty());
        assert!(!f.applications.is_empty());
        assert!(!f.saved_jobs.is_empty());
        assert!(!f.verifications.is_empty());
        assert!(!f.forum_posts.is_empty());
        assert!(!f.upvotes.is_empty());
        assert!(!f.comments.is_empty());
    }

    #[test]
    fn test_seed_mixes_conventions() {
        let f = Fixture::seed().unwrap();
        // Employer 3 is written in PascalCase in the seed, employer 1 in camelCase.
        let pending = f.employers.iter().find(|e| e.employer_id == 3).unwrap();
        assert_eq!(pending.verification_status, VerificationStatus::Pending);
        let approved = f.employers.iter().find(|e| e.employer_id == 1).unwrap();
        assert_eq!(approved.verification_status, VerificationStatus::Approved);
        assert!(f.jobs.iter().all(|j| j.job_id > 0 && !j.title.is_empty()));
    }

    #[test]
    fn test_seed_deadlines_span_known_window() {
        let f = Fixture::seed().unwrap();
        let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let deadlines: Vec<NaiveDate> = f.jobs.iter().filter_map(|j| j.deadline).collect();
        assert_eq!(deadlines.iter().min(), Some(&date("2026-08-01")));
        assert_eq!(deadlines.iter().max(), Some(&date("2027-03-31")));

        let closed_on = |today: NaiveDate| {
            f.jobs
                .iter()
                .filter(|j| j.effective_status(today) == JobStatus::Closed)
                .map(|j| j.job_id)
                .collect::<Vec<_>>()
        };
        assert_eq!(closed_on(date("2026-10-15")), vec![4, 7]);
        // Only the rejected posting keeps its own status past the window.
        assert_eq!(closed_on(date("2027-04-01")), vec![1, 2, 3, 4, 5, 7]);
    }

    #[test]
    fn test_pascal_case_collection_names() {
        let text = r#"{
            "Jobs": [{ "JobID": 1, "Employer": 1, "JobTitle": "Intern", "Status": "Pending" }],
            "ForumPosts": [{ "PostID": 1, "AuthorUCID": "ab12", "Content": "hi" }]
        }"#;
        let f = Fixture::from_json(text).unwrap();
        assert_eq!(f.jobs[0].status, JobStatus::Pending);
        assert_eq!(f.forum_posts[0].author, Author::Student("ab12".into()));
        assert!(f.students.is_empty());
    }

    #[test]
    fn test_save_then_load_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let f = Fixture::seed().unwrap();
        f.save(&path).unwrap();
        let loaded = Fixture::load(&path).unwrap();
        assert_eq!(loaded, f);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(Fixture::from_json("{ nope").is_err());
    }
}
