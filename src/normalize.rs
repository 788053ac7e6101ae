//! Boundary adapter between the two field-naming conventions.
//!
//! The REST backend speaks PascalCase (`JobTitle`, `EmployerID`), older
//! fixtures and frontend code speak camelCase (`jobTitle`, `employerId`).
//! Each function here maps one raw JSON record onto the canonical struct:
//! for every field the PascalCase key wins when present and non-null, then
//! the camelCase key, then a default (`""`, `0`, `None`). Nothing in here
//! fails except the author/subject rules on forum records and verifications,
//! which must name exactly one owner.
//!
//! Account records also accept the snake_case keys of the login payload
//! (`first_name`, `company_name`) as a last resort.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ApiError, Result};
use crate::models::{
    Application, Author, Comment, Employer, ForumPost, Job, Moderator, SavedJob, Student,
    Subject, Upvote, Verification,
};
use crate::status::{ApplicationStatus, JobStatus, VerificationStatus};

/// Read access to one raw record, trying keys in order.
pub struct Fields<'a> {
    obj: Option<&'a Map<String, Value>>,
}

impl<'a> Fields<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self {
            obj: value.as_object(),
        }
    }

    fn raw(&self, keys: &[&str]) -> Option<&'a Value> {
        let obj = self.obj?;
        keys.iter()
            .filter_map(|k| obj.get(*k))
            .find(|v| !v.is_null())
    }

    pub fn string(&self, keys: &[&str]) -> String {
        self.opt_string(keys).unwrap_or_default()
    }

    /// Text field; an empty string counts as absent.
    pub fn opt_string(&self, keys: &[&str]) -> Option<String> {
        let obj = self.obj?;
        keys.iter()
            .filter_map(|k| obj.get(*k))
            .filter_map(value_to_string)
            .find(|s| !s.is_empty())
    }

    pub fn int(&self, keys: &[&str]) -> i64 {
        self.opt_int(keys).unwrap_or(0)
    }

    pub fn opt_int(&self, keys: &[&str]) -> Option<i64> {
        match self.raw(keys)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            _ => None,
        }
    }

    pub fn float(&self, keys: &[&str]) -> f64 {
        match self.raw(keys) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().replace(',', "").parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// `YYYY-MM-DD`, or the date part of an ISO-8601 timestamp.
    pub fn date(&self, keys: &[&str]) -> Option<NaiveDate> {
        let s = self.raw(keys)?.as_str()?;
        let day = s.get(..10).unwrap_or(s);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }

    pub fn status<T>(&self, keys: &[&str], parse: impl Fn(&str) -> Option<T>, default: T) -> T {
        self.opt_string(keys)
            .and_then(|s| parse(&s))
            .unwrap_or(default)
    }

    fn object(&self, key: &str) -> Option<&'a Value> {
        self.obj?.get(key).filter(|v| v.is_object())
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// --- Accounts ---

pub fn student(value: &Value) -> Student {
    let f = Fields::new(value);
    let mut first_name = f.string(&["FName", "FirstName", "firstName", "first_name"]);
    let mut last_name = f.string(&["LName", "LastName", "lastName", "last_name"]);
    if first_name.is_empty() && last_name.is_empty() {
        let name = f.string(&["Name", "name"]);
        let (first, last) = name.split_once(' ').unwrap_or((name.as_str(), ""));
        first_name = first.to_string();
        last_name = last.trim().to_string();
    }
    Student {
        ucid: f.string(&["UCID", "ucid"]),
        first_name,
        last_name,
        email: f.string(&["Email", "email"]),
        phone: f.string(&["Phone", "phone"]),
        major: f.string(&["Major", "major"]),
        graduation_year: f.opt_int(&["GraduationYear", "graduationYear", "graduation_year"]).map(|y| y as i32),
        verification_status: f.status(
            &["VerificationStatus", "verificationStatus"],
            VerificationStatus::parse_account,
            VerificationStatus::Pending,
        ),
        feedback: f.opt_string(&["Feedback", "feedback"]),
    }
}

pub fn employer(value: &Value) -> Employer {
    let f = Fields::new(value);
    Employer {
        employer_id: f.int(&["EmployerID", "employerId", "employer_id"]),
        company_name: f.string(&["CompanyName", "companyName", "company_name"]),
        email: f.string(&["Email", "email"]),
        industry: f.opt_string(&["Industry", "industry"]),
        website: f.opt_string(&["Website", "website"]),
        location: f.opt_string(&["Location", "location"]),
        description: f.opt_string(&["Description", "description"]),
        verification_status: f.status(
            &["VerificationStatus", "verificationStatus"],
            VerificationStatus::parse_account,
            VerificationStatus::Pending,
        ),
        feedback: f.opt_string(&["Feedback", "feedback"]),
    }
}

pub fn moderator(value: &Value) -> Moderator {
    let f = Fields::new(value);
    Moderator {
        moderator_id: f.int(&["ModeratorID", "moderatorId", "moderator_id"]),
        name: f.string(&["Name", "name"]),
        email: f.string(&["Email", "email"]),
    }
}

// --- Jobs & applications ---

/// Jobs with no status on record read as Active; the backend table predates
/// moderation.
pub fn job(value: &Value) -> Job {
    let f = Fields::new(value);
    Job {
        job_id: f.int(&["JobID", "jobId"]),
        employer_id: f.int(&["Employer", "EmployerID", "employerId"]),
        title: f.string(&["JobTitle", "Title", "jobTitle", "title"]),
        description: f.string(&["Description", "description"]),
        location: f.string(&["Location", "location"]),
        salary: f.float(&["Salary", "salary"]),
        deadline: f.date(&["Deadline", "deadline"]),
        requirements: f.opt_string(&["Requirements", "requirements"]),
        responsibilities: f.opt_string(&["Responsibilities", "responsibilities"]),
        benefits: f.opt_string(&["Benefits", "benefits"]),
        status: f.status(&["Status", "status"], |s| s.parse().ok(), JobStatus::Active),
        feedback: f.opt_string(&["Feedback", "feedback"]),
        date_posted: f.date(&["DatePosted", "datePosted"]),
    }
}

pub fn application(value: &Value) -> Application {
    let f = Fields::new(value);
    Application {
        application_id: f.int(&["ApplicationID", "applicationId"]),
        applicant_ucid: f.string(&["ApplicantUCID", "applicantUcid"]),
        job_id: f.int(&["JobID", "Job", "jobId"]),
        employer_id: f.int(&["EmployerID", "Employer", "employerId"]),
        status: f.status(
            &["Status", "status"],
            |s| s.parse().ok(),
            ApplicationStatus::Submitted,
        ),
        date_applied: f.date(&["DateApplied", "dateApplied"]),
        feedback: f.opt_string(&["Feedback", "feedback"]),
    }
}

pub fn saved_job(value: &Value) -> SavedJob {
    let f = Fields::new(value);
    SavedJob {
        saved_job_id: f.int(&["SavedJobID", "savedJobId"]),
        ucid: f.string(&["UCID", "ucid"]),
        job_id: f.int(&["JobID", "jobId"]),
        date_saved: f.date(&["DateSaved", "dateSaved"]),
    }
}

// --- Verifications ---

pub fn verification(value: &Value) -> Result<Verification> {
    let f = Fields::new(value);
    let subject = match f.object("subject") {
        Some(raw) => serde_json::from_value::<Subject>(raw.clone())?,
        None => {
            let student = f.opt_string(&["ApplicantUCID", "applicantUcid"]);
            let employer = f.opt_int(&["EmployerID", "employerId"]);
            match (student, employer) {
                (Some(ucid), None) => Subject::Student(ucid),
                (None, Some(id)) => Subject::Employer(id),
                _ => {
                    return Err(ApiError::validation(
                        "verification must reference exactly one student or employer",
                    ));
                }
            }
        }
    };
    Ok(Verification {
        vid: f.int(&["VID", "vid"]),
        subject,
        status: f.status(
            &["VerificationStatus", "verificationStatus", "status"],
            VerificationStatus::parse_account,
            VerificationStatus::Pending,
        ),
        date: f.date(&["VerificationDate", "verificationDate", "date"]),
        moderator_id: f.opt_int(&["ModeratorID", "moderatorId"]),
        feedback: f.opt_string(&["Feedback", "feedback"]),
    })
}

// --- Forum ---

struct OwnerKeys {
    nested: &'static str,
    student: &'static [&'static str],
    employer: &'static [&'static str],
    moderator: &'static [&'static str],
}

const AUTHOR_KEYS: OwnerKeys = OwnerKeys {
    nested: "author",
    student: &["AuthorUCID", "VUCID", "authorUcid"],
    employer: &["AuthorEmployerID", "authorEmployerId"],
    moderator: &["AuthorModeratorID", "authorModeratorId"],
};

const VOTER_KEYS: OwnerKeys = OwnerKeys {
    nested: "voter",
    student: &["VoterUCID", "voterUcid"],
    employer: &["VoterEmployerID", "voterEmployerId"],
    moderator: &["VoterModeratorID", "voterModeratorId"],
};

fn owner(f: &Fields<'_>, keys: &OwnerKeys) -> Result<Author> {
    if let Some(raw) = f.object(keys.nested) {
        return Ok(serde_json::from_value(raw.clone())?);
    }
    let mut found = Vec::with_capacity(1);
    if let Some(ucid) = f.opt_string(keys.student) {
        found.push(Author::Student(ucid));
    }
    if let Some(id) = f.opt_int(keys.employer) {
        found.push(Author::Employer(id));
    }
    if let Some(id) = f.opt_int(keys.moderator) {
        found.push(Author::Moderator(id));
    }
    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(ApiError::validation(format!("{} is missing", keys.nested))),
        _ => Err(ApiError::validation(format!(
            "{} must be exactly one of student, employer or moderator",
            keys.nested
        ))),
    }
}

pub fn forum_post(value: &Value) -> Result<ForumPost> {
    let f = Fields::new(value);
    Ok(ForumPost {
        post_id: f.int(&["PostID", "ForumPostID", "postId", "forumPostId"]),
        author: owner(&f, &AUTHOR_KEYS)?,
        title: f.string(&["Title", "title"]),
        content: f.string(&["Content", "content"]),
        date_posted: f.date(&["DatePosted", "Date", "datePosted", "date"]),
        upvotes: u32::try_from(f.int(&["Upvotes", "upvotes"]).max(0)).unwrap_or(u32::MAX),
    })
}

pub fn comment(value: &Value) -> Result<Comment> {
    let f = Fields::new(value);
    Ok(Comment {
        comment_id: f.int(&["CommentID", "commentId"]),
        post_id: f.int(&["PostID", "ForumPostID", "postId", "forumPostId"]),
        author: owner(&f, &AUTHOR_KEYS)?,
        content: f.string(&["Content", "content"]),
        date_posted: f.date(&["DatePosted", "Date", "datePosted", "date"]),
    })
}

pub fn upvote(value: &Value) -> Result<Upvote> {
    let f = Fields::new(value);
    Ok(Upvote {
        upvote_id: f.int(&["UpvoteID", "upvoteId"]),
        post_id: f.int(&["PostID", "ForumPostID", "postId", "forumPostId"]),
        voter: owner(&f, &VOTER_KEYS)?,
    })
}

// --- Collections ---

/// Records of a list response: a bare array, or a paginated
/// `{ "results": [...] }` page.
pub fn records(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => obj
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

pub fn many<T>(value: &Value, map: impl Fn(&Value) -> T) -> Vec<T> {
    records(value).iter().map(map).collect()
}

/// Like [`many`] for record kinds that can be malformed; bad records are
/// logged and skipped.
pub fn many_valid<T>(value: &Value, what: &str, map: impl Fn(&Value) -> Result<T>) -> Vec<T> {
    records(value)
        .iter()
        .filter_map(|raw| match map(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(kind = what, error = %e, "skipping malformed record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pascal_case_wins_over_camel_case() {
        let raw = json!({
            "JobID": 4,
            "jobId": 99,
            "JobTitle": "Data Analyst",
            "jobTitle": "ignored",
            "employerId": 2
        });
        let job = job(&raw);
        assert_eq!(job.job_id, 4);
        assert_eq!(job.title, "Data Analyst");
        assert_eq!(job.employer_id, 2);
    }

    #[test]
    fn test_null_pascal_falls_through_to_camel() {
        let raw = json!({ "CompanyName": null, "companyName": "Acme" });
        assert_eq!(employer(&raw).company_name, "Acme");
    }

    #[test]
    fn test_missing_fields_default() {
        let job = job(&json!({}));
        assert_eq!(job.job_id, 0);
        assert_eq!(job.title, "");
        assert_eq!(job.salary, 0.0);
        assert_eq!(job.deadline, None);
        assert_eq!(job.status, JobStatus::Active);

        let app = application(&json!("not an object"));
        assert_eq!(app.application_id, 0);
        assert_eq!(app.status, ApplicationStatus::Submitted);
    }

    #[test]
    fn test_lenient_numbers_and_dates() {
        let raw = json!({
            "Salary": "72,500.00",
            "Deadline": "2027-05-01T00:00:00Z",
            "Employer": "3"
        });
        let job = job(&raw);
        assert_eq!(job.salary, 72500.0);
        assert_eq!(job.deadline, NaiveDate::from_ymd_opt(2027, 5, 1));
        assert_eq!(job.employer_id, 3);
    }

    #[test]
    fn test_student_name_fallback_and_verified() {
        let raw = json!({
            "ucid": "jd45",
            "name": "Jane Doe",
            "verificationStatus": "Verified",
            "GraduationYear": 2027
        });
        let s = student(&raw);
        assert_eq!(s.first_name, "Jane");
        assert_eq!(s.last_name, "Doe");
        assert_eq!(s.verification_status, VerificationStatus::Approved);
        assert_eq!(s.graduation_year, Some(2027));
    }

    #[test]
    fn test_numeric_ucid_becomes_string() {
        let app = application(&json!({ "ApplicantUCID": 31234 }));
        assert_eq!(app.applicant_ucid, "31234");
    }

    #[test]
    fn test_post_requires_exactly_one_author() {
        let ok = forum_post(&json!({ "postId": 1, "authorEmployerId": 2, "upvotes": 3 })).unwrap();
        assert_eq!(ok.author, Author::Employer(2));
        assert_eq!(ok.upvotes, 3);

        assert!(forum_post(&json!({ "postId": 1 })).is_err());
        assert!(forum_post(&json!({ "authorUcid": "ab1", "authorModeratorId": 1 })).is_err());
    }

    #[test]
    fn test_upvotes_clamp_to_u32() {
        let huge = forum_post(&json!({ "PostID": 1, "AuthorUCID": "ab1", "Upvotes": 5_000_000_000i64 })).unwrap();
        assert_eq!(huge.upvotes, u32::MAX);
        let negative = forum_post(&json!({ "PostID": 2, "AuthorUCID": "ab1", "Upvotes": -4 })).unwrap();
        assert_eq!(negative.upvotes, 0);
    }

    #[test]
    fn test_post_reads_canonical_author() {
        let raw = json!({ "postId": 5, "author": { "type": "moderator", "id": 1 } });
        assert_eq!(forum_post(&raw).unwrap().author, Author::Moderator(1));
    }

    #[test]
    fn test_verification_subject() {
        let v = verification(&json!({ "VID": 2, "EmployerID": 3, "VerificationStatus": "Pending" })).unwrap();
        assert_eq!(v.subject, Subject::Employer(3));
        let v = verification(&json!({ "vid": 3, "subject": { "kind": "student", "id": "ab12" } })).unwrap();
        assert_eq!(v.subject, Subject::Student("ab12".into()));
        assert!(verification(&json!({ "VID": 4 })).is_err());
    }

    #[test]
    fn test_records_accepts_paginated_page() {
        let page = json!({ "count": 1, "results": [{ "JobID": 1 }] });
        assert_eq!(many(&page, job).len(), 1);
        assert!(records(&json!(null)).is_empty());
    }

    #[test]
    fn test_many_valid_skips_bad_records() {
        let raw = json!([{ "postId": 1, "authorUcid": "ab1" }, { "postId": 2 }]);
        let posts = many_valid(&raw, "post", forum_post);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post_id, 1);
    }
}
