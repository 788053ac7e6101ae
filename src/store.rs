//! Create/update/delete over in-memory collections.

use crate::error::{ApiError, Result};
use crate::models::{
    Application, Comment, Employer, EmployerPatch, ForumPost, Job, JobPatch, Moderator, PostPatch,
    SavedJob, Student, StudentPatch, Upvote, Verification,
};

/// A record addressed by a key within its collection.
pub trait Record {
    type Key: PartialEq + std::fmt::Display;

    const KIND: &'static str;

    fn key(&self) -> Self::Key;
}

/// Records whose key is a number handed out by the collection.
pub trait NumericId: Record<Key = i64> {
    fn assign_id(&mut self, id: i64);
}

/// Shallow merge: fields present in the patch replace, the rest are kept.
pub trait Merge {
    type Patch;

    fn merge(&mut self, patch: Self::Patch);
}

/// `max(existing ids) + 1`, or 1 for an empty collection.
pub fn next_id<T: NumericId>(items: &[T]) -> i64 {
    items.iter().map(Record::key).max().map_or(1, |max| max + 1)
}

pub fn insert<T: NumericId + Clone>(items: &mut Vec<T>, mut record: T) -> T {
    record.assign_id(next_id(items));
    items.push(record.clone());
    record
}

pub fn find<'a, T: Record>(items: &'a [T], key: &T::Key) -> Option<&'a T> {
    items.iter().find(|r| r.key() == *key)
}

pub fn get<'a, T: Record>(items: &'a [T], key: &T::Key) -> Result<&'a T> {
    find(items, key).ok_or_else(|| not_found::<T>(key))
}

pub fn get_mut<'a, T: Record>(items: &'a mut [T], key: &T::Key) -> Result<&'a mut T> {
    match items.iter().position(|r| r.key() == *key) {
        Some(idx) => Ok(&mut items[idx]),
        None => Err(not_found::<T>(key)),
    }
}

pub fn update<T: Record + Merge + Clone>(items: &mut [T], key: &T::Key, patch: T::Patch) -> Result<T> {
    let record = get_mut(items, key)?;
    record.merge(patch);
    Ok(record.clone())
}

/// Removes the record if present. Removing a missing key is not an error;
/// the return value says whether anything was there.
pub fn remove<T: Record>(items: &mut Vec<T>, key: &T::Key) -> bool {
    let before = items.len();
    items.retain(|r| r.key() != *key);
    items.len() != before
}

pub fn not_found<T: Record>(key: &T::Key) -> ApiError {
    ApiError::not_found(format!("{} {} not found", T::KIND, key))
}

macro_rules! numeric_record {
    ($ty:ty, $kind:literal, $field:ident) => {
        impl Record for $ty {
            type Key = i64;

            const KIND: &'static str = $kind;

            fn key(&self) -> i64 {
                self.$field
            }
        }

        impl NumericId for $ty {
            fn assign_id(&mut self, id: i64) {
                self.$field = id;
            }
        }
    };
}

numeric_record!(Employer, "Employer", employer_id);
numeric_record!(Moderator, "Moderator", moderator_id);
numeric_record!(Job, "Job", job_id);
numeric_record!(Application, "Application", application_id);
numeric_record!(SavedJob, "Saved job", saved_job_id);
numeric_record!(Verification, "Verification", vid);
numeric_record!(ForumPost, "Post", post_id);
numeric_record!(Comment, "Comment", comment_id);
numeric_record!(Upvote, "Upvote", upvote_id);

impl Record for Student {
    type Key = String;

    const KIND: &'static str = "Student";

    fn key(&self) -> String {
        self.ucid.clone()
    }
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn replace_opt<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

impl Merge for Job {
    type Patch = JobPatch;

    fn merge(&mut self, patch: JobPatch) {
        replace(&mut self.title, patch.title);
        replace(&mut self.description, patch.description);
        replace(&mut self.location, patch.location);
        replace(&mut self.salary, patch.salary);
        replace_opt(&mut self.deadline, patch.deadline);
        replace_opt(&mut self.requirements, patch.requirements);
        replace_opt(&mut self.responsibilities, patch.responsibilities);
        replace_opt(&mut self.benefits, patch.benefits);
    }
}

impl Merge for Student {
    type Patch = StudentPatch;

    fn merge(&mut self, patch: StudentPatch) {
        replace(&mut self.first_name, patch.first_name);
        replace(&mut self.last_name, patch.last_name);
        replace(&mut self.email, patch.email);
        replace(&mut self.phone, patch.phone);
        replace(&mut self.major, patch.major);
        replace_opt(&mut self.graduation_year, patch.graduation_year);
    }
}

impl Merge for Employer {
    type Patch = EmployerPatch;

    fn merge(&mut self, patch: EmployerPatch) {
        replace(&mut self.company_name, patch.company_name);
        replace(&mut self.email, patch.email);
        replace_opt(&mut self.industry, patch.industry);
        replace_opt(&mut self.website, patch.website);
        replace_opt(&mut self.location, patch.location);
        replace_opt(&mut self.description, patch.description);
    }
}

impl Merge for ForumPost {
    type Patch = PostPatch;

    fn merge(&mut self, patch: PostPatch) {
        replace(&mut self.title, patch.title);
        replace(&mut self.content, patch.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::JobStatus;
    use chrono::NaiveDate;

    fn job(id: i64, title: &str) -> Job {
        Job {
            job_id: id,
            employer_id: 1,
            title: title.to_string(),
            description: "desc".to_string(),
            location: "Newark, NJ".to_string(),
            salary: 50000.0,
            deadline: NaiveDate::from_ymd_opt(2099, 1, 1),
            requirements: Some("Rust".to_string()),
            responsibilities: None,
            benefits: None,
            status: JobStatus::Pending,
            feedback: None,
            date_posted: None,
        }
    }

    #[test]
    fn test_next_id_empty_collection() {
        let jobs: Vec<Job> = Vec::new();
        assert_eq!(next_id(&jobs), 1);
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let mut jobs = vec![job(3, "a"), job(7, "b"), job(5, "c")];
        let first = insert(&mut jobs, job(0, "d"));
        let second = insert(&mut jobs, job(0, "e"));
        assert_eq!(first.job_id, 8);
        assert_eq!(second.job_id, 9);
        assert_ne!(first.job_id, second.job_id);
        assert_eq!(jobs.len(), 5);
        assert_eq!(jobs.last().unwrap().title, "e");
    }

    #[test]
    fn test_update_merges_present_fields_only() {
        let mut jobs = vec![job(1, "Intern")];
        let original = jobs[0].clone();
        let patch = JobPatch {
            title: Some("Senior Intern".to_string()),
            salary: Some(55000.0),
            ..JobPatch::default()
        };
        let updated = update(&mut jobs, &1, patch).unwrap();

        let expected = Job {
            title: "Senior Intern".to_string(),
            salary: 55000.0,
            ..original
        };
        assert_eq!(updated, expected);
        assert_eq!(jobs[0], expected);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut jobs = vec![job(1, "Intern")];
        let err = update(&mut jobs, &42, JobPatch::default()).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(err.to_string(), "Job 42 not found");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut jobs = vec![job(1, "a"), job(2, "b")];
        assert!(remove(&mut jobs, &1));
        assert!(!remove(&mut jobs, &1));
        assert!(!remove(&mut jobs, &99));
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, 2);
    }

    #[test]
    fn test_string_keyed_lookup() {
        let students = vec![crate::normalize::student(&serde_json::json!({ "UCID": "ab12" }))];
        assert!(get(&students, &"ab12".to_string()).is_ok());
        let err = get(&students, &"zz".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "Student zz not found");
    }
}
