//! Predicate filters, stable sorts and pagination over in-memory records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use crate::models::{Application, Author, Employer, Job};
use crate::status::{ApplicationStatus, JobStatus};

/// Forum listings show this many posts per page.
pub const FORUM_PAGE_SIZE: usize = 5;

// --- Jobs ---

/// Every present predicate must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFilter {
    pub employer_id: Option<i64>,
    pub status: Option<JobStatus>,
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub min_salary: Option<f64>,
    pub max_salary: Option<f64>,
    pub industry: Option<String>,
}

impl JobFilter {
    pub fn by_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn by_employer(employer_id: i64) -> Self {
        Self {
            employer_id: Some(employer_id),
            ..Self::default()
        }
    }

    /// `job.status` is expected to already be the effective status.
    pub fn matches(&self, job: &Job, employer: Option<&Employer>) -> bool {
        if self.employer_id.is_some_and(|id| job.employer_id != id) {
            return false;
        }
        if self.status.is_some_and(|s| job.status != s) {
            return false;
        }
        if let Some(keyword) = non_blank(&self.keyword) {
            if !contains_ignore_case(&job.title, keyword) {
                return false;
            }
        }
        if let Some(location) = non_blank(&self.location) {
            if !contains_ignore_case(&job.location, location) {
                return false;
            }
        }
        if self.min_salary.is_some_and(|min| job.salary < min) {
            return false;
        }
        if self.max_salary.is_some_and(|max| job.salary > max) {
            return false;
        }
        if let Some(industry) = non_blank(&self.industry) {
            let matches = employer
                .and_then(|e| e.industry.as_deref())
                .is_some_and(|i| i.trim().eq_ignore_ascii_case(industry.trim()));
            if !matches {
                return false;
            }
        }
        true
    }
}

/// Effective-status jobs matching `filter`, in collection order.
pub fn filter_jobs(jobs: &[Job], employers: &[Employer], filter: &JobFilter, today: NaiveDate) -> Vec<Job> {
    jobs.iter()
        .map(|job| job.clone().with_effective_status(today))
        .filter(|job| {
            let employer = employers.iter().find(|e| e.employer_id == job.employer_id);
            filter.matches(job, employer)
        })
        .collect()
}

// --- Applications ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFilter {
    pub applicant_ucid: Option<String>,
    pub job_id: Option<i64>,
    pub employer_id: Option<i64>,
    pub status: Option<ApplicationStatus>,
}

impl ApplicationFilter {
    pub fn by_applicant(ucid: &str) -> Self {
        Self {
            applicant_ucid: Some(ucid.to_string()),
            ..Self::default()
        }
    }

    pub fn by_employer(employer_id: i64) -> Self {
        Self {
            employer_id: Some(employer_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, app: &Application) -> bool {
        self.applicant_ucid
            .as_deref()
            .is_none_or(|ucid| app.applicant_ucid == ucid)
            && self.job_id.is_none_or(|id| app.job_id == id)
            && self.employer_id.is_none_or(|id| app.employer_id == id)
            && self.status.is_none_or(|s| app.status == s)
    }
}

// --- Forum ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Recent,
    Popular,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostQuery {
    pub keyword: Option<String>,
    pub author: Option<Author>,
    pub sort: SortKey,
    /// 1-based; `None` returns every match on a single page.
    pub page: Option<usize>,
}

// --- Sorting ---

/// Newest first. `slice::sort_by_key` is stable, so records with the same
/// date keep their insertion order; undated records sort last.
pub fn sort_recent<T>(items: &mut [T], date: impl Fn(&T) -> Option<NaiveDate>) {
    items.sort_by_key(|item| Reverse(date(item)));
}

/// Highest count first, ties in insertion order.
pub fn sort_popular<T>(items: &mut [T], count: impl Fn(&T) -> u32) {
    items.sort_by_key(|item| Reverse(count(item)));
}

// --- Pagination ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T: Clone> Page<T> {
    pub fn of(items: &[T], page_size: usize, page: usize) -> Self {
        Self {
            items: paginate(items, page_size, page).to_vec(),
            page,
            page_size,
            total_items: items.len(),
            total_pages: total_pages(items.len(), page_size),
        }
    }

    pub fn single(items: Vec<T>) -> Self {
        let total_items = items.len();
        Self {
            items,
            page: 1,
            page_size: total_items,
            total_items,
            total_pages: 1,
        }
    }
}

/// Page `page` (1-based) of `items`. Page 0 and pages past the end are empty.
pub fn paginate<T>(items: &[T], page_size: usize, page: usize) -> &[T] {
    if page == 0 || page_size == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    if page_size == 0 {
        0
    } else {
        total_items.div_ceil(page_size)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}
