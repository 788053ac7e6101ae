//! REST backend client.
//!
//! Requests go out with PascalCase keys; every response is run through
//! [`crate::normalize`] before anything else sees it. Joins, sorting and
//! pagination happen client side with the same code the mock backend uses.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{JobBoardApi, ModeratorStatus, Reply, ok};
use crate::config::Backend;
use crate::enrich::{
    self, ApplicationDetail, ApplicationView, CommentView, Lookup, PostView, SavedJobView,
    VerificationEntry,
};
use crate::error::{ApiError, Result};
use crate::models::{
    AccountKind, Application, Author, Comment, CommunityScore, Credentials, DeleteOutcome,
    Employer, EmployerPatch, FeedbackUpdate, ForumPost, Job, JobPatch, LoginResponse, Moderator,
    NewComment, NewEmployer, NewJob, NewPost, NewStudent, PostPatch, Role, SaveOutcome, Student,
    StudentPatch, Subject, UserProfile, Verification, VerificationCheck,
};
use crate::normalize;
use crate::query::{ApplicationFilter, JobFilter, Page, PostQuery, filter_jobs};
use crate::status::{ApplicationStatus, JobStatus, VerificationStatus};
use crate::store::Merge;

type Query = Vec<(&'static str, String)>;

#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

/// Reference collections fetched for client-side joins.
#[derive(Debug, Default)]
struct Directory {
    students: Vec<Student>,
    employers: Vec<Employer>,
    moderators: Vec<Moderator>,
    jobs: Vec<Job>,
}

impl Directory {
    fn lookup(&self, today: NaiveDate) -> Lookup<'_> {
        Lookup {
            students: &self.students,
            employers: &self.employers,
            moderators: &self.moderators,
            jobs: &self.jobs,
            today,
        }
    }
}

impl HttpApi {
    pub fn new(base_url: &str, timeout_secs: u64, token: Option<String>) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(ApiError::Config("api_url is empty".into()));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::Config("Invalid token format".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    // --- Transport ---

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value> {
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            let message = error_message(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
            debug!(status = status.as_u16(), %message, "backend returned error");
            return Err(ApiError::from_http_status(status.as_u16(), message));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn get(&self, path: &str, query: &[(&'static str, String)]) -> Result<Value> {
        debug!(path, "GET");
        self.send(self.client.get(self.url(path)).query(query)).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        debug!(path, "POST");
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        debug!(path, "PUT");
        self.send(self.client.put(self.url(path)).json(body)).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        debug!(path, "PATCH");
        self.send(self.client.patch(self.url(path)).json(body)).await
    }

    /// A 404 means there was nothing to delete, which is not an error.
    async fn delete(&self, path: &str) -> Result<DeleteOutcome> {
        debug!(path, "DELETE");
        match self.send(self.client.delete(self.url(path))).await {
            Ok(_) => Ok(DeleteOutcome { existed: true }),
            Err(e) if e.is_not_found() => Ok(DeleteOutcome { existed: false }),
            Err(e) => Err(e),
        }
    }

    // --- Collections ---

    async fn students(&self) -> Result<Vec<Student>> {
        Ok(normalize::many(&self.get("/students/", &[]).await?, normalize::student))
    }

    async fn employers(&self) -> Result<Vec<Employer>> {
        Ok(normalize::many(&self.get("/employers/", &[]).await?, normalize::employer))
    }

    async fn moderators(&self) -> Result<Vec<Moderator>> {
        Ok(normalize::many(&self.get("/moderators/", &[]).await?, normalize::moderator))
    }

    async fn jobs(&self, query: &[(&'static str, String)]) -> Result<Vec<Job>> {
        Ok(normalize::many(&self.get("/job-opening/", query).await?, normalize::job))
    }

    async fn job(&self, job_id: i64) -> Result<Job> {
        let value = self.get(&format!("/job-opening/{}/", job_id), &[]).await?;
        Ok(normalize::job(&value))
    }

    async fn application(&self, application_id: i64) -> Result<Application> {
        let value = self
            .get(&format!("/job-applications/{}/", application_id), &[])
            .await?;
        Ok(normalize::application(&value))
    }

    async fn applications(&self, query: &[(&'static str, String)]) -> Result<Vec<Application>> {
        let value = self.get("/job-applications/", query).await?;
        Ok(normalize::many(&value, normalize::application))
    }

    async fn posts(&self) -> Result<Vec<ForumPost>> {
        let value = self.get("/posts/", &[]).await?;
        Ok(normalize::many_valid(&value, "forum post", normalize::forum_post))
    }

    async fn comments(&self, post_id: Option<i64>) -> Result<Vec<Comment>> {
        let query: Query = post_id.map(|id| vec![("PostID", id.to_string())]).unwrap_or_default();
        let value = self.get("/comments/", &query).await?;
        let mut comments = normalize::many_valid(&value, "comment", normalize::comment);
        if let Some(id) = post_id {
            comments.retain(|c| c.post_id == id);
        }
        Ok(comments)
    }

    async fn saved(&self, ucid: &str) -> Result<Vec<crate::models::SavedJob>> {
        let value = self.get("/saved-jobs/", &[("UCID", ucid.to_string())]).await?;
        let mut saved = normalize::many(&value, normalize::saved_job);
        saved.retain(|s| s.ucid == ucid);
        Ok(saved)
    }

    async fn verifications(&self, kind: AccountKind) -> Result<Vec<Verification>> {
        let value = self.get(verification_route(kind), &[]).await?;
        Ok(normalize::many_valid(&value, "verification", normalize::verification))
    }

    async fn directory(&self) -> Result<Directory> {
        let (students, employers, moderators, jobs) = tokio::try_join!(
            self.students(),
            self.employers(),
            self.moderators(),
            self.jobs(&[]),
        )?;
        Ok(Directory {
            students,
            employers,
            moderators,
            jobs,
        })
    }

    // --- Status changes ---

    async fn set_job_status(&self, job_id: i64, next: JobStatus, feedback: Option<&str>) -> Reply<Job> {
        let today = self.today();
        let mut job = self.job(job_id).await?;
        let current = job.effective_status(today);
        job.status = current.transition(next)?;
        let mut body = json!({ "Status": next.as_str() });
        if let Some(feedback) = feedback {
            body["Feedback"] = json!(feedback);
            job.feedback = Some(feedback.to_string());
        }
        let value = self.patch(&format!("/job-opening/{}/", job_id), &body).await?;
        info!(job_id, from = %current, to = %next, "job status changed");
        ok(decode_or(&value, job, normalize::job))
    }

    async fn set_application(
        &self,
        application_id: i64,
        status: Option<ApplicationStatus>,
        feedback: Option<String>,
    ) -> Reply<Application> {
        let mut app = self.application(application_id).await?;
        let mut body = Map::new();
        if let Some(status) = status {
            app.status = app.status.transition(status)?;
            body.insert("Status".into(), json!(status.as_str()));
        }
        if let Some(feedback) = feedback {
            body.insert("Feedback".into(), json!(feedback));
            app.feedback = Some(feedback);
        }
        let value = self
            .patch(&format!("/job-applications/{}/", application_id), &Value::Object(body))
            .await?;
        ok(decode_or(&value, app, normalize::application))
    }

    async fn decide(
        &self,
        subject: &Subject,
        next: VerificationStatus,
        moderator_id: Option<i64>,
        feedback: Option<&str>,
    ) -> Reply<Verification> {
        let today = self.today();
        let (account_path, account_status) = match subject {
            Subject::Student(ucid) => {
                let path = format!("/students/{}/", ucid);
                let student = normalize::student(&self.get(&path, &[]).await?);
                (path, student.verification_status)
            }
            Subject::Employer(id) => {
                let path = format!("/employers/{}/", id);
                let employer = normalize::employer(&self.get(&path, &[]).await?);
                (path, employer.verification_status)
            }
        };

        let route = verification_route(subject.kind());
        let newest = self
            .verifications(subject.kind())
            .await?
            .into_iter()
            .filter(|v| v.subject == *subject)
            .max_by_key(|v| v.vid);

        let mut body = json!({
            "VerificationStatus": next.as_str(),
            "VerificationDate": today,
        });
        if let Some(id) = moderator_id {
            body["ModeratorID"] = json!(id);
        }
        if let Some(feedback) = feedback {
            body["Feedback"] = json!(feedback);
        }

        let record = match newest {
            Some(mut v) => {
                v.status = v.status.transition(next)?;
                v.date = Some(today);
                v.moderator_id = moderator_id.or(v.moderator_id);
                v.feedback = feedback.map(str::to_string);
                let value = self.patch(&format!("{}{}/", route, v.vid), &body).await?;
                decode_or_else(&value, v, normalize::verification)
            }
            None => {
                account_status.transition(next)?;
                with_subject(&mut body, subject);
                let value = self.post(route, &body).await?;
                normalize::verification(&value)?
            }
        };

        // Accounts store an approval as "Verified".
        let account_value = match next {
            VerificationStatus::Approved => "Verified",
            other => other.as_str(),
        };
        let mirror = json!({ "VerificationStatus": account_value, "Feedback": feedback });
        // The record is already written at this point; surface the mismatch
        // rather than report a decision the account doesn't reflect.
        if let Err(e) = self.patch(&account_path, &mirror).await {
            warn!(%subject, vid = record.vid, error = %e, "verification recorded but account status not updated");
            return Err(e);
        }
        info!(%subject, status = %next, vid = record.vid, "verification decided");
        ok(record)
    }
}

fn verification_route(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::Student => "/applicant-verifications/",
        AccountKind::Employer => "/employer-verification/",
    }
}

/// Pull a human-readable message out of an error body: `message`, `detail`
/// or `error`, else the whole JSON object (field errors).
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "detail", "error"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::to_string)
        .or_else(|| value.is_object().then(|| value.to_string()))
}

/// Decode a write response, keeping `fallback` when the backend sent no body.
fn decode_or<T>(value: &Value, fallback: T, map: impl Fn(&Value) -> T) -> T {
    if value.is_object() { map(value) } else { fallback }
}

fn decode_or_else<T>(value: &Value, fallback: T, map: impl Fn(&Value) -> Result<T>) -> T {
    if value.is_object() {
        map(value).unwrap_or(fallback)
    } else {
        fallback
    }
}

fn owner_fields(body: &mut Value, prefix: &str, owner: &Author) {
    let (key, id) = match owner {
        Author::Student(ucid) => (format!("{}UCID", prefix), json!(ucid)),
        Author::Employer(id) => (format!("{}EmployerID", prefix), json!(id)),
        Author::Moderator(id) => (format!("{}ModeratorID", prefix), json!(id)),
    };
    if let Value::Object(map) = body {
        map.insert(key, id);
    }
}

fn with_subject(body: &mut Value, subject: &Subject) {
    if let Value::Object(map) = body {
        match subject {
            Subject::Student(ucid) => map.insert("ApplicantUCID".into(), json!(ucid)),
            Subject::Employer(id) => map.insert("EmployerID".into(), json!(id)),
        };
    }
}

// --- Request encoders ---

fn encode_job_fields(
    employer_id: i64,
    title: &str,
    description: &str,
    location: &str,
    salary: f64,
    deadline: Option<NaiveDate>,
) -> Value {
    json!({
        "Employer": employer_id,
        "JobTitle": title,
        "Description": description,
        "Location": location,
        "Salary": salary,
        "Deadline": deadline,
    })
}

fn encode_new_job(new: &NewJob) -> Value {
    let mut body = encode_job_fields(
        new.employer_id,
        &new.title,
        &new.description,
        &new.location,
        new.salary,
        new.deadline,
    );
    body["Status"] = json!(JobStatus::Pending.as_str());
    for (key, value) in [
        ("Requirements", &new.requirements),
        ("Responsibilities", &new.responsibilities),
        ("Benefits", &new.benefits),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            body[key] = json!(value);
        }
    }
    body
}

fn encode_job(job: &Job) -> Value {
    let mut body = encode_job_fields(
        job.employer_id,
        &job.title,
        &job.description,
        &job.location,
        job.salary,
        job.deadline,
    );
    body["Requirements"] = json!(job.requirements);
    body["Responsibilities"] = json!(job.responsibilities);
    body["Benefits"] = json!(job.benefits);
    body
}

fn encode_student(s: &Student) -> Value {
    json!({
        "UCID": s.ucid,
        "FName": s.first_name,
        "LName": s.last_name,
        "Email": s.email,
        "Phone": s.phone,
        "Major": s.major,
        "GraduationYear": s.graduation_year,
    })
}

fn encode_employer(e: &Employer) -> Value {
    json!({
        "EmployerID": e.employer_id,
        "CompanyName": e.company_name,
        "Email": e.email,
        "Industry": e.industry,
        "Website": e.website,
        "Location": e.location,
        "Description": e.description,
    })
}

fn job_query(filter: &JobFilter) -> Query {
    let mut query = Query::new();
    if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
        query.push(("search", keyword.trim().to_string()));
    }
    if let Some(location) = filter.location.as_deref().filter(|l| !l.trim().is_empty()) {
        query.push(("location", location.trim().to_string()));
    }
    if let Some(id) = filter.employer_id {
        query.push(("employer", id.to_string()));
    }
    if let Some(min) = filter.min_salary {
        query.push(("minSalary", min.to_string()));
    }
    if let Some(max) = filter.max_salary {
        query.push(("maxSalary", max.to_string()));
    }
    // Closed is partly derived from the deadline, so the stored status can't
    // be used to narrow it server side.
    if let Some(status) = filter.status.filter(|s| *s != JobStatus::Closed) {
        query.push(("Status", status.as_str().to_string()));
    }
    query
}

fn application_query(filter: &ApplicationFilter) -> Query {
    let mut query = Query::new();
    if let Some(ucid) = &filter.applicant_ucid {
        query.push(("ApplicantUCID", ucid.clone()));
    }
    if let Some(id) = filter.job_id {
        query.push(("JobID", id.to_string()));
    }
    if let Some(id) = filter.employer_id {
        query.push(("EmployerID", id.to_string()));
    }
    if let Some(status) = filter.status {
        query.push(("Status", status.as_str().to_string()));
    }
    query
}

/// `{ token | access, user: { user_type, ... } }` from `/login/`.
fn decode_login(value: &Value) -> Result<LoginResponse> {
    let token = ["token", "access"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();
    let user = value.get("user").unwrap_or(&Value::Null);
    let role = ["user_type", "role"]
        .iter()
        .find_map(|k| user.get(*k).or_else(|| value.get(*k)).and_then(Value::as_str))
        .unwrap_or_default()
        .to_lowercase();
    let profile = match role.as_str() {
        "student" => UserProfile::Student(normalize::student(user)),
        "employer" => UserProfile::Employer(normalize::employer(user)),
        "moderator" => UserProfile::Moderator(normalize::moderator(user)),
        other => {
            return Err(ApiError::Api {
                status: 200,
                message: format!("login response has unknown user type '{}'", other),
            });
        }
    };
    let role: Role = profile.role();
    Ok(LoginResponse {
        token,
        user: profile,
        role,
    })
}

#[async_trait]
impl JobBoardApi for HttpApi {
    fn backend(&self) -> Backend {
        Backend::Http
    }

    // --- Auth ---

    async fn login(&self, credentials: &Credentials) -> Reply<LoginResponse> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(ApiError::validation("Email and password are required"));
        }
        let body = json!({ "email": credentials.email.trim(), "password": credentials.password });
        let value = self.post("/login/", &body).await?;
        let login = decode_login(&value)?;
        info!(role = %login.role, "logged in");
        ok(login)
    }

    async fn register_student(&self, new: NewStudent) -> Reply<Student> {
        new.validate()?;
        let body = json!({
            "user_type": "student",
            "email": new.email.trim(),
            "password": new.password,
            "UCID": new.ucid,
            "FName": new.first_name,
            "LName": new.last_name,
            "Phone": new.phone,
            "Major": new.major,
            "GraduationYear": new.graduation_year,
        });
        let value = self.post("/register/", &body).await?;
        let mut student = normalize::student(&value);
        if student.ucid.is_empty() {
            student = Student {
                ucid: new.ucid,
                first_name: new.first_name,
                last_name: new.last_name,
                email: new.email,
                phone: new.phone,
                major: new.major,
                graduation_year: new.graduation_year,
                verification_status: VerificationStatus::Pending,
                feedback: None,
            };
        }
        ok(student)
    }

    async fn register_employer(&self, new: NewEmployer) -> Reply<Employer> {
        new.validate()?;
        let body = json!({
            "user_type": "employer",
            "email": new.email.trim(),
            "password": new.password,
            "CompanyName": new.company_name,
            "Industry": new.industry,
            "Website": new.website,
            "Location": new.location,
            "Description": new.description,
        });
        let value = self.post("/register/", &body).await?;
        let employer = normalize::employer(&value);
        if employer.employer_id > 0 {
            let queue = json!({
                "EmployerID": employer.employer_id,
                "VerificationStatus": VerificationStatus::Pending.as_str(),
                "VerificationDate": self.today(),
            });
            // Registration stands even if queueing fails.
            if let Err(e) = self.post(verification_route(AccountKind::Employer), &queue).await {
                warn!(employer_id = employer.employer_id, error = %e, "could not queue employer verification");
            }
        }
        ok(employer)
    }

    async fn check_moderator_status(&self, moderator_id: i64) -> Reply<ModeratorStatus> {
        let found = self
            .moderators()
            .await?
            .into_iter()
            .find(|m| m.moderator_id == moderator_id)
            .map(|m| m.moderator_id);
        ok(ModeratorStatus {
            is_moderator: found.is_some(),
            moderator_id: found,
        })
    }

    // --- Profiles ---

    async fn get_student_profile(&self, ucid: &str) -> Reply<Student> {
        let value = self.get(&format!("/students/{}/", ucid), &[]).await?;
        ok(normalize::student(&value))
    }

    async fn update_student_profile(&self, ucid: &str, patch: StudentPatch) -> Reply<Student> {
        let path = format!("/students/{}/", ucid);
        let mut student = normalize::student(&self.get(&path, &[]).await?);
        student.merge(patch);
        let value = self.put(&path, &encode_student(&student)).await?;
        ok(decode_or(&value, student, normalize::student))
    }

    async fn get_employers(&self) -> Reply<Vec<Employer>> {
        ok(self.employers().await?)
    }

    async fn get_employer(&self, employer_id: i64) -> Reply<Employer> {
        let value = self.get(&format!("/employers/{}/", employer_id), &[]).await?;
        ok(normalize::employer(&value))
    }

    async fn update_employer(&self, employer_id: i64, patch: EmployerPatch) -> Reply<Employer> {
        let path = format!("/employers/{}/", employer_id);
        let mut employer = normalize::employer(&self.get(&path, &[]).await?);
        employer.merge(patch);
        let value = self.put(&path, &encode_employer(&employer)).await?;
        ok(decode_or(&value, employer, normalize::employer))
    }

    // --- Jobs ---

    async fn get_jobs(&self, filter: &JobFilter) -> Reply<Vec<Job>> {
        let jobs = self.jobs(&job_query(filter)).await?;
        // Industry lives on the employer, so only then are employers needed.
        let employers = if filter.industry.is_some() {
            self.employers().await?
        } else {
            Vec::new()
        };
        ok(filter_jobs(&jobs, &employers, filter, self.today()))
    }

    async fn get_job(&self, job_id: i64) -> Reply<Job> {
        ok(self.job(job_id).await?.with_effective_status(self.today()))
    }

    async fn create_job(&self, new: NewJob) -> Reply<Job> {
        new.validate()?;
        let value = self.post("/job-opening/", &encode_new_job(&new)).await?;
        let job = normalize::job(&value);
        info!(job_id = job.job_id, "job created, pending review");
        ok(job)
    }

    async fn update_job(&self, job_id: i64, patch: JobPatch) -> Reply<Job> {
        let path = format!("/job-opening/{}/", job_id);
        let mut job = self.job(job_id).await?;
        job.merge(patch);
        let value = self.put(&path, &encode_job(&job)).await?;
        let today = self.today();
        ok(decode_or(&value, job, normalize::job).with_effective_status(today))
    }

    async fn delete_job(&self, job_id: i64) -> Reply<DeleteOutcome> {
        ok(self.delete(&format!("/job-opening/{}/", job_id)).await?)
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
        let query = application_query(filter);
        let (apps, dir) = tokio::try_join!(self.applications(&query), self.directory())?;
        let lookup = dir.lookup(self.today());
        let views = apps
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
        let (app, dir) = tokio::try_join!(self.application(application_id), self.directory())?;
        ok(dir.lookup(self.today()).application_detail(&app))
    }

    async fn apply_for_job(&self, ucid: &str, job_id: i64) -> Reply<Application> {
        let today = self.today();
        let job = self.job(job_id).await?;
        if job.effective_status(today) != JobStatus::Active {
            return Err(ApiError::validation(format!(
                "Job {} is not accepting applications",
                job_id
            )));
        }
        let filter = ApplicationFilter {
            applicant_ucid: Some(ucid.to_string()),
            job_id: Some(job_id),
            ..ApplicationFilter::default()
        };
        let existing = self.applications(&application_query(&filter)).await?;
        if existing.iter().any(|a| filter.matches(a)) {
            return Err(ApiError::validation("You have already applied for this job"));
        }
        let body = json!({
            "Status": ApplicationStatus::Submitted.as_str(),
            "DateApplied": today,
            "ApplicantUCID": ucid,
            "JobID": job_id,
            "EmployerID": job.employer_id,
        });
        let value = self.post("/job-applications/", &body).await?;
        let app = normalize::application(&value);
        info!(application_id = app.application_id, "application submitted");
        ok(app)
    }

    async fn update_application_status(
        &self,
        application_id: i64,
        status: ApplicationStatus,
        feedback: Option<String>,
    ) -> Reply<Application> {
        self.set_application(application_id, Some(status), feedback).await
    }

    async fn update_application_feedback(
        &self,
        application_id: i64,
        update: FeedbackUpdate,
    ) -> Reply<Application> {
        self.set_application(application_id, update.status, Some(update.feedback))
            .await
    }

    // --- Saved jobs ---

    async fn get_saved_jobs(&self, ucid: &str) -> Reply<Vec<SavedJobView>> {
        let (saved, jobs, employers) =
            tokio::try_join!(self.saved(ucid), self.jobs(&[]), self.employers())?;
        let dir = Directory {
            jobs,
            employers,
            ..Directory::default()
        };
        let lookup = dir.lookup(self.today());
        ok(saved.iter().map(|s| lookup.saved_job_view(s)).collect())
    }

    async fn save_job(&self, ucid: &str, job_id: i64) -> Reply<SaveOutcome> {
        let already_saved = self.saved(ucid).await?.iter().any(|s| s.job_id == job_id);
        if !already_saved {
            let body = json!({ "UCID": ucid, "JobID": job_id, "DateSaved": self.today() });
            self.post("/saved-jobs/", &body).await?;
        }
        ok(SaveOutcome {
            success: true,
            is_saved: true,
            already_saved,
        })
    }

    async fn unsave_job(&self, ucid: &str, job_id: i64) -> Reply<DeleteOutcome> {
        let matching: Vec<i64> = self
            .saved(ucid)
            .await?
            .into_iter()
            .filter(|s| s.job_id == job_id)
            .map(|s| s.saved_job_id)
            .collect();
        let mut existed = false;
        for id in matching {
            existed |= self.delete(&format!("/saved-jobs/{}/", id)).await?.existed;
        }
        ok(DeleteOutcome { existed })
    }

    async fn is_job_saved(&self, ucid: &str, job_id: i64) -> Reply<bool> {
        ok(self.saved(ucid).await?.iter().any(|s| s.job_id == job_id))
    }

    // --- Verifications ---

    async fn get_verifications(
        &self,
        kind: Option<AccountKind>,
        status: Option<VerificationStatus>,
    ) -> Reply<Vec<VerificationEntry>> {
        let mut records = Vec::new();
        for k in [AccountKind::Student, AccountKind::Employer] {
            if kind.is_none_or(|wanted| wanted == k) {
                records.extend(self.verifications(k).await?);
            }
        }
        let (students, employers) = tokio::try_join!(self.students(), self.employers())?;
        let dir = Directory {
            students,
            employers,
            ..Directory::default()
        };
        let lookup = dir.lookup(self.today());
        ok(enrich::verification_queue(&records, kind, status, &lookup))
    }

    async fn check_verification_status(&self, subject: &Subject) -> Reply<VerificationCheck> {
        let newest = self
            .verifications(subject.kind())
            .await?
            .into_iter()
            .filter(|v| v.subject == *subject)
            .max_by_key(|v| v.vid);
        if let Some(v) = newest {
            return ok(VerificationCheck {
                status: v.status,
                feedback: v.feedback.unwrap_or_default(),
            });
        }
        let (status, feedback) = match subject {
            Subject::Student(ucid) => {
                let s = normalize::student(&self.get(&format!("/students/{}/", ucid), &[]).await?);
                (s.verification_status, s.feedback)
            }
            Subject::Employer(id) => {
                let e = normalize::employer(&self.get(&format!("/employers/{}/", id), &[]).await?);
                (e.verification_status, e.feedback)
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
        let (posts, comments, dir) = tokio::try_join!(self.posts(), self.comments(None), self.directory())?;
        let lookup = dir.lookup(self.today());
        ok(enrich::post_page(&posts, &comments, &lookup, q))
    }

    async fn get_forum_post(&self, post_id: i64) -> Reply<PostView> {
        let value = self.get(&format!("/posts/{}/", post_id), &[]).await?;
        let post = normalize::forum_post(&value)?;
        let (comments, dir) = tokio::try_join!(self.comments(Some(post_id)), self.directory())?;
        ok(dir.lookup(self.today()).post_view(&post, comments.len()))
    }

    async fn create_forum_post(&self, new: NewPost) -> Reply<ForumPost> {
        new.validate()?;
        let mut body = json!({
            "Title": new.title,
            "Content": new.content,
            "DatePosted": self.today(),
        });
        owner_fields(&mut body, "Author", &new.author);
        let value = self.post("/posts/", &body).await?;
        ok(normalize::forum_post(&value)?)
    }

    async fn update_forum_post(&self, post_id: i64, patch: PostPatch) -> Reply<ForumPost> {
        let path = format!("/posts/{}/", post_id);
        let mut post = normalize::forum_post(&self.get(&path, &[]).await?)?;
        post.merge(patch);
        let mut body = json!({ "Title": post.title, "Content": post.content });
        owner_fields(&mut body, "Author", &post.author);
        let value = self.put(&path, &body).await?;
        ok(decode_or_else(&value, post, normalize::forum_post))
    }

    async fn upvote_forum_post(&self, post_id: i64, voter: &Author) -> Reply<ForumPost> {
        let path = format!("/posts/{}/", post_id);
        let post = normalize::forum_post(&self.get(&path, &[]).await?)?;
        let votes = self.get("/upvotes/", &[("PostID", post_id.to_string())]).await?;
        let already = normalize::many_valid(&votes, "upvote", normalize::upvote)
            .iter()
            .any(|u| u.post_id == post_id && u.voter == *voter);
        if already {
            return Err(ApiError::validation("You have already upvoted this post"));
        }
        let mut body = json!({ "PostID": post_id });
        owner_fields(&mut body, "Voter", voter);
        self.post("/upvotes/", &body).await?;

        let refreshed = self.get(&path, &[]).await?;
        let mut fallback = post;
        fallback.upvotes += 1;
        ok(decode_or_else(&refreshed, fallback, normalize::forum_post))
    }

    async fn delete_forum_post(&self, post_id: i64) -> Reply<DeleteOutcome> {
        ok(self.delete(&format!("/posts/{}/", post_id)).await?)
    }

    async fn get_forum_comments(&self, post_id: i64) -> Reply<Vec<CommentView>> {
        let (comments, dir) = tokio::try_join!(self.comments(Some(post_id)), self.directory())?;
        ok(enrich::comment_thread(&comments, post_id, &dir.lookup(self.today())))
    }

    async fn create_forum_comment(&self, new: NewComment) -> Reply<Comment> {
        new.validate()?;
        let mut body = json!({
            "PostID": new.post_id,
            "Content": new.content,
            "DatePosted": self.today(),
        });
        owner_fields(&mut body, "Author", &new.author);
        let value = self.post("/comments/", &body).await?;
        ok(normalize::comment(&value)?)
    }

    async fn delete_forum_comment(&self, comment_id: i64) -> Reply<DeleteOutcome> {
        ok(self.delete(&format!("/comments/{}/", comment_id)).await?)
    }

    async fn get_user_community_score(&self, author: &Author) -> Reply<CommunityScore> {
        let posts = self.posts().await?;
        ok(CommunityScore::from_posts(
            posts.iter().filter(|p| p.author == *author),
        ))
    }
}
