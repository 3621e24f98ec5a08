use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{multipart::Form, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ChapterId, CourseId, PackageId, SubjectId, TestId},
    error::{ApiError, ErrorCode},
    protocol::{
        AuthTokens, AutoGenerateRequest, BulkUpsertResponse, ChapterContentUpdate, ChapterRecord,
        ChapterUpsert, CourseListing, CourseRecord, CourseUpdateRequest, CreatePackageRequest,
        CreatedResponse, DeleteAccountRequest, FilePathQuery, NewCourseRequest, PackageRecord,
        RegisterCreatorRequest, SendOtpRequest, SignupOtpRequest, SubjectUpsert, TestDocument,
        TestListing, TestSummary, UploadResponse,
    },
};
use tracing::{debug, info, warn};
use url::Url;

pub mod assessment;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod draft;
pub mod error;
pub mod markdown;
pub mod notify;
pub mod packages;
pub mod session;
pub mod upload;
pub mod validation;
pub mod wizard;

pub use config::{load_settings, Settings};
pub use error::{ClientError, ClientResult};
pub use notify::{Notice, NoticeCategory, NoticeContext, NoticeLevel};
pub use session::{Session, SessionSubscription};
pub use upload::{FileUpload, ProgressSink, UploadProgress};
pub use wizard::{
    AdvanceOutcome, SaveOutcome, Stage, ValidityFlags, WizardController, WizardEvent,
};

/// Remote creator API. Every wizard operation goes through this seam so the
/// controller can be driven by an in-memory double.
#[async_trait]
pub trait CreatorApi: Send + Sync {
    async fn send_otp(&self, email: &str) -> ClientResult<()>;
    async fn login(&self, email: &str, otp: &str) -> ClientResult<AuthTokens>;
    async fn send_signup_otp(&self, request: &SignupOtpRequest) -> ClientResult<()>;
    async fn register_creator(&self, request: &RegisterCreatorRequest) -> ClientResult<()>;
    async fn request_account_deletion(&self, request: &DeleteAccountRequest) -> ClientResult<()>;

    async fn list_courses(&self, skip: u64, limit: u64) -> ClientResult<CourseListing>;
    async fn get_course(&self, course_id: &CourseId) -> ClientResult<CourseRecord>;
    async fn create_course(&self, request: &NewCourseRequest) -> ClientResult<CourseId>;
    async fn update_course(
        &self,
        course_id: &CourseId,
        request: &CourseUpdateRequest,
    ) -> ClientResult<()>;
    async fn delete_course(&self, course_id: &CourseId) -> ClientResult<()>;
    async fn upload_thumbnail(
        &self,
        course_id: &CourseId,
        upload: FileUpload,
    ) -> ClientResult<UploadResponse>;

    async fn upsert_subjects(
        &self,
        course_id: &CourseId,
        subjects: &[SubjectUpsert],
    ) -> ClientResult<BulkUpsertResponse<SubjectId>>;
    async fn delete_subject(&self, subject_id: &SubjectId) -> ClientResult<()>;
    async fn upsert_chapters(
        &self,
        subject_id: &SubjectId,
        chapters: &[ChapterUpsert],
    ) -> ClientResult<BulkUpsertResponse<ChapterId>>;
    async fn delete_chapter(&self, subject_id: &SubjectId, chapter_id: &ChapterId)
        -> ClientResult<()>;
    async fn get_chapter(&self, chapter_id: &ChapterId) -> ClientResult<ChapterRecord>;
    async fn update_chapter_content(
        &self,
        course_id: &CourseId,
        chapter_id: &ChapterId,
        content: &str,
    ) -> ClientResult<()>;
    async fn upload_course_file(
        &self,
        course_id: &CourseId,
        upload: FileUpload,
        progress: Option<ProgressSink>,
    ) -> ClientResult<UploadResponse>;

    async fn list_tests(&self, course_id: &CourseId) -> ClientResult<Vec<TestSummary>>;
    async fn get_test(&self, test_id: &TestId) -> ClientResult<TestDocument>;
    async fn create_test(&self, course_id: &CourseId, test: &TestDocument) -> ClientResult<TestId>;
    async fn update_test(&self, test_id: &TestId, test: &TestDocument) -> ClientResult<()>;
    async fn delete_test(&self, course_id: &CourseId, test_id: &TestId) -> ClientResult<()>;
    async fn auto_generate_test(
        &self,
        course_id: &CourseId,
        request: &AutoGenerateRequest,
    ) -> ClientResult<TestDocument>;
    async fn upload_image(
        &self,
        course_id: &CourseId,
        upload: FileUpload,
    ) -> ClientResult<UploadResponse>;
    async fn fetch_file(&self, path: &str) -> ClientResult<Vec<u8>>;
    async fn delete_file(&self, path: &str) -> ClientResult<()>;

    async fn list_packages(&self, course_id: &CourseId) -> ClientResult<Vec<PackageRecord>>;
    async fn create_package(&self, request: &CreatePackageRequest) -> ClientResult<PackageId>;
    async fn delete_package(&self, package_id: &PackageId) -> ClientResult<()>;
}

pub struct HttpCreatorApi {
    http: Client,
    base_url: Url,
    session: Arc<Session>,
}

impl HttpCreatorApi {
    pub fn new(settings: &Settings, session: Arc<Session>) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Self::with_client(http, &settings.api_base_url, session)
    }

    pub fn with_client(http: Client, base_url: &str, session: Arc<Session>) -> ClientResult<Self> {
        let mut base_url = Url::parse(base_url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn authorized(&self, builder: RequestBuilder) -> ClientResult<RequestBuilder> {
        let token = self
            .session
            .access_token()
            .await
            .ok_or(ClientError::NotSignedIn)?;
        Ok(builder.bearer_auth(token))
    }

    async fn get(&self, path: &str) -> ClientResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        self.authorized(self.http.get(url)).await
    }

    async fn post(&self, path: &str) -> ClientResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        self.authorized(self.http.post(url)).await
    }

    async fn put(&self, path: &str) -> ClientResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        self.authorized(self.http.put(url)).await
    }

    async fn delete(&self, path: &str) -> ClientResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        self.authorized(self.http.delete(url)).await
    }

    async fn upload(
        &self,
        path: &str,
        field: &'static str,
        upload: FileUpload,
        progress: Option<ProgressSink>,
    ) -> ClientResult<UploadResponse> {
        upload.check_size()?;
        let original_name = upload.file_name.clone();
        let size = upload.len();
        let form = Form::new()
            .text("originalFileName", original_name.clone())
            .part(field, upload.into_part(progress)?);
        let response: UploadResponse =
            decode(send(self.post(path).await?.multipart(form)).await?).await?;
        info!(file = %original_name, size, path = %response.path, "upload complete");
        Ok(response)
    }
}

/// Sends the request and turns non-success statuses into [`ClientError::Rejected`],
/// decoding the API error body when there is one.
async fn send(builder: RequestBuilder) -> ClientResult<Response> {
    let response = builder.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let mut api_error = serde_json::from_str::<ApiError>(&body).unwrap_or_else(|_| {
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.trim().to_string()
        };
        ApiError::new(ErrorCode::Unknown, message)
    });
    if api_error.code == ErrorCode::Unknown {
        api_error.code = ErrorCode::from_status(status.as_u16());
    }
    warn!(
        status = status.as_u16(),
        code = ?api_error.code,
        "request rejected: {}",
        api_error.message
    );
    Err(ClientError::rejected(status.as_u16(), api_error))
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    Ok(response.json().await?)
}

#[async_trait]
impl CreatorApi for HttpCreatorApi {
    async fn send_otp(&self, email: &str) -> ClientResult<()> {
        send(self.http.post(self.endpoint("auth/v2/send-otp")?).json(&SendOtpRequest {
            useremail: email.trim().to_string(),
        }))
        .await?;
        info!(email, "otp requested");
        Ok(())
    }

    async fn login(&self, email: &str, otp: &str) -> ClientResult<AuthTokens> {
        let response = send(
            self.http
                .post(self.endpoint("auth/v2/login")?)
                .query(&[("useremail", email.trim()), ("otp", otp.trim())]),
        )
        .await?;
        decode(response).await
    }

    async fn send_signup_otp(&self, request: &SignupOtpRequest) -> ClientResult<()> {
        send(
            self.http
                .post(self.endpoint("auth/v2/send-creator-signup-otp")?)
                .json(request),
        )
        .await?;
        Ok(())
    }

    async fn register_creator(&self, request: &RegisterCreatorRequest) -> ClientResult<()> {
        send(
            self.http
                .post(self.endpoint("auth/v2/register-creator")?)
                .json(request),
        )
        .await?;
        info!(email = %request.email, "creator registered");
        Ok(())
    }

    async fn request_account_deletion(&self, request: &DeleteAccountRequest) -> ClientResult<()> {
        send(
            self.http
                .post(self.endpoint("auth/v2/request-delete-account")?)
                .json(request),
        )
        .await?;
        info!(email = %request.useremail, "account deletion requested");
        Ok(())
    }

    async fn list_courses(&self, skip: u64, limit: u64) -> ClientResult<CourseListing> {
        let response = send(
            self.get("creator/v2/courses")
                .await?
                .query(&[("skip", skip), ("limit", limit)]),
        )
        .await?;
        decode(response).await
    }

    async fn get_course(&self, course_id: &CourseId) -> ClientResult<CourseRecord> {
        decode(send(self.get(&format!("creator/v2/courses/{course_id}")).await?).await?).await
    }

    async fn create_course(&self, request: &NewCourseRequest) -> ClientResult<CourseId> {
        let created: CreatedResponse<CourseId> =
            decode(send(self.post("creator/v2/courses").await?.json(request)).await?).await?;
        info!(course_id = %created.id, "course created");
        Ok(created.id)
    }

    async fn update_course(
        &self,
        course_id: &CourseId,
        request: &CourseUpdateRequest,
    ) -> ClientResult<()> {
        send(
            self.put(&format!("creator/v2/courses/{course_id}"))
                .await?
                .json(request),
        )
        .await?;
        Ok(())
    }

    async fn delete_course(&self, course_id: &CourseId) -> ClientResult<()> {
        send(self.delete(&format!("creator/v2/courses/{course_id}")).await?).await?;
        info!(%course_id, "course deleted");
        Ok(())
    }

    async fn upload_thumbnail(
        &self,
        course_id: &CourseId,
        upload: FileUpload,
    ) -> ClientResult<UploadResponse> {
        self.upload(
            &format!("creator/v2/courses/{course_id}/thumbnail"),
            "thumbnail",
            upload,
            None,
        )
        .await
    }

    async fn upsert_subjects(
        &self,
        course_id: &CourseId,
        subjects: &[SubjectUpsert],
    ) -> ClientResult<BulkUpsertResponse<SubjectId>> {
        let response = send(
            self.post(&format!("creator/v2/courses/{course_id}/books/bulk"))
                .await?
                .json(subjects),
        )
        .await?;
        let result: BulkUpsertResponse<SubjectId> = decode(response).await?;
        debug!(
            %course_id,
            created = result.created.len(),
            updated = result.updated.len(),
            "subjects upserted"
        );
        Ok(result)
    }

    async fn delete_subject(&self, subject_id: &SubjectId) -> ClientResult<()> {
        send(self.delete(&format!("creator/v2/books/{subject_id}")).await?).await?;
        Ok(())
    }

    async fn upsert_chapters(
        &self,
        subject_id: &SubjectId,
        chapters: &[ChapterUpsert],
    ) -> ClientResult<BulkUpsertResponse<ChapterId>> {
        let response = send(
            self.post(&format!("creator/v2/books/{subject_id}/chapters/bulk"))
                .await?
                .json(chapters),
        )
        .await?;
        let result: BulkUpsertResponse<ChapterId> = decode(response).await?;
        debug!(
            %subject_id,
            created = result.created.len(),
            updated = result.updated.len(),
            "chapters upserted"
        );
        Ok(result)
    }

    async fn delete_chapter(
        &self,
        subject_id: &SubjectId,
        chapter_id: &ChapterId,
    ) -> ClientResult<()> {
        send(
            self.delete(&format!("creator/v2/books/{subject_id}/chapters/{chapter_id}"))
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn get_chapter(&self, chapter_id: &ChapterId) -> ClientResult<ChapterRecord> {
        decode(send(self.get(&format!("creator/v2/chapters/{chapter_id}")).await?).await?).await
    }

    async fn update_chapter_content(
        &self,
        course_id: &CourseId,
        chapter_id: &ChapterId,
        content: &str,
    ) -> ClientResult<()> {
        send(
            self.put(&format!("creator/v2/courses/{course_id}/chapters/{chapter_id}"))
                .await?
                .json(&ChapterContentUpdate {
                    content: content.to_string(),
                }),
        )
        .await?;
        Ok(())
    }

    async fn upload_course_file(
        &self,
        course_id: &CourseId,
        upload: FileUpload,
        progress: Option<ProgressSink>,
    ) -> ClientResult<UploadResponse> {
        self.upload(
            &format!("creator/v2/courses/{course_id}/upload-file"),
            "file",
            upload,
            progress,
        )
        .await
    }

    async fn list_tests(&self, course_id: &CourseId) -> ClientResult<Vec<TestSummary>> {
        let listing: TestListing =
            decode(send(self.get(&format!("creator/v2/courses/{course_id}/tests")).await?).await?)
                .await?;
        Ok(listing.into_items())
    }

    async fn get_test(&self, test_id: &TestId) -> ClientResult<TestDocument> {
        decode(send(self.get(&format!("creator/v2/tests/{test_id}")).await?).await?).await
    }

    async fn create_test(&self, course_id: &CourseId, test: &TestDocument) -> ClientResult<TestId> {
        let created: CreatedResponse<TestId> = decode(
            send(
                self.post(&format!("creator/v2/courses/{course_id}/tests"))
                    .await?
                    .json(test),
            )
            .await?,
        )
        .await?;
        info!(%course_id, test_id = %created.id, "test created");
        Ok(created.id)
    }

    async fn update_test(&self, test_id: &TestId, test: &TestDocument) -> ClientResult<()> {
        send(
            self.put(&format!("creator/v2/tests/{test_id}"))
                .await?
                .json(test),
        )
        .await?;
        Ok(())
    }

    async fn delete_test(&self, course_id: &CourseId, test_id: &TestId) -> ClientResult<()> {
        send(
            self.delete(&format!("creator/v2/courses/{course_id}/tests/{test_id}"))
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn auto_generate_test(
        &self,
        course_id: &CourseId,
        request: &AutoGenerateRequest,
    ) -> ClientResult<TestDocument> {
        decode(
            send(
                self.post(&format!("creator/v2/courses/{course_id}/auto-generate-test"))
                    .await?
                    .json(request),
            )
            .await?,
        )
        .await
    }

    async fn upload_image(
        &self,
        course_id: &CourseId,
        upload: FileUpload,
    ) -> ClientResult<UploadResponse> {
        self.upload(
            &format!("creator/v2/courses/{course_id}/upload-image"),
            "file",
            upload,
            None,
        )
        .await
    }

    async fn fetch_file(&self, path: &str) -> ClientResult<Vec<u8>> {
        let response = send(self.get("creator/v2/files").await?.query(&FilePathQuery {
            file_path: path.to_string(),
        }))
        .await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete_file(&self, path: &str) -> ClientResult<()> {
        send(self.delete("creator/v2/files").await?.query(&FilePathQuery {
            file_path: path.to_string(),
        }))
        .await?;
        Ok(())
    }

    async fn list_packages(&self, course_id: &CourseId) -> ClientResult<Vec<PackageRecord>> {
        decode(
            send(
                self.get(&format!("creator/v2/courses/{course_id}/packages"))
                    .await?,
            )
            .await?,
        )
        .await
    }

    async fn create_package(&self, request: &CreatePackageRequest) -> ClientResult<PackageId> {
        let created: CreatedResponse<PackageId> =
            decode(send(self.post("creator/v2/packages").await?.json(request)).await?).await?;
        Ok(created.id)
    }

    async fn delete_package(&self, package_id: &PackageId) -> ClientResult<()> {
        send(self.delete(&format!("creator/v2/packages/{package_id}")).await?).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
