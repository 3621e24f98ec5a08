use super::*;

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use shared::{
    domain::{PackageId, SubjectId},
    error::{ApiError, ErrorCode},
    protocol::{
        AuthTokens, AutoGenerateRequest, BulkUpsertResponse, ChapterRecord, ChapterUpsert,
        CourseListing, CourseUpdateRequest, CreatePackageRequest, DeleteAccountRequest, EntityRef,
        NewCourseRequest, PackageDuration, PackageFeatures, RegisterCreatorRequest,
        SignupOtpRequest, SubjectRecord, SubjectUpsert, UploadResponse,
    },
};

use crate::notify::NoticeLevel;

#[derive(Default)]
struct FakeServer {
    calls: Vec<&'static str>,
    course: CourseRecord,
    next_id: u32,
    failing: HashSet<&'static str>,
    passes_before_failure: HashMap<&'static str, usize>,
    delays: HashMap<&'static str, VecDeque<Duration>>,
    tests: Vec<TestSummary>,
    packages: Vec<PackageRecord>,
    course_updates: Vec<CourseUpdateRequest>,
    content_updates: Vec<String>,
}

impl FakeServer {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn subjects_mut(&mut self) -> &mut Vec<SubjectRecord> {
        self.course.subjects.get_or_insert_with(Vec::new)
    }
}

#[derive(Clone, Default)]
struct FakeApi {
    server: Arc<Mutex<FakeServer>>,
}

impl FakeApi {
    fn with_course(course: CourseRecord) -> Self {
        let api = Self::default();
        api.server.try_lock().expect("unshared").course = course;
        api
    }

    async fn fail(&self, operation: &'static str) {
        self.server.lock().await.failing.insert(operation);
    }

    /// Lets `passes` calls through, then fails every later one.
    async fn fail_after(&self, operation: &'static str, passes: usize) {
        self.server
            .lock()
            .await
            .passes_before_failure
            .insert(operation, passes);
    }

    async fn recover(&self, operation: &'static str) {
        self.server.lock().await.failing.remove(operation);
    }

    async fn delay_next(&self, operation: &'static str, delay: Duration) {
        self.server
            .lock()
            .await
            .delays
            .entry(operation)
            .or_default()
            .push_back(delay);
    }

    async fn calls(&self) -> Vec<&'static str> {
        self.server.lock().await.calls.clone()
    }

    async fn called(&self, operation: &'static str) -> bool {
        self.calls().await.contains(&operation)
    }

    async fn enter(&self, operation: &'static str) -> ClientResult<()> {
        let delay = {
            let mut server = self.server.lock().await;
            server.calls.push(operation);
            server
                .delays
                .get_mut(operation)
                .and_then(VecDeque::pop_front)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut server = self.server.lock().await;
        if let Some(remaining) = server.passes_before_failure.get_mut(operation) {
            if *remaining == 0 {
                server.failing.insert(operation);
            } else {
                *remaining -= 1;
            }
        }
        if server.failing.contains(operation) {
            return Err(ClientError::rejected(
                500,
                ApiError::new(ErrorCode::Internal, format!("{operation} failed")),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CreatorApi for FakeApi {
    async fn send_otp(&self, _email: &str) -> ClientResult<()> {
        self.enter("send_otp").await
    }

    async fn login(&self, _email: &str, _otp: &str) -> ClientResult<AuthTokens> {
        self.enter("login").await?;
        Ok(AuthTokens {
            access_token: "token".to_string(),
            refresh_token: None,
            uuid: None,
        })
    }

    async fn send_signup_otp(&self, _request: &SignupOtpRequest) -> ClientResult<()> {
        self.enter("send_signup_otp").await
    }

    async fn register_creator(&self, _request: &RegisterCreatorRequest) -> ClientResult<()> {
        self.enter("register_creator").await
    }

    async fn request_account_deletion(&self, _request: &DeleteAccountRequest) -> ClientResult<()> {
        self.enter("request_account_deletion").await
    }

    async fn list_courses(&self, _skip: u64, _limit: u64) -> ClientResult<CourseListing> {
        self.enter("list_courses").await?;
        Ok(CourseListing::Bare(Vec::new()))
    }

    async fn get_course(&self, _course_id: &CourseId) -> ClientResult<CourseRecord> {
        self.enter("get_course").await?;
        Ok(self.server.lock().await.course.clone())
    }

    async fn create_course(&self, request: &NewCourseRequest) -> ClientResult<CourseId> {
        self.enter("create_course").await?;
        let mut server = self.server.lock().await;
        let id = CourseId(server.fresh_id("course"));
        server.course.id = Some(id.clone());
        server.course.name = Some(request.name.clone());
        server.course.description = Some(request.description.clone());
        Ok(id)
    }

    async fn update_course(
        &self,
        _course_id: &CourseId,
        request: &CourseUpdateRequest,
    ) -> ClientResult<()> {
        self.enter("update_course").await?;
        let mut server = self.server.lock().await;
        server.course.status = Some(request.status);
        server.course_updates.push(request.clone());
        Ok(())
    }

    async fn delete_course(&self, _course_id: &CourseId) -> ClientResult<()> {
        self.enter("delete_course").await
    }

    async fn upload_thumbnail(
        &self,
        _course_id: &CourseId,
        upload: FileUpload,
    ) -> ClientResult<UploadResponse> {
        self.enter("upload_thumbnail").await?;
        let path = format!("thumbnails/{}", upload.file_name);
        self.server.lock().await.course.thumbnail_path = Some(path.clone());
        Ok(UploadResponse { path })
    }

    async fn upsert_subjects(
        &self,
        _course_id: &CourseId,
        subjects: &[SubjectUpsert],
    ) -> ClientResult<BulkUpsertResponse<SubjectId>> {
        self.enter("upsert_subjects").await?;
        let mut server = self.server.lock().await;
        let mut response = BulkUpsertResponse::default();
        for subject in subjects {
            match &subject.id {
                Some(id) => {
                    if let Some(existing) = server
                        .subjects_mut()
                        .iter_mut()
                        .find(|record| record.id.as_ref() == Some(id))
                    {
                        existing.name = Some(subject.name.clone());
                    }
                    response.updated.push(EntityRef {
                        id: id.clone(),
                        name: Some(subject.name.clone()),
                    });
                }
                None => {
                    let id = SubjectId(server.fresh_id("subject"));
                    server.subjects_mut().push(SubjectRecord {
                        id: Some(id.clone()),
                        name: Some(subject.name.clone()),
                        ..SubjectRecord::default()
                    });
                    response.created.push(EntityRef {
                        id,
                        name: Some(subject.name.clone()),
                    });
                }
            }
        }
        Ok(response)
    }

    async fn delete_subject(&self, subject_id: &SubjectId) -> ClientResult<()> {
        self.enter("delete_subject").await?;
        self.server
            .lock()
            .await
            .subjects_mut()
            .retain(|record| record.id.as_ref() != Some(subject_id));
        Ok(())
    }

    async fn upsert_chapters(
        &self,
        subject_id: &SubjectId,
        chapters: &[ChapterUpsert],
    ) -> ClientResult<BulkUpsertResponse<ChapterId>> {
        self.enter("upsert_chapters").await?;
        let mut server = self.server.lock().await;
        let mut response = BulkUpsertResponse::default();
        let mut records = Vec::new();
        for chapter in chapters {
            let id = match &chapter.id {
                Some(id) => id.clone(),
                None => {
                    let id = ChapterId(server.fresh_id("chapter"));
                    response.created.push(EntityRef {
                        id: id.clone(),
                        name: Some(chapter.name.clone()),
                    });
                    id
                }
            };
            records.push(ChapterRecord {
                id: Some(id),
                name: Some(chapter.name.clone()),
                url: Some(chapter.url.clone()),
                input_type: Some(chapter.input_type),
                order: Some(chapter.order),
                ..ChapterRecord::default()
            });
        }
        if let Some(subject) = server
            .subjects_mut()
            .iter_mut()
            .find(|record| record.id.as_ref() == Some(subject_id))
        {
            subject.chapters = Some(records);
        }
        Ok(response)
    }

    async fn delete_chapter(
        &self,
        _subject_id: &SubjectId,
        _chapter_id: &ChapterId,
    ) -> ClientResult<()> {
        self.enter("delete_chapter").await
    }

    async fn get_chapter(&self, chapter_id: &ChapterId) -> ClientResult<ChapterRecord> {
        self.enter("get_chapter").await?;
        Ok(ChapterRecord {
            id: Some(chapter_id.clone()),
            content: Some("Speed is $v=\\\\frac{d}{t}$".to_string()),
            ..ChapterRecord::default()
        })
    }

    async fn update_chapter_content(
        &self,
        _course_id: &CourseId,
        _chapter_id: &ChapterId,
        content: &str,
    ) -> ClientResult<()> {
        self.enter("update_chapter_content").await?;
        self.server
            .lock()
            .await
            .content_updates
            .push(content.to_string());
        Ok(())
    }

    async fn upload_course_file(
        &self,
        _course_id: &CourseId,
        upload: FileUpload,
        progress: Option<ProgressSink>,
    ) -> ClientResult<UploadResponse> {
        self.enter("upload_course_file").await?;
        if let Some(progress) = progress {
            let total = upload.len();
            progress(UploadProgress {
                sent: total / 2,
                total,
            });
            progress(UploadProgress { sent: total, total });
        }
        Ok(UploadResponse {
            path: format!("files/{}", upload.file_name),
        })
    }

    async fn list_tests(&self, _course_id: &CourseId) -> ClientResult<Vec<TestSummary>> {
        self.enter("list_tests").await?;
        Ok(self.server.lock().await.tests.clone())
    }

    async fn get_test(&self, _test_id: &TestId) -> ClientResult<TestDocument> {
        self.enter("get_test").await?;
        Err(ClientError::validation("no tests stored"))
    }

    async fn create_test(
        &self,
        _course_id: &CourseId,
        test: &TestDocument,
    ) -> ClientResult<TestId> {
        self.enter("create_test").await?;
        let mut server = self.server.lock().await;
        let id = TestId(server.fresh_id("test"));
        server.tests.push(TestSummary {
            id: id.clone(),
            title: test.title.clone(),
            kind: test.kind,
            status: Some(test.status.clone()),
        });
        Ok(id)
    }

    async fn update_test(&self, _test_id: &TestId, _test: &TestDocument) -> ClientResult<()> {
        self.enter("update_test").await
    }

    async fn delete_test(&self, _course_id: &CourseId, test_id: &TestId) -> ClientResult<()> {
        self.enter("delete_test").await?;
        self.server
            .lock()
            .await
            .tests
            .retain(|test| &test.id != test_id);
        Ok(())
    }

    async fn auto_generate_test(
        &self,
        _course_id: &CourseId,
        _request: &AutoGenerateRequest,
    ) -> ClientResult<TestDocument> {
        self.enter("auto_generate_test").await?;
        Err(ClientError::validation("generation unavailable"))
    }

    async fn upload_image(
        &self,
        _course_id: &CourseId,
        upload: FileUpload,
    ) -> ClientResult<UploadResponse> {
        self.enter("upload_image").await?;
        Ok(UploadResponse {
            path: format!("images/{}", upload.file_name),
        })
    }

    async fn fetch_file(&self, _path: &str) -> ClientResult<Vec<u8>> {
        self.enter("fetch_file").await?;
        Ok(Vec::new())
    }

    async fn delete_file(&self, _path: &str) -> ClientResult<()> {
        self.enter("delete_file").await
    }

    async fn list_packages(&self, _course_id: &CourseId) -> ClientResult<Vec<PackageRecord>> {
        self.enter("list_packages").await?;
        Ok(self.server.lock().await.packages.clone())
    }

    async fn create_package(&self, request: &CreatePackageRequest) -> ClientResult<PackageId> {
        self.enter("create_package").await?;
        let mut server = self.server.lock().await;
        let id = PackageId(server.fresh_id("package"));
        server.packages.push(PackageRecord {
            id: Some(id.clone()),
            ..request.package.clone()
        });
        Ok(id)
    }

    async fn delete_package(&self, package_id: &PackageId) -> ClientResult<()> {
        self.enter("delete_package").await?;
        self.server
            .lock()
            .await
            .packages
            .retain(|package| package.id.as_ref() != Some(package_id));
        Ok(())
    }
}

const ADVANCE_DELAY: Duration = Duration::from_millis(10);

fn controller(api: &FakeApi) -> Arc<WizardController> {
    WizardController::new_with_dependencies(
        Arc::new(api.clone()),
        ADVANCE_DELAY,
        Arc::new(BasicMarkdown),
        Arc::new(BasicMarkdown),
    )
}

fn saved_course(subjects: Vec<SubjectRecord>) -> CourseRecord {
    CourseRecord {
        id: Some(CourseId::from("course-9")),
        name: Some("Physics 101".to_string()),
        description: Some("Mechanics from scratch".to_string()),
        thumbnail_path: Some("thumbnails/physics.png".to_string()),
        status: Some(CourseStatus::Draft),
        subjects: Some(subjects),
        ..CourseRecord::default()
    }
}

fn physics_with_intro() -> SubjectRecord {
    SubjectRecord {
        id: Some(SubjectId::from("s-1")),
        name: Some("Physics".to_string()),
        chapters: Some(vec![ChapterRecord {
            id: Some(ChapterId::from("ch-1")),
            name: Some("Intro".to_string()),
            input_type: Some(ChapterSourceKind::Manual),
            ..ChapterRecord::default()
        }]),
        ..SubjectRecord::default()
    }
}

fn cover() -> LocalImage {
    LocalImage {
        file_name: "cover.png".to_string(),
        mime: "image/png".to_string(),
        bytes: vec![1, 2, 3],
    }
}

fn drain(rx: &mut broadcast::Receiver<WizardEvent>) -> Vec<WizardEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn notices(events: &[WizardEvent]) -> Vec<&Notice> {
    events
        .iter()
        .filter_map(|event| match event {
            WizardEvent::Notice(notice) => Some(notice),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn incomplete_course_info_blocks_forward_navigation() {
    let api = FakeApi::default();
    let wizard = controller(&api);
    wizard.set_course_name("Algebra Basics").await;
    wizard.set_course_description("").await;

    let outcome = wizard.advance_to(2).await;

    assert_eq!(
        outcome,
        AdvanceOutcome::Blocked {
            at: Stage::CourseInfo
        }
    );
    assert_eq!(wizard.step().await, Stage::CourseInfo);
    assert!(api.calls().await.is_empty());
}

#[tokio::test]
async fn complete_draft_reaches_tests_and_announces_reload() {
    let api = FakeApi::default();
    let wizard = controller(&api);
    let mut events = wizard.subscribe_events();

    wizard.set_course_name("Physics 101").await;
    wizard.set_course_description("Mechanics").await;
    wizard.select_thumbnail(cover()).await;
    let physics = wizard.add_subject("Physics").await;
    let intro = wizard.add_chapter(physics).await.expect("subject exists");
    wizard
        .edit_chapter(physics, intro, |chapter| chapter.name = "Intro".to_string())
        .await;
    wizard
        .set_chapter_source_kind(physics, intro, ChapterSourceKind::Manual)
        .await;

    let outcome = wizard.advance_to(4).await;

    assert_eq!(
        outcome,
        AdvanceOutcome::Moved {
            from: Stage::CourseInfo,
            to: Stage::Tests
        }
    );
    assert_eq!(wizard.step().await, Stage::Tests);
    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|event| matches!(event, WizardEvent::TestsReloaded(tests) if tests.is_empty())));
    // never saved, so nothing to fetch
    assert!(!api.called("list_tests").await);
}

#[tokio::test]
async fn entering_tests_on_a_saved_course_fetches_its_tests() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");

    assert_eq!(
        wizard.advance_to(4).await,
        AdvanceOutcome::Moved {
            from: Stage::CourseInfo,
            to: Stage::Tests
        }
    );
    assert!(api.called("list_tests").await);
}

#[tokio::test]
async fn backward_moves_are_free_and_out_of_range_targets_ignored() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    wizard.advance_to(3).await;
    wizard.set_course_description(" ").await;

    assert_eq!(wizard.advance_to(0).await, AdvanceOutcome::Ignored);
    assert_eq!(wizard.advance_to(6).await, AdvanceOutcome::Ignored);
    assert_eq!(wizard.advance_to(3).await, AdvanceOutcome::Unchanged);
    assert_eq!(
        wizard.prev_step().await,
        AdvanceOutcome::Moved {
            from: Stage::Chapters,
            to: Stage::Subjects
        }
    );
    assert_eq!(
        wizard.advance_to(1).await,
        AdvanceOutcome::Moved {
            from: Stage::Subjects,
            to: Stage::CourseInfo
        }
    );
    assert_eq!(
        wizard.next_step().await,
        AdvanceOutcome::Blocked {
            at: Stage::CourseInfo
        }
    );
}

#[tokio::test]
async fn reported_validity_holds_until_the_next_edit() {
    let api = FakeApi::default();
    let wizard = controller(&api);

    wizard.report_validity(Stage::CourseInfo, true).await;
    assert!(wizard.flags().await.course);
    assert_eq!(
        wizard.advance_to(2).await,
        AdvanceOutcome::Moved {
            from: Stage::CourseInfo,
            to: Stage::Subjects
        }
    );

    wizard.set_course_name("Only a name").await;
    assert!(!wizard.flags().await.course);
}

#[tokio::test]
async fn opening_a_course_initialises_flags_from_the_record() {
    let api = FakeApi::with_course(saved_course(vec![SubjectRecord {
        id: Some(SubjectId::from("s-1")),
        name: Some("Physics".to_string()),
        ..SubjectRecord::default()
    }]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");

    assert_eq!(
        wizard.flags().await,
        ValidityFlags {
            course: true,
            subjects: true,
            chapters: false,
        }
    );
    assert_eq!(
        wizard.advance_to(5).await,
        AdvanceOutcome::Blocked {
            at: Stage::Chapters
        }
    );
}

#[tokio::test(start_paused = true)]
async fn saving_a_new_course_creates_uploads_and_advances() {
    let api = FakeApi::default();
    let wizard = controller(&api);
    let mut events = wizard.subscribe_events();
    wizard.set_course_name("Physics 101").await;
    wizard.set_course_description("Mechanics").await;
    wizard.select_thumbnail(cover()).await;

    let outcome = wizard.save_current_stage().await.expect("saved");

    assert_eq!(
        outcome,
        SaveOutcome::Saved {
            advanced: Some(AdvanceOutcome::Moved {
                from: Stage::CourseInfo,
                to: Stage::Subjects
            })
        }
    );
    let course = wizard.course().await;
    assert_eq!(course.id, Some(CourseId::from("course-1")));
    assert_eq!(
        course.thumbnail,
        Thumbnail::Persisted("thumbnails/cover.png".to_string())
    );
    assert_eq!(api.calls().await, vec!["create_course", "upload_thumbnail"]);
    let events = drain(&mut events);
    assert!(notices(&events)
        .iter()
        .any(|notice| notice.level == NoticeLevel::Success));
}

#[tokio::test(start_paused = true)]
async fn thumbnail_failure_still_advances_with_an_info_notice() {
    let api = FakeApi::default();
    api.fail("upload_thumbnail").await;
    let wizard = controller(&api);
    let mut events = wizard.subscribe_events();
    wizard.set_course_name("Physics 101").await;
    wizard.set_course_description("Mechanics").await;
    wizard.select_thumbnail(cover()).await;

    let outcome = wizard.save_current_stage().await.expect("saved");

    assert!(matches!(
        outcome,
        SaveOutcome::Saved {
            advanced: Some(AdvanceOutcome::Moved { .. })
        }
    ));
    assert_eq!(wizard.step().await, Stage::Subjects);
    let course = wizard.course().await;
    assert!(course.id.is_some());
    assert!(course.thumbnail.pending_upload().is_some());
    let events = drain(&mut events);
    assert!(notices(&events)
        .iter()
        .any(|notice| notice.level == NoticeLevel::Info));
}

#[tokio::test]
async fn invalid_stage_is_touched_and_never_sent() {
    let api = FakeApi::default();
    let wizard = controller(&api);
    wizard.set_course_name("Algebra Basics").await;
    assert!(!wizard.is_touched(Stage::CourseInfo).await);

    let err = wizard.save_current_stage().await.expect_err("invalid");

    assert!(matches!(err, ClientError::Validation(_)));
    assert!(wizard.is_touched(Stage::CourseInfo).await);
    assert!(api.calls().await.is_empty());
}

#[tokio::test]
async fn failed_subject_save_leaves_draft_untouched() {
    let api = FakeApi::with_course(saved_course(Vec::new()));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    wizard.advance_to(2).await;
    wizard.add_subject("Physics").await;
    api.fail("upsert_subjects").await;
    let before = wizard.course().await;
    let mut events = wizard.subscribe_events();

    let err = wizard.save_current_stage().await.expect_err("rejected");

    assert_eq!(err.status(), Some(500));
    assert_eq!(wizard.course().await, before);
    assert_eq!(wizard.step().await, Stage::Subjects);
    let events = drain(&mut events);
    let notices = notices(&events);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].context, NoticeContext::SubjectsSave);
}

#[tokio::test]
async fn failed_course_create_keeps_the_draft_unsaved() {
    let api = FakeApi::default();
    api.fail("create_course").await;
    let wizard = controller(&api);
    wizard.set_course_name("Physics 101").await;
    wizard.set_course_description("Mechanics").await;
    wizard.select_thumbnail(cover()).await;
    let before = wizard.course().await;
    let mut events = wizard.subscribe_events();

    let err = wizard.save_current_stage().await.expect_err("rejected");

    assert_eq!(err.status(), Some(500));
    let course = wizard.course().await;
    assert_eq!(course, before);
    assert_eq!(course.id, None);
    assert_eq!(wizard.step().await, Stage::CourseInfo);
    assert!(!api.called("upload_thumbnail").await);
    let events = drain(&mut events);
    let notices = notices(&events);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].context, NoticeContext::CourseSave);
}

#[tokio::test]
async fn failed_course_update_keeps_edits_and_step() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    wizard.set_course_description("Kinematics first").await;
    api.fail("update_course").await;
    let before = wizard.course().await;
    let mut events = wizard.subscribe_events();

    assert!(wizard.save_current_stage().await.is_err());

    assert_eq!(wizard.course().await, before);
    assert_eq!(wizard.step().await, Stage::CourseInfo);
    let events = drain(&mut events);
    assert!(notices(&events).iter().any(|notice| {
        notice.level == NoticeLevel::Error && notice.context == NoticeContext::CourseSave
    }));
}

#[tokio::test]
async fn failed_reload_after_subject_save_keeps_created_ids() {
    let api = FakeApi::with_course(saved_course(Vec::new()));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    wizard.advance_to(2).await;
    let physics = wizard.add_subject("Physics").await;
    api.fail("get_course").await;
    let mut events = wizard.subscribe_events();

    let err = wizard.save_current_stage().await.expect_err("reload failed");

    assert_eq!(err.status(), Some(500));
    assert_eq!(
        wizard
            .course()
            .await
            .subject(physics)
            .and_then(|s| s.id.clone()),
        Some(SubjectId::from("subject-1"))
    );
    assert_eq!(wizard.step().await, Stage::Subjects);
    let events = drain(&mut events);
    let notices = notices(&events);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].context, NoticeContext::SubjectsSave);
}

#[tokio::test(start_paused = true)]
async fn subject_save_keeps_local_keys_and_learns_server_ids() {
    let api = FakeApi::with_course(saved_course(Vec::new()));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    wizard.advance_to(2).await;
    let physics = wizard.add_subject("Physics").await;
    let chemistry = wizard.add_subject("Chemistry").await;

    wizard.save_current_stage().await.expect("saved");

    let course = wizard.course().await;
    assert_eq!(
        course.subject(physics).and_then(|s| s.id.clone()),
        Some(SubjectId::from("subject-1"))
    );
    assert_eq!(
        course.subject(chemistry).and_then(|s| s.id.clone()),
        Some(SubjectId::from("subject-2"))
    );
    assert_eq!(
        api.calls().await,
        vec!["get_course", "upsert_subjects", "get_course"]
    );
    // chapters are still missing, so the wizard cannot move on
    assert_eq!(wizard.step().await, Stage::Subjects);
}

#[tokio::test(start_paused = true)]
async fn superseded_subject_save_is_discarded() {
    let api = FakeApi::with_course(saved_course(Vec::new()));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    wizard.advance_to(2).await;
    let physics = wizard.add_subject("Physics").await;
    api.delay_next("upsert_subjects", Duration::from_millis(100))
        .await;

    let slow = {
        let wizard = wizard.clone();
        tokio::spawn(async move { wizard.save_current_stage().await })
    };
    while !api.called("upsert_subjects").await {
        tokio::task::yield_now().await;
    }

    let fast = wizard.save_current_stage().await.expect("second save");
    let slow = slow.await.expect("join").expect("first save");

    assert!(matches!(fast, SaveOutcome::Saved { .. }));
    assert_eq!(slow, SaveOutcome::Superseded);
    let course = wizard.course().await;
    assert_eq!(course.subjects.len(), 1);
    assert_eq!(
        course.subject(physics).and_then(|s| s.id.clone()),
        Some(SubjectId::from("subject-1"))
    );
}

#[tokio::test(start_paused = true)]
async fn chapter_save_assigns_ids_and_moves_to_tests() {
    let api = FakeApi::with_course(saved_course(vec![SubjectRecord {
        id: Some(SubjectId::from("s-1")),
        name: Some("Physics".to_string()),
        ..SubjectRecord::default()
    }]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    wizard.advance_to(3).await;
    let physics = wizard.course().await.subjects[0].key;
    let intro = wizard.add_chapter(physics).await.expect("subject exists");
    wizard
        .edit_chapter(physics, intro, |chapter| {
            chapter.name = "Intro".to_string();
            chapter.source = ChapterSource::Manual;
        })
        .await;

    let outcome = wizard.save_current_stage().await.expect("saved");

    assert_eq!(
        outcome,
        SaveOutcome::Saved {
            advanced: Some(AdvanceOutcome::Moved {
                from: Stage::Chapters,
                to: Stage::Tests
            })
        }
    );
    let course = wizard.course().await;
    let chapter = course
        .subject(physics)
        .and_then(|subject| subject.chapter(intro))
        .expect("chapter kept its key");
    assert_eq!(chapter.id, Some(ChapterId::from("chapter-1")));
    assert!(api.called("list_tests").await);
}

#[tokio::test(start_paused = true)]
async fn partial_chapter_save_keeps_ids_from_the_first_subject() {
    let api = FakeApi::with_course(saved_course(vec![
        SubjectRecord {
            id: Some(SubjectId::from("s-1")),
            name: Some("Physics".to_string()),
            ..SubjectRecord::default()
        },
        SubjectRecord {
            id: Some(SubjectId::from("s-2")),
            name: Some("Chemistry".to_string()),
            ..SubjectRecord::default()
        },
    ]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    wizard.advance_to(3).await;
    let subjects = wizard.course().await.subjects;
    let mut chapters = Vec::new();
    for (subject, name) in subjects.iter().zip(["Motion", "Atoms"]) {
        let chapter = wizard.add_chapter(subject.key).await.expect("subject exists");
        wizard
            .edit_chapter(subject.key, chapter, |draft| {
                draft.name = name.to_string();
                draft.source = ChapterSource::Manual;
            })
            .await;
        chapters.push((subject.key, chapter));
    }
    api.fail_after("upsert_chapters", 1).await;
    let mut events = wizard.subscribe_events();

    let err = wizard.save_current_stage().await.expect_err("second subject failed");

    assert_eq!(err.status(), Some(500));
    let course = wizard.course().await;
    let chapter_id = |(subject, chapter): (LocalKey, LocalKey)| {
        course
            .subject(subject)
            .and_then(|s| s.chapter(chapter))
            .and_then(|c| c.id.clone())
    };
    assert_eq!(chapter_id(chapters[0]), Some(ChapterId::from("chapter-1")));
    assert_eq!(chapter_id(chapters[1]), None);
    assert_eq!(wizard.step().await, Stage::Chapters);
    assert_eq!(
        api.calls().await,
        vec!["get_course", "upsert_chapters", "upsert_chapters"]
    );
    let events = drain(&mut events);
    assert!(notices(&events).iter().any(|notice| {
        notice.level == NoticeLevel::Error && notice.context == NoticeContext::ChaptersSave
    }));
}

#[tokio::test(start_paused = true)]
async fn superseded_chapter_save_drops_its_failure_quietly() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    wizard.advance_to(3).await;
    api.delay_next("upsert_chapters", Duration::from_millis(100))
        .await;
    api.fail_after("upsert_chapters", 1).await;
    let mut events = wizard.subscribe_events();

    let slow = {
        let wizard = wizard.clone();
        tokio::spawn(async move { wizard.save_current_stage().await })
    };
    while !api.called("upsert_chapters").await {
        tokio::task::yield_now().await;
    }

    let fast = wizard.save_current_stage().await.expect("second save");
    let slow = slow.await.expect("join").expect("superseded, not failed");

    assert!(matches!(fast, SaveOutcome::Saved { .. }));
    assert_eq!(slow, SaveOutcome::Superseded);
    let events = drain(&mut events);
    assert!(notices(&events)
        .iter()
        .all(|notice| notice.level != NoticeLevel::Error));
}

#[tokio::test]
async fn removing_a_saved_subject_waits_for_the_server() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    let physics = wizard.course().await.subjects[0].key;

    api.fail("delete_subject").await;
    assert!(wizard.remove_subject(physics).await.is_err());
    assert_eq!(wizard.course().await.subjects.len(), 1);

    api.recover("delete_subject").await;
    wizard.remove_subject(physics).await.expect("deleted");
    assert!(wizard.course().await.subjects.is_empty());
    assert!(!wizard.flags().await.subjects);
}

#[tokio::test]
async fn unsaved_chapters_are_removed_locally() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    let physics = wizard.course().await.subjects[0].key;
    let draft = wizard.add_chapter(physics).await.expect("subject exists");

    wizard.remove_chapter(physics, draft).await.expect("removed");

    assert_eq!(wizard.course().await.subjects[0].chapters.len(), 1);
    assert!(!api.called("delete_chapter").await);
}

#[tokio::test]
async fn publishing_requires_accepted_terms() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");

    assert!(matches!(
        wizard.publish().await,
        Err(ClientError::Validation(_))
    ));
    assert!(!api.called("update_course").await);

    wizard.set_terms_accepted(true).await;
    wizard.publish().await.expect("published");
    assert_eq!(wizard.course().await.status, CourseStatus::Active);

    wizard.unpublish().await.expect("unpublished");
    assert_eq!(wizard.course().await.status, CourseStatus::Draft);
    let updates = api.server.lock().await.course_updates.clone();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].status, CourseStatus::Active);
}

#[tokio::test]
async fn deleting_a_course_needs_the_typed_confirmation() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");

    assert!(wizard.delete_course("delete physics 101").await.is_err());
    assert!(!api.called("delete_course").await);

    wizard
        .delete_course("  delete Physics 101 ")
        .await
        .expect("deleted");
    assert!(api.called("delete_course").await);
    let course = wizard.course().await;
    assert_eq!(course.id, None);
    assert!(course.name.is_empty());
    assert_eq!(wizard.step().await, Stage::CourseInfo);
}

#[tokio::test]
async fn chapter_upload_points_the_chapter_at_the_file() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    let subject = wizard.course().await.subjects[0].clone();
    let chapter = subject.chapters[0].key;
    let mut events = wizard.subscribe_events();

    let path = wizard
        .upload_chapter_file(
            subject.key,
            chapter,
            FileUpload::new("notes.pdf", vec![0; 10]),
        )
        .await
        .expect("uploaded");

    assert_eq!(path, "files/notes.pdf");
    let course = wizard.course().await;
    let uploaded = course.subjects[0].chapter(chapter).expect("chapter");
    assert_eq!(uploaded.source, ChapterSource::File(path));
    assert_eq!(uploaded.upload_progress, None);
    let percents: Vec<u8> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            WizardEvent::UploadProgress { percent, .. } => Some(percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![50, 100]);
}

#[tokio::test(start_paused = true)]
async fn upload_for_a_removed_chapter_reports_the_drop() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    let subject = wizard.course().await.subjects[0].clone();
    let (subject, chapter) = (subject.key, subject.chapters[0].key);
    api.delay_next("upload_course_file", Duration::from_millis(100))
        .await;
    let mut events = wizard.subscribe_events();

    let upload = {
        let wizard = wizard.clone();
        tokio::spawn(async move {
            let upload = FileUpload::new("notes.pdf", vec![1; 8]);
            wizard.upload_chapter_file(subject, chapter, upload).await
        })
    };
    while !api.called("upload_course_file").await {
        tokio::task::yield_now().await;
    }
    wizard
        .remove_chapter(subject, chapter)
        .await
        .expect("removed");

    let path = upload.await.expect("join").expect("uploaded");

    assert_eq!(path, "files/notes.pdf");
    assert!(wizard.course().await.subjects[0].chapters.is_empty());
    let events = drain(&mut events);
    let levels: Vec<NoticeLevel> = notices(&events)
        .iter()
        .filter(|notice| notice.context == NoticeContext::Upload)
        .map(|notice| notice.level)
        .collect();
    assert_eq!(levels, vec![NoticeLevel::Info]);
}

#[tokio::test]
async fn oversized_pdf_is_refused_before_upload() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    let subject = wizard.course().await.subjects[0].clone();
    let upload = FileUpload::new(
        "huge.pdf",
        vec![0; (crate::upload::MAX_PDF_BYTES + 1) as usize],
    );

    let result = wizard
        .upload_chapter_file(subject.key, subject.chapters[0].key, upload)
        .await;

    assert!(matches!(result, Err(ClientError::Validation(_))));
    assert!(!api.called("upload_course_file").await);
}

#[tokio::test]
async fn chapter_content_round_trips_through_the_editor() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    let chapter_id = ChapterId::from("ch-1");

    let html = wizard
        .load_chapter_content(&chapter_id)
        .await
        .expect("loaded");
    assert_eq!(
        html,
        "<p>Speed is <span class=\"ql-formula\" data-value=\"v=\\frac{d}{t}\"></span></p>"
    );

    let markdown = wizard
        .save_chapter_content(&chapter_id, &html)
        .await
        .expect("saved");
    assert_eq!(markdown, "Speed is $v=\\frac{d}{t}$");
    assert_eq!(
        api.server.lock().await.content_updates,
        vec![markdown.clone()]
    );
}

#[tokio::test]
async fn packages_are_validated_before_creation() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");

    let mut package = crate::packages::empty_package();
    package.name = "Full access".to_string();
    package.price = Some(999.0);
    package.duration = PackageDuration {
        value: Some(6),
        ..PackageDuration::default()
    };
    assert!(wizard.add_package(&package).await.is_err());
    assert!(!api.called("create_package").await);

    package.features = PackageFeatures {
        videos: true,
        ..PackageFeatures::default()
    };
    wizard.add_package(&package).await.expect("created");
    let packages = wizard.packages().await;
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].id, Some(PackageId::from("package-1")));

    wizard.remove_package(0).await.expect("removed");
    assert!(api.called("delete_package").await);
    assert!(wizard.packages().await.is_empty());
}

#[tokio::test]
async fn unsaved_packages_are_dropped_without_a_request() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    api.server.lock().await.packages.push(PackageRecord {
        name: "Pending".to_string(),
        ..crate::packages::empty_package()
    });
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    wizard.reload_packages().await.expect("loaded");

    wizard.remove_package(0).await.expect("removed");

    assert!(wizard.packages().await.is_empty());
    assert!(!api.called("delete_package").await);
}

#[tokio::test]
async fn saving_a_new_test_creates_it_and_refreshes_the_list() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");
    let mut editor = wizard.new_test().await;
    assert_eq!(editor.test().chapter_id.as_deref(), Some("ch-1"));

    assert!(wizard.save_test(editor.test()).await.is_err());
    assert!(!api.called("create_test").await);

    editor.test_mut().title = "Kinematics quiz".to_string();
    let index = editor.add_question(0).expect("section");
    let question = editor.question_mut(0, index).expect("question");
    question.text = "Unit of speed?".to_string();
    question.body = shared::protocol::QuestionBody::Descriptive {
        model_answer: "m/s".to_string(),
    };

    let test_id = wizard.save_test(editor.test()).await.expect("saved");

    assert_eq!(test_id, TestId::from("test-1"));
    let tests = wizard.tests().await;
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].title, "Kinematics quiz");

    wizard.delete_test(&test_id).await.expect("deleted");
    assert!(wizard.tests().await.is_empty());
}

#[tokio::test]
async fn invalid_generation_config_is_not_sent() {
    let api = FakeApi::with_course(saved_course(vec![physics_with_intro()]));
    let wizard = controller(&api);
    wizard
        .open_course(&CourseId::from("course-9"))
        .await
        .expect("open");

    let result = wizard.request_auto_generation(&AutoGenConfig::default()).await;

    assert!(matches!(result, Err(ClientError::Validation(_))));
    assert!(!api.called("auto_generate_test").await);
}
