//! The five-stage course authoring wizard.
//!
//! [`WizardController`] owns the draft aggregate behind an async mutex and
//! drives every remote write through [`CreatorApi`]. The lock is released
//! before each network call and re-taken to apply the response, so a save
//! started later can overtake an earlier one; generation tickets decide which
//! response wins.

use std::{collections::HashMap, sync::Arc, time::Duration};

use shared::{
    domain::{ChapterId, ChapterSourceKind, CourseId, CourseStatus, LocalKey, TestId},
    protocol::{CourseRecord, PackageRecord, TestDocument, TestSummary},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    assessment::{validate_test, AutoGenConfig, ChapterCatalog, TestEditor},
    config::Settings,
    draft::{
        assign_created_chapter_ids, assign_created_subject_ids, chapter_upserts, normalize_course,
        reconcile_reloaded, ChapterSource, DraftChapter, DraftCourse, DraftSubject, LocalImage,
        Thumbnail,
    },
    error::{ClientError, ClientResult},
    markdown::{
        editor_html_to_markdown, markdown_to_editor_html, unescape_stored_content, BasicMarkdown,
        HtmlToMarkdown, MarkdownRenderer,
    },
    notify::{Notice, NoticeContext},
    packages::{create_request, validate_package},
    upload::{FileUpload, ProgressSink, UploadProgress},
    validation::{
        chapters_valid, course_info_valid, subjects_valid, validate_chapters,
        validate_course_info, validate_subjects,
    },
    CreatorApi,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    CourseInfo = 1,
    Subjects = 2,
    Chapters = 3,
    Tests = 4,
    Packages = 5,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::CourseInfo,
        Stage::Subjects,
        Stage::Chapters,
        Stage::Tests,
        Stage::Packages,
    ];

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.number() == number)
    }

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn prev(self) -> Option<Self> {
        self.number().checked_sub(1).and_then(Self::from_number)
    }

    /// Tests and Packages never hold the wizard back.
    pub fn blocks_navigation(self) -> bool {
        matches!(self, Self::CourseInfo | Self::Subjects | Self::Chapters)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidityFlags {
    pub course: bool,
    pub subjects: bool,
    pub chapters: bool,
}

impl ValidityFlags {
    pub fn from_course(course: &DraftCourse) -> Self {
        Self {
            course: course_info_valid(course),
            subjects: subjects_valid(course),
            chapters: chapters_valid(course),
        }
    }

    pub fn allows(&self, stage: Stage) -> bool {
        match stage {
            Stage::CourseInfo => self.course,
            Stage::Subjects => self.subjects,
            Stage::Chapters => self.chapters,
            Stage::Tests | Stage::Packages => true,
        }
    }

    fn set(&mut self, stage: Stage, valid: bool) {
        match stage {
            Stage::CourseInfo => self.course = valid,
            Stage::Subjects => self.subjects = valid,
            Stage::Chapters => self.chapters = valid,
            Stage::Tests | Stage::Packages => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved { from: Stage, to: Stage },
    /// `at` is the first stage in the way whose flag is false.
    Blocked { at: Stage },
    /// Target outside `1..=5`.
    Ignored,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// `advanced` is `None` when a newer save of the same stage started while
    /// this one waited to advance.
    Saved { advanced: Option<AdvanceOutcome> },
    /// A later save of the same stage owns the result; nothing was applied.
    Superseded,
    NothingToSave,
}

#[derive(Debug, Clone)]
pub enum WizardEvent {
    Notice(Notice),
    StepChanged(Stage),
    ValidityChanged(ValidityFlags),
    CourseReloaded,
    TestsReloaded(Vec<TestSummary>),
    PackagesReloaded(Vec<PackageRecord>),
    UploadProgress {
        subject: LocalKey,
        chapter: LocalKey,
        percent: u8,
    },
}

struct WizardState {
    step: Stage,
    course: DraftCourse,
    flags: ValidityFlags,
    touched: HashMap<Stage, bool>,
    generations: HashMap<Stage, u64>,
    tests: Vec<TestSummary>,
    packages: Vec<PackageRecord>,
    terms_accepted: bool,
}

impl WizardState {
    fn new(course: DraftCourse) -> Self {
        Self {
            step: Stage::CourseInfo,
            flags: ValidityFlags::from_course(&course),
            course,
            touched: HashMap::new(),
            generations: HashMap::new(),
            tests: Vec::new(),
            packages: Vec::new(),
            terms_accepted: false,
        }
    }

    fn next_ticket(&mut self, stage: Stage) -> u64 {
        let generation = self.generations.entry(stage).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_current(&self, stage: Stage, ticket: u64) -> bool {
        self.generations.get(&stage).copied().unwrap_or(0) == ticket
    }
}

pub struct WizardController {
    api: Arc<dyn CreatorApi>,
    advance_delay: Duration,
    renderer: Arc<dyn MarkdownRenderer>,
    converter: Arc<dyn HtmlToMarkdown>,
    inner: Mutex<WizardState>,
    events: broadcast::Sender<WizardEvent>,
}

impl WizardController {
    pub fn new(api: Arc<dyn CreatorApi>, settings: &Settings) -> Arc<Self> {
        Self::new_with_dependencies(
            api,
            settings.advance_delay,
            Arc::new(BasicMarkdown),
            Arc::new(BasicMarkdown),
        )
    }

    pub fn new_with_dependencies(
        api: Arc<dyn CreatorApi>,
        advance_delay: Duration,
        renderer: Arc<dyn MarkdownRenderer>,
        converter: Arc<dyn HtmlToMarkdown>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            advance_delay,
            renderer,
            converter,
            inner: Mutex::new(WizardState::new(DraftCourse::default())),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    pub async fn step(&self) -> Stage {
        self.inner.lock().await.step
    }

    pub async fn course(&self) -> DraftCourse {
        self.inner.lock().await.course.clone()
    }

    pub async fn flags(&self) -> ValidityFlags {
        self.inner.lock().await.flags
    }

    /// Whether validation errors should be shown for `stage`.
    pub async fn is_touched(&self, stage: Stage) -> bool {
        let state = self.inner.lock().await;
        state.touched.get(&stage).copied().unwrap_or(false)
    }

    pub async fn tests(&self) -> Vec<TestSummary> {
        self.inner.lock().await.tests.clone()
    }

    pub async fn packages(&self) -> Vec<PackageRecord> {
        self.inner.lock().await.packages.clone()
    }

    fn emit(&self, event: WizardEvent) {
        let _ = self.events.send(event);
    }

    fn notify(&self, notice: Notice) {
        self.emit(WizardEvent::Notice(notice));
    }

    /// Emits an error notice for `err` and hands it back for propagation.
    fn failed(&self, context: NoticeContext, err: ClientError) -> ClientError {
        warn!(?context, "wizard operation failed: {err}");
        self.notify(Notice::from_error(context, &err));
        err
    }

    fn recompute(&self, state: &mut WizardState) {
        let flags = ValidityFlags::from_course(&state.course);
        if flags != state.flags {
            state.flags = flags;
            self.emit(WizardEvent::ValidityChanged(flags));
        }
    }

    async fn mutate<R>(&self, edit: impl FnOnce(&mut DraftCourse) -> R) -> R {
        let mut state = self.inner.lock().await;
        let result = edit(&mut state.course);
        self.recompute(&mut state);
        result
    }

    // ---------------------------------------------------------------------
    // Navigation
    // ---------------------------------------------------------------------

    pub async fn advance_to(&self, target: u8) -> AdvanceOutcome {
        let Some(target) = Stage::from_number(target) else {
            debug!(target, "ignoring navigation outside the wizard");
            return AdvanceOutcome::Ignored;
        };

        let outcome = {
            let mut state = self.inner.lock().await;
            let from = state.step;
            if target == from {
                AdvanceOutcome::Unchanged
            } else if target > from {
                let blocked = Stage::ALL
                    .into_iter()
                    .filter(|stage| *stage >= from && *stage < target)
                    .find(|stage| stage.blocks_navigation() && !state.flags.allows(*stage));
                match blocked {
                    Some(at) => AdvanceOutcome::Blocked { at },
                    None => {
                        state.step = target;
                        AdvanceOutcome::Moved { from, to: target }
                    }
                }
            } else {
                state.step = target;
                AdvanceOutcome::Moved { from, to: target }
            }
        };

        match outcome {
            AdvanceOutcome::Moved { to, .. } => {
                self.emit(WizardEvent::StepChanged(to));
                if to == Stage::Tests {
                    let _ = self.reload_tests().await;
                }
            }
            AdvanceOutcome::Blocked { at } => {
                debug!(?at, ?target, "navigation blocked by invalid stage");
            }
            AdvanceOutcome::Ignored | AdvanceOutcome::Unchanged => {}
        }
        outcome
    }

    pub async fn next_step(&self) -> AdvanceOutcome {
        match self.step().await.next() {
            Some(next) => self.advance_to(next.number()).await,
            None => AdvanceOutcome::Unchanged,
        }
    }

    pub async fn prev_step(&self) -> AdvanceOutcome {
        match self.step().await.prev() {
            Some(prev) => self.advance_to(prev.number()).await,
            None => AdvanceOutcome::Unchanged,
        }
    }

    /// Stores a validity flag reported by a stage view. The next draft
    /// mutation recomputes it from the aggregate.
    pub async fn report_validity(&self, stage: Stage, valid: bool) {
        let mut state = self.inner.lock().await;
        let mut flags = state.flags;
        flags.set(stage, valid);
        if flags != state.flags {
            state.flags = flags;
            self.emit(WizardEvent::ValidityChanged(flags));
        }
    }

    // ---------------------------------------------------------------------
    // Loading
    // ---------------------------------------------------------------------

    /// Starts over with an empty draft at the first stage.
    pub async fn new_course(&self) {
        let mut state = self.inner.lock().await;
        *state = WizardState::new(DraftCourse::default());
        drop(state);
        self.emit(WizardEvent::CourseReloaded);
        self.emit(WizardEvent::StepChanged(Stage::CourseInfo));
    }

    /// Loads an existing course for editing. Validity flags start from the
    /// loaded aggregate.
    pub async fn open_course(&self, course_id: &CourseId) -> ClientResult<()> {
        let record = self
            .api
            .get_course(course_id)
            .await
            .map_err(|err| self.failed(NoticeContext::General, err))?;
        let course = normalize_course(record);
        info!(
            course_id = %course_id,
            subjects = course.subjects.len(),
            chapters = course.chapter_count(),
            "course opened"
        );
        {
            let mut state = self.inner.lock().await;
            *state = WizardState::new(course);
            self.emit(WizardEvent::ValidityChanged(state.flags));
        }
        self.emit(WizardEvent::CourseReloaded);
        self.emit(WizardEvent::StepChanged(Stage::CourseInfo));
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Draft edits
    // ---------------------------------------------------------------------

    pub async fn set_course_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.mutate(|course| course.name = name).await;
    }

    pub async fn set_course_description(&self, description: impl Into<String>) {
        let description = description.into();
        self.mutate(|course| course.description = description).await;
    }

    /// Shows `image` as the thumbnail preview; it is uploaded on the next
    /// course save. Returns the preview data URL.
    pub async fn select_thumbnail(&self, image: LocalImage) -> String {
        let preview = image.data_url();
        self.mutate(|course| course.thumbnail = Thumbnail::LocalPreview(image))
            .await;
        preview
    }

    pub async fn add_subject(&self, name: impl Into<String>) -> LocalKey {
        let subject = DraftSubject::named(name);
        let key = subject.key;
        self.mutate(|course| course.subjects.push(subject)).await;
        key
    }

    pub async fn rename_subject(&self, subject: LocalKey, name: impl Into<String>) {
        let name = name.into();
        self.mutate(|course| {
            if let Some(target) = course.subject_mut(subject) {
                target.name = name;
            }
        })
        .await;
    }

    /// Saved subjects are deleted remotely first and only dropped locally once
    /// the server agrees.
    pub async fn remove_subject(&self, subject: LocalKey) -> ClientResult<()> {
        let found = {
            let state = self.inner.lock().await;
            state.course.subject(subject).map(|target| target.id.clone())
        };
        let Some(subject_id) = found else {
            return Ok(());
        };

        if let Some(subject_id) = subject_id {
            self.api
                .delete_subject(&subject_id)
                .await
                .map_err(|err| self.failed(NoticeContext::SubjectsSave, err))?;
            info!(subject_id = %subject_id, "subject deleted");
        }
        self.mutate(|course| course.subjects.retain(|target| target.key != subject))
            .await;
        Ok(())
    }

    /// Appends an unnamed link chapter. `None` when the subject is unknown.
    pub async fn add_chapter(&self, subject: LocalKey) -> Option<LocalKey> {
        self.mutate(|course| {
            let target = course.subject_mut(subject)?;
            let chapter = DraftChapter::default();
            let key = chapter.key;
            target.chapters.push(chapter);
            Some(key)
        })
        .await
    }

    pub async fn remove_chapter(&self, subject: LocalKey, chapter: LocalKey) -> ClientResult<()> {
        let ids = {
            let state = self.inner.lock().await;
            state.course.subject(subject).and_then(|target| {
                target
                    .chapter(chapter)
                    .map(|found| (target.id.clone(), found.id.clone()))
            })
        };
        let Some((subject_id, chapter_id)) = ids else {
            return Ok(());
        };

        if let (Some(subject_id), Some(chapter_id)) = (subject_id, chapter_id) {
            self.api
                .delete_chapter(&subject_id, &chapter_id)
                .await
                .map_err(|err| self.failed(NoticeContext::ChaptersSave, err))?;
            info!(chapter_id = %chapter_id, "chapter deleted");
        }
        self.mutate(|course| {
            if let Some(target) = course.subject_mut(subject) {
                target.chapters.retain(|found| found.key != chapter);
            }
        })
        .await;
        Ok(())
    }

    /// Switching the source kind discards the previous link or file path.
    pub async fn set_chapter_source_kind(
        &self,
        subject: LocalKey,
        chapter: LocalKey,
        kind: ChapterSourceKind,
    ) {
        self.edit_chapter(subject, chapter, |target| {
            if target.source.kind() != kind {
                target.source = ChapterSource::empty(kind);
            }
        })
        .await;
    }

    pub async fn edit_chapter(
        &self,
        subject: LocalKey,
        chapter: LocalKey,
        edit: impl FnOnce(&mut DraftChapter),
    ) -> bool {
        self.mutate(|course| match course.chapter_mut(subject, chapter) {
            Some(target) => {
                edit(target);
                true
            }
            None => false,
        })
        .await
    }

    // ---------------------------------------------------------------------
    // Saving
    // ---------------------------------------------------------------------

    /// Validates and persists the current stage. On success the wizard moves
    /// on after the configured delay.
    pub async fn save_current_stage(&self) -> ClientResult<SaveOutcome> {
        match self.step().await {
            Stage::CourseInfo => self.save_course_info().await,
            Stage::Subjects => self.save_subjects().await,
            Stage::Chapters => self.save_chapters().await,
            Stage::Tests | Stage::Packages => Ok(SaveOutcome::NothingToSave),
        }
    }

    /// Runs `check` against the draft. A failure marks the stage touched; a
    /// pass hands out a ticket and a snapshot to send.
    async fn begin_save(
        &self,
        stage: Stage,
        check: impl FnOnce(&DraftCourse) -> ClientResult<()>,
    ) -> ClientResult<(u64, DraftCourse)> {
        let mut state = self.inner.lock().await;
        if let Err(err) = check(&state.course) {
            state.touched.insert(stage, true);
            debug!(?stage, "save rejected locally: {err}");
            return Err(err);
        }
        let ticket = state.next_ticket(stage);
        Ok((ticket, state.course.clone()))
    }

    async fn finish_save(&self, stage: Stage, ticket: u64) -> ClientResult<SaveOutcome> {
        tokio::time::sleep(self.advance_delay).await;
        if !self.inner.lock().await.is_current(stage, ticket) {
            debug!(?stage, ticket, "newer save started; not advancing");
            return Ok(SaveOutcome::Saved { advanced: None });
        }
        let advanced = match stage.next() {
            Some(next) => Some(self.advance_to(next.number()).await),
            None => None,
        };
        Ok(SaveOutcome::Saved { advanced })
    }

    async fn save_course_info(&self) -> ClientResult<SaveOutcome> {
        let stage = Stage::CourseInfo;
        let (ticket, course) = self
            .begin_save(stage, |course| Ok(validate_course_info(course)?))
            .await?;

        let course_id = match &course.id {
            Some(course_id) => {
                self.api
                    .update_course(course_id, &course.update_request())
                    .await
                    .map_err(|err| self.failed(NoticeContext::CourseSave, err))?;
                course_id.clone()
            }
            None => {
                self.api
                    .create_course(&course.new_course_request())
                    .await
                    .map_err(|err| self.failed(NoticeContext::CourseSave, err))?
            }
        };

        let mut thumbnail_path = None;
        if let Some(image) = course.thumbnail.pending_upload() {
            let upload = FileUpload {
                file_name: image.file_name.clone(),
                mime: image.mime.clone(),
                bytes: image.bytes.clone(),
            };
            match self.api.upload_thumbnail(&course_id, upload).await {
                Ok(response) => thumbnail_path = Some(response.path),
                Err(err) => {
                    warn!(course_id = %course_id, "thumbnail upload failed: {err}");
                    self.notify(Notice::info(
                        NoticeContext::Upload,
                        "Course saved, but the thumbnail could not be uploaded",
                    ));
                }
            }
        }

        {
            let mut state = self.inner.lock().await;
            if !state.is_current(stage, ticket) {
                debug!(?stage, ticket, "discarding superseded save");
                return Ok(SaveOutcome::Superseded);
            }
            state.course.id = Some(course_id);
            if let Some(path) = thumbnail_path {
                state.course.thumbnail = Thumbnail::Persisted(path);
            }
            self.recompute(&mut state);
        }
        self.notify(Notice::success(NoticeContext::CourseSave, "Course saved"));
        self.finish_save(stage, ticket).await
    }

    async fn save_subjects(&self) -> ClientResult<SaveOutcome> {
        let stage = Stage::Subjects;
        let (ticket, course) = self
            .begin_save(stage, |course| {
                validate_subjects(course)?;
                require_course_id(course).map(|_| ())
            })
            .await?;
        let course_id = require_course_id(&course)?;

        let (payload, sent_new) = course.subject_upserts();
        let response = self
            .api
            .upsert_subjects(&course_id, &payload)
            .await
            .map_err(|err| self.failed(NoticeContext::SubjectsSave, err))?;
        debug!(
            created = response.created.len(),
            updated = response.updated.len(),
            "subjects upserted"
        );
        let reloaded = self.api.get_course(&course_id).await;

        let mut state = self.inner.lock().await;
        if !state.is_current(stage, ticket) {
            return Ok(discard_superseded(stage, ticket, &reloaded));
        }
        assign_created_subject_ids(&mut state.course, &sent_new, &response.created);
        self.apply_reload(&mut state, reloaded, NoticeContext::SubjectsSave)?;
        drop(state);

        self.notify(Notice::success(NoticeContext::SubjectsSave, "Subjects saved"));
        self.finish_save(stage, ticket).await
    }

    /// Subjects without a server id are skipped; their chapters go out with
    /// the next save once the subject exists.
    async fn save_chapters(&self) -> ClientResult<SaveOutcome> {
        let stage = Stage::Chapters;
        let (ticket, course) = self
            .begin_save(stage, |course| {
                validate_chapters(course)?;
                require_course_id(course).map(|_| ())
            })
            .await?;
        let course_id = require_course_id(&course)?;

        let mut created = Vec::new();
        let mut failure = None;
        for subject in &course.subjects {
            let Some(subject_id) = &subject.id else {
                debug!(subject = %subject.name, "skipping chapters of unsaved subject");
                continue;
            };
            let (payload, sent_new) = chapter_upserts(subject);
            match self.api.upsert_chapters(subject_id, &payload).await {
                Ok(response) => created.push((subject.key, sent_new, response.created)),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        let reloaded = match failure {
            Some(err) => Err(err),
            None => self.api.get_course(&course_id).await,
        };

        let mut state = self.inner.lock().await;
        if !state.is_current(stage, ticket) {
            return Ok(discard_superseded(stage, ticket, &reloaded));
        }
        for (subject, sent_new, ids) in &created {
            if let Some(target) = state.course.subject_mut(*subject) {
                assign_created_chapter_ids(target, sent_new, ids);
            }
        }
        self.apply_reload(&mut state, reloaded, NoticeContext::ChaptersSave)?;
        drop(state);

        self.notify(Notice::success(NoticeContext::ChaptersSave, "Chapters saved"));
        self.finish_save(stage, ticket).await
    }

    /// Replaces the draft with the reloaded course, keeping local keys for
    /// matched entities. Ids already assigned stay even when the reload failed.
    fn apply_reload(
        &self,
        state: &mut WizardState,
        reloaded: ClientResult<CourseRecord>,
        context: NoticeContext,
    ) -> ClientResult<()> {
        match reloaded {
            Ok(record) => {
                state.course = reconcile_reloaded(&state.course, normalize_course(record));
                self.recompute(state);
                self.emit(WizardEvent::CourseReloaded);
                Ok(())
            }
            Err(err) => {
                self.recompute(state);
                Err(self.failed(context, err))
            }
        }
    }

    // ---------------------------------------------------------------------
    // Publishing
    // ---------------------------------------------------------------------

    pub async fn set_terms_accepted(&self, accepted: bool) {
        self.inner.lock().await.terms_accepted = accepted;
    }

    pub async fn publish(&self) -> ClientResult<()> {
        self.change_status(CourseStatus::Active).await
    }

    pub async fn unpublish(&self) -> ClientResult<()> {
        self.change_status(CourseStatus::Draft).await
    }

    async fn change_status(&self, status: CourseStatus) -> ClientResult<()> {
        let (course_id, request) = {
            let state = self.inner.lock().await;
            if status == CourseStatus::Active && !state.terms_accepted {
                return Err(self.failed(
                    NoticeContext::Publish,
                    ClientError::validation("Accept the terms and conditions to publish"),
                ));
            }
            let course_id = require_course_id(&state.course)
                .map_err(|err| self.failed(NoticeContext::Publish, err))?;
            let mut request = state.course.update_request();
            request.status = status;
            (course_id, request)
        };

        self.api
            .update_course(&course_id, &request)
            .await
            .map_err(|err| self.failed(NoticeContext::Publish, err))?;
        self.mutate(|course| course.status = status).await;
        info!(course_id = %course_id, status = status.as_str(), "course status changed");
        self.notify(Notice::success(
            NoticeContext::Publish,
            match status {
                CourseStatus::Active => "Course published",
                CourseStatus::Draft => "Course moved back to draft",
            },
        ));
        Ok(())
    }

    /// Deletes the course once `confirmation` reads `delete <course name>`.
    /// The wizard starts over with an empty draft afterwards.
    pub async fn delete_course(&self, confirmation: &str) -> ClientResult<()> {
        let course_id = {
            let state = self.inner.lock().await;
            let expected = format!("delete {}", state.course.name.trim());
            if confirmation.trim() != expected {
                return Err(ClientError::validation(format!(
                    "Type \"{expected}\" to confirm"
                )));
            }
            require_course_id(&state.course)?
        };
        self.api
            .delete_course(&course_id)
            .await
            .map_err(|err| self.failed(NoticeContext::General, err))?;
        info!(course_id = %course_id, "course deleted");
        self.new_course().await;
        self.notify(Notice::success(NoticeContext::General, "Course deleted"));
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Chapter files and content
    // ---------------------------------------------------------------------

    /// Uploads a chapter file and points the chapter at the stored path.
    /// Progress is reported through [`WizardEvent::UploadProgress`].
    pub async fn upload_chapter_file(
        &self,
        subject: LocalKey,
        chapter: LocalKey,
        upload: FileUpload,
    ) -> ClientResult<String> {
        upload
            .check_size()
            .map_err(|err| self.failed(NoticeContext::Upload, err))?;
        let course_id = {
            let mut state = self.inner.lock().await;
            let course_id = state.course.id.clone().ok_or_else(|| {
                self.failed(
                    NoticeContext::Upload,
                    ClientError::validation("Course must be saved before uploading files."),
                )
            })?;
            let Some(target) = state.course.chapter_mut(subject, chapter) else {
                return Err(ClientError::validation("Unknown chapter"));
            };
            target.upload_progress = Some(0);
            course_id
        };

        let events = self.events.clone();
        let sink: ProgressSink = Arc::new(move |progress: UploadProgress| {
            let _ = events.send(WizardEvent::UploadProgress {
                subject,
                chapter,
                percent: progress.percent(),
            });
        });
        let file_name = upload.file_name.clone();
        let result = self
            .api
            .upload_course_file(&course_id, upload, Some(sink))
            .await;

        let mut state = self.inner.lock().await;
        let target = state.course.chapter_mut(subject, chapter);
        match result {
            Ok(response) => {
                let Some(target) = target else {
                    drop(state);
                    warn!(
                        file = %file_name,
                        path = %response.path,
                        "chapter removed during upload; stored path dropped"
                    );
                    self.notify(Notice::info(
                        NoticeContext::Upload,
                        "File uploaded, but its chapter was removed",
                    ));
                    return Ok(response.path);
                };
                target.upload_progress = None;
                target.source = ChapterSource::File(response.path.clone());
                self.recompute(&mut state);
                drop(state);
                info!(file = %file_name, path = %response.path, "chapter file uploaded");
                self.notify(Notice::success(
                    NoticeContext::Upload,
                    "File uploaded successfully",
                ));
                Ok(response.path)
            }
            Err(err) => {
                if let Some(target) = target {
                    target.upload_progress = None;
                }
                drop(state);
                Err(self.failed(NoticeContext::Upload, err))
            }
        }
    }

    /// Fetches the chapter's stored markdown and renders it for the rich
    /// editor.
    pub async fn load_chapter_content(&self, chapter_id: &ChapterId) -> ClientResult<String> {
        let record = self
            .api
            .get_chapter(chapter_id)
            .await
            .map_err(|err| self.failed(NoticeContext::ChapterContent, err))?;
        let markdown = unescape_stored_content(record.content.as_deref().unwrap_or_default());
        Ok(markdown_to_editor_html(&markdown, self.renderer.as_ref()))
    }

    /// Converts editor HTML back to markdown and stores it. Returns the
    /// markdown that was sent.
    pub async fn save_chapter_content(
        &self,
        chapter_id: &ChapterId,
        editor_html: &str,
    ) -> ClientResult<String> {
        let course_id = require_course_id(&self.inner.lock().await.course)
            .map_err(|err| self.failed(NoticeContext::ChapterContent, err))?;
        let markdown = editor_html_to_markdown(editor_html, self.converter.as_ref());
        self.api
            .update_chapter_content(&course_id, chapter_id, &markdown)
            .await
            .map_err(|err| self.failed(NoticeContext::ChapterContent, err))?;
        self.notify(Notice::success(
            NoticeContext::ChapterContent,
            "Content updated",
        ));
        Ok(markdown)
    }

    // ---------------------------------------------------------------------
    // Tests
    // ---------------------------------------------------------------------

    /// Refreshes the tests list. A course that was never saved has none.
    pub async fn reload_tests(&self) -> ClientResult<Vec<TestSummary>> {
        let course_id = self.inner.lock().await.course.id.clone();
        let tests = match course_id {
            Some(course_id) => self
                .api
                .list_tests(&course_id)
                .await
                .map_err(|err| self.failed(NoticeContext::Tests, err))?,
            None => Vec::new(),
        };
        self.inner.lock().await.tests = tests.clone();
        debug!(count = tests.len(), "tests reloaded");
        self.emit(WizardEvent::TestsReloaded(tests.clone()));
        Ok(tests)
    }

    pub async fn catalog(&self) -> ChapterCatalog {
        ChapterCatalog::from_draft(&self.inner.lock().await.course)
    }

    pub async fn new_test(&self) -> TestEditor {
        TestEditor::new_test(self.catalog().await)
    }

    pub async fn load_test(&self, test_id: &TestId) -> ClientResult<TestEditor> {
        let test = self
            .api
            .get_test(test_id)
            .await
            .map_err(|err| self.failed(NoticeContext::Tests, err))?;
        Ok(TestEditor::open(test, self.catalog().await))
    }

    /// Creates the test when it has no id, updates it otherwise, then reloads
    /// the list.
    pub async fn save_test(&self, test: &TestDocument) -> ClientResult<TestId> {
        validate_test(test)?;
        let test_id = match &test.id {
            Some(test_id) => {
                self.api
                    .update_test(test_id, test)
                    .await
                    .map_err(|err| self.failed(NoticeContext::Tests, err))?;
                test_id.clone()
            }
            None => {
                let course_id = require_course_id(&self.inner.lock().await.course)
                    .map_err(|err| self.failed(NoticeContext::Tests, err))?;
                self.api
                    .create_test(&course_id, test)
                    .await
                    .map_err(|err| self.failed(NoticeContext::Tests, err))?
            }
        };
        info!(test_id = %test_id, "test saved");
        self.notify(Notice::success(NoticeContext::Tests, "Test saved"));
        let _ = self.reload_tests().await;
        Ok(test_id)
    }

    pub async fn delete_test(&self, test_id: &TestId) -> ClientResult<()> {
        let course_id = require_course_id(&self.inner.lock().await.course)?;
        self.api
            .delete_test(&course_id, test_id)
            .await
            .map_err(|err| self.failed(NoticeContext::Tests, err))?;
        let tests = {
            let mut state = self.inner.lock().await;
            state.tests.retain(|test| &test.id != test_id);
            state.tests.clone()
        };
        self.emit(WizardEvent::TestsReloaded(tests));
        self.notify(Notice::success(NoticeContext::Tests, "Test deleted"));
        Ok(())
    }

    /// Asks the server to generate a test from `config`.
    pub async fn request_auto_generation(
        &self,
        config: &AutoGenConfig,
    ) -> ClientResult<TestDocument> {
        if !config.is_valid() {
            return Err(ClientError::validation(
                "Each section needs subjects, chapters and a distribution matching its question count",
            ));
        }
        let course_id = require_course_id(&self.inner.lock().await.course)?;
        let generated = self
            .api
            .auto_generate_test(&course_id, &config.to_request())
            .await
            .map_err(|err| self.failed(NoticeContext::Tests, err))?;
        self.notify(Notice::info(
            NoticeContext::Tests,
            "Test generation initiated. Please continue with your next activity.",
        ));
        Ok(generated)
    }

    /// Uploads an image for a question. Returns the stored path.
    pub async fn upload_question_image(&self, upload: FileUpload) -> ClientResult<String> {
        let course_id = require_course_id(&self.inner.lock().await.course)?;
        let response = self
            .api
            .upload_image(&course_id, upload)
            .await
            .map_err(|err| self.failed(NoticeContext::Tests, err))?;
        Ok(response.path)
    }

    pub async fn fetch_question_image(&self, path: &str) -> ClientResult<Vec<u8>> {
        self.api
            .fetch_file(path)
            .await
            .map_err(|err| self.failed(NoticeContext::Tests, err))
    }

    pub async fn delete_question_image(&self, path: &str) -> ClientResult<()> {
        self.api
            .delete_file(path)
            .await
            .map_err(|err| self.failed(NoticeContext::Tests, err))?;
        self.notify(Notice::success(NoticeContext::Tests, "Image deleted"));
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Packages
    // ---------------------------------------------------------------------

    pub async fn reload_packages(&self) -> ClientResult<Vec<PackageRecord>> {
        let Some(course_id) = self.inner.lock().await.course.id.clone() else {
            return Ok(Vec::new());
        };
        let packages = self
            .api
            .list_packages(&course_id)
            .await
            .map_err(|err| self.failed(NoticeContext::Packages, err))?;
        self.inner.lock().await.packages = packages.clone();
        self.emit(WizardEvent::PackagesReloaded(packages.clone()));
        Ok(packages)
    }

    /// Validates locally before anything is sent.
    pub async fn add_package(&self, package: &PackageRecord) -> ClientResult<()> {
        validate_package(package)?;
        let course_id = require_course_id(&self.inner.lock().await.course)?;
        let package_id = self
            .api
            .create_package(&create_request(course_id, package))
            .await
            .map_err(|err| self.failed(NoticeContext::Packages, err))?;
        info!(package_id = %package_id, "package created");
        self.reload_packages().await?;
        Ok(())
    }

    /// Unsaved packages are dropped locally; saved ones are deleted remotely
    /// and the list is fetched again.
    pub async fn remove_package(&self, index: usize) -> ClientResult<()> {
        let package_id = {
            let mut state = self.inner.lock().await;
            let Some(package) = state.packages.get(index) else {
                return Ok(());
            };
            match package.id.clone() {
                Some(package_id) => package_id,
                None => {
                    state.packages.remove(index);
                    let packages = state.packages.clone();
                    drop(state);
                    self.emit(WizardEvent::PackagesReloaded(packages));
                    return Ok(());
                }
            }
        };
        self.api
            .delete_package(&package_id)
            .await
            .map_err(|err| self.failed(NoticeContext::Packages, err))?;
        self.reload_packages().await?;
        Ok(())
    }
}

fn require_course_id(course: &DraftCourse) -> ClientResult<CourseId> {
    course
        .id
        .clone()
        .ok_or_else(|| ClientError::validation("Save the course first"))
}

/// Drops the result of a save that a newer one replaced. Failures are logged.
fn discard_superseded<T>(stage: Stage, ticket: u64, result: &ClientResult<T>) -> SaveOutcome {
    match result {
        Ok(_) => debug!(?stage, ticket, "discarding superseded save"),
        Err(err) => warn!(?stage, ticket, "superseded save failed: {err}"),
    }
    SaveOutcome::Superseded
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
