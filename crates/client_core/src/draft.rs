//! The in-memory course aggregate edited by the authoring wizard.
//!
//! Wire records from `shared::protocol` are converted into this shape once, by
//! [`normalize_course`], so the rest of the client never deals with the API's
//! alternate field spellings.

use std::collections::{HashMap, HashSet};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::{
    domain::{ChapterId, ChapterSourceKind, CourseId, CourseStatus, LocalKey, SubjectId},
    protocol::{
        ChapterRecord, ChapterUpsert, CourseRecord, CourseUpdateRequest, EntityRef,
        NewCourseRequest, SubjectRecord, SubjectUpsert,
    },
};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl LocalImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Thumbnail {
    #[default]
    Unset,
    /// Picked locally, not uploaded yet.
    LocalPreview(LocalImage),
    Persisted(String),
}

impl Thumbnail {
    pub fn is_set(&self) -> bool {
        match self {
            Self::Unset => false,
            Self::LocalPreview(_) => true,
            Self::Persisted(path) => !path.trim().is_empty(),
        }
    }

    pub fn persisted_path(&self) -> Option<&str> {
        match self {
            Self::Persisted(path) => Some(path),
            _ => None,
        }
    }

    pub fn pending_upload(&self) -> Option<&LocalImage> {
        match self {
            Self::LocalPreview(image) => Some(image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterSource {
    Link(String),
    File(String),
    Manual,
}

impl Default for ChapterSource {
    fn default() -> Self {
        Self::Link(String::new())
    }
}

impl ChapterSource {
    pub fn empty(kind: ChapterSourceKind) -> Self {
        match kind {
            ChapterSourceKind::Youtube => Self::Link(String::new()),
            ChapterSourceKind::File => Self::File(String::new()),
            ChapterSourceKind::Manual => Self::Manual,
        }
    }

    pub fn kind(&self) -> ChapterSourceKind {
        match self {
            Self::Link(_) => ChapterSourceKind::Youtube,
            Self::File(_) => ChapterSourceKind::File,
            Self::Manual => ChapterSourceKind::Manual,
        }
    }

    /// Link or uploaded path; `None` for manual content.
    pub fn locator(&self) -> Option<&str> {
        match self {
            Self::Link(value) | Self::File(value) => Some(value),
            Self::Manual => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.locator()
            .map_or(true, |value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftChapter {
    pub key: LocalKey,
    pub id: Option<ChapterId>,
    pub name: String,
    pub source: ChapterSource,
    pub description: String,
    pub duration_seconds: Option<u32>,
    pub thumbnail_url: Option<String>,
    pub status: Option<String>,
    /// Advisory upload progress in percent.
    pub upload_progress: Option<u8>,
}

impl DraftChapter {
    pub fn named(name: impl Into<String>, source: ChapterSource) -> Self {
        Self {
            name: name.into(),
            source,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftSubject {
    pub key: LocalKey,
    pub id: Option<SubjectId>,
    pub name: String,
    pub language: String,
    pub chapters: Vec<DraftChapter>,
}

impl DraftSubject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn chapter(&self, key: LocalKey) -> Option<&DraftChapter> {
        self.chapters.iter().find(|chapter| chapter.key == key)
    }

    pub fn chapter_mut(&mut self, key: LocalKey) -> Option<&mut DraftChapter> {
        self.chapters.iter_mut().find(|chapter| chapter.key == key)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftCourse {
    pub id: Option<CourseId>,
    pub name: String,
    pub description: String,
    pub thumbnail: Thumbnail,
    pub status: CourseStatus,
    pub subjects: Vec<DraftSubject>,
}

impl DraftCourse {
    pub fn subject(&self, key: LocalKey) -> Option<&DraftSubject> {
        self.subjects.iter().find(|subject| subject.key == key)
    }

    pub fn subject_mut(&mut self, key: LocalKey) -> Option<&mut DraftSubject> {
        self.subjects.iter_mut().find(|subject| subject.key == key)
    }

    pub fn chapter_mut(
        &mut self,
        subject: LocalKey,
        chapter: LocalKey,
    ) -> Option<&mut DraftChapter> {
        self.subject_mut(subject)?.chapter_mut(chapter)
    }

    pub fn chapter_count(&self) -> usize {
        self.subjects.iter().map(|subject| subject.chapters.len()).sum()
    }

    pub fn new_course_request(&self) -> NewCourseRequest {
        NewCourseRequest {
            name: self.name.trim().to_string(),
            title: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            status: self.status,
        }
    }

    pub fn update_request(&self) -> CourseUpdateRequest {
        CourseUpdateRequest {
            name: self.name.trim().to_string(),
            title: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            status: self.status,
            thumbnail_url: self.thumbnail.persisted_path().map(str::to_string),
        }
    }

    /// Subject payloads in display order, plus the keys of the id-less entries
    /// in the order they were sent.
    pub fn subject_upserts(&self) -> (Vec<SubjectUpsert>, Vec<LocalKey>) {
        let sent_new = self
            .subjects
            .iter()
            .filter(|subject| subject.id.is_none())
            .map(|subject| subject.key)
            .collect();
        let payload = self
            .subjects
            .iter()
            .map(|subject| SubjectUpsert {
                id: subject.id.clone(),
                name: subject.name.trim().to_string(),
                language: (!subject.language.trim().is_empty())
                    .then(|| subject.language.trim().to_string()),
            })
            .collect();
        (payload, sent_new)
    }
}

pub fn chapter_upserts(subject: &DraftSubject) -> (Vec<ChapterUpsert>, Vec<LocalKey>) {
    let sent_new = subject
        .chapters
        .iter()
        .filter(|chapter| chapter.id.is_none())
        .map(|chapter| chapter.key)
        .collect();
    let payload = subject
        .chapters
        .iter()
        .enumerate()
        .map(|(index, chapter)| ChapterUpsert {
            id: chapter.id.clone(),
            name: chapter.name.trim().to_string(),
            url: chapter
                .source
                .locator()
                .map(|value| value.trim().to_string())
                .unwrap_or_default(),
            description: (!chapter.description.is_empty()).then(|| chapter.description.clone()),
            thumbnail_url: chapter.thumbnail_url.clone(),
            duration_seconds: chapter.duration_seconds,
            order: index as u32,
            input_type: chapter.source.kind(),
            status: chapter.status.clone(),
        })
        .collect();
    (payload, sent_new)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn first_non_empty(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

/// Resolves the API's alternate spellings into a fresh draft. Every subject and
/// chapter gets a new local key.
pub fn normalize_course(record: CourseRecord) -> DraftCourse {
    let name = first_non_empty([record.name, record.legacy_name, record.title]).unwrap_or_default();
    let thumbnail = first_non_empty([
        record.thumbnail_url,
        record.thumbnail,
        record.thumbnail_path,
    ])
    .map_or(Thumbnail::Unset, Thumbnail::Persisted);
    let subjects = match (record.subjects, record.books) {
        (Some(subjects), _) if !subjects.is_empty() => subjects,
        (_, Some(books)) => books,
        (subjects, None) => subjects.unwrap_or_default(),
    };

    DraftCourse {
        id: record.id,
        name,
        description: record.description.unwrap_or_default(),
        thumbnail,
        status: record.status.unwrap_or_default(),
        subjects: subjects.into_iter().map(normalize_subject).collect(),
    }
}

fn normalize_subject(record: SubjectRecord) -> DraftSubject {
    DraftSubject {
        key: LocalKey::new(),
        id: record.id,
        name: first_non_empty([record.name, record.legacy_name]).unwrap_or_default(),
        language: record.language.unwrap_or_default(),
        chapters: record
            .chapters
            .unwrap_or_default()
            .into_iter()
            .map(normalize_chapter)
            .collect(),
    }
}

fn normalize_chapter(record: ChapterRecord) -> DraftChapter {
    let locator =
        first_non_empty([record.url, record.legacy_url, record.youtube]).unwrap_or_default();
    let source = match record.input_type.unwrap_or_default() {
        ChapterSourceKind::Manual => ChapterSource::Manual,
        ChapterSourceKind::File => ChapterSource::File(locator),
        ChapterSourceKind::Youtube => ChapterSource::Link(locator),
    };

    DraftChapter {
        key: LocalKey::new(),
        id: record.id,
        name: first_non_empty([record.name, record.legacy_name]).unwrap_or_default(),
        source,
        description: record.description.unwrap_or_default(),
        duration_seconds: record.duration_seconds,
        thumbnail_url: record.thumbnail_url,
        status: record.status,
        upload_progress: None,
    }
}

// ---------------------------------------------------------------------------
// Identity reconciliation
// ---------------------------------------------------------------------------

trait Reconcilable {
    fn server_id(&self) -> Option<&str>;
    fn name(&self) -> &str;
    fn key(&self) -> LocalKey;
    fn set_key(&mut self, key: LocalKey);
}

impl Reconcilable for DraftSubject {
    fn server_id(&self) -> Option<&str> {
        self.id.as_ref().map(SubjectId::as_str)
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn key(&self) -> LocalKey {
        self.key
    }
    fn set_key(&mut self, key: LocalKey) {
        self.key = key;
    }
}

impl Reconcilable for DraftChapter {
    fn server_id(&self) -> Option<&str> {
        self.id.as_ref().map(ChapterId::as_str)
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn key(&self) -> LocalKey {
        self.key
    }
    fn set_key(&mut self, key: LocalKey) {
        self.key = key;
    }
}

/// Assigns the ids of a bulk response's `created` list to the id-less entries
/// that were sent, by position. Returns how many ids were assigned.
pub fn assign_created_subject_ids(
    course: &mut DraftCourse,
    sent_new: &[LocalKey],
    created: &[EntityRef<SubjectId>],
) -> usize {
    if sent_new.len() != created.len() {
        warn!(
            sent = sent_new.len(),
            created = created.len(),
            "bulk subject save: created count mismatch, skipping positional ids"
        );
        return 0;
    }
    let mut assigned = 0;
    for (key, created) in sent_new.iter().zip(created) {
        if let Some(subject) = course.subject_mut(*key) {
            if subject.id.is_none() {
                subject.id = Some(created.id.clone());
                assigned += 1;
            }
        }
    }
    assigned
}

pub fn assign_created_chapter_ids(
    subject: &mut DraftSubject,
    sent_new: &[LocalKey],
    created: &[EntityRef<ChapterId>],
) -> usize {
    if sent_new.len() != created.len() {
        warn!(
            subject = %subject.name,
            sent = sent_new.len(),
            created = created.len(),
            "bulk chapter save: created count mismatch, skipping positional ids"
        );
        return 0;
    }
    let mut assigned = 0;
    for (key, created) in sent_new.iter().zip(created) {
        if let Some(chapter) = subject.chapter_mut(*key) {
            if chapter.id.is_none() {
                chapter.id = Some(created.id.clone());
                assigned += 1;
            }
        }
    }
    assigned
}

/// Carries local keys from `local` onto a freshly reloaded `server` draft.
///
/// Entities are matched by server id first. Id-less local entities are then
/// matched by trimmed name, but only when the name is unique on both sides;
/// ambiguous names keep the fresh key of the server entity.
pub fn reconcile_reloaded(local: &DraftCourse, mut server: DraftCourse) -> DraftCourse {
    let matches = match_entities(&local.subjects, &mut server.subjects);
    for (server_index, local_index) in matches {
        reconcile_chapters(
            &local.subjects[local_index].chapters,
            &mut server.subjects[server_index].chapters,
        );
    }
    server
}

fn reconcile_chapters(local: &[DraftChapter], server: &mut [DraftChapter]) {
    match_entities(local, server);
}

/// Returns `(server_index, local_index)` pairs and copies local keys onto the
/// matched server entities.
fn match_entities<T: Reconcilable>(local: &[T], server: &mut [T]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    let mut claimed_server = HashSet::new();
    let mut claimed_local = HashSet::new();

    let by_id: HashMap<&str, usize> = local
        .iter()
        .enumerate()
        .filter_map(|(index, entity)| entity.server_id().map(|id| (id, index)))
        .collect();
    for (server_index, entity) in server.iter().enumerate() {
        if let Some(&local_index) = entity.server_id().and_then(|id| by_id.get(id)) {
            pairs.push((server_index, local_index));
            claimed_server.insert(server_index);
            claimed_local.insert(local_index);
        }
    }

    let unclaimed_local: Vec<usize> = local
        .iter()
        .enumerate()
        .filter(|(index, entity)| entity.server_id().is_none() && !claimed_local.contains(index))
        .map(|(index, _)| index)
        .collect();
    let local_names = name_counts(unclaimed_local.iter().map(|&index| &local[index]));
    let server_names = name_counts(
        server
            .iter()
            .enumerate()
            .filter(|(index, _)| !claimed_server.contains(index))
            .map(|(_, entity)| entity),
    );

    for local_index in unclaimed_local {
        let name = local[local_index].name().trim();
        if name.is_empty() {
            continue;
        }
        let local_count = local_names.get(name).copied().unwrap_or(0);
        let server_count = server_names.get(name).copied().unwrap_or(0);
        if server_count == 0 {
            continue;
        }
        if local_count != 1 || server_count != 1 {
            warn!(
                entity_name = name,
                local_count,
                server_count,
                "ambiguous name after reload, identity left unassigned"
            );
            continue;
        }
        if let Some(server_index) = (0..server.len())
            .find(|index| !claimed_server.contains(index) && server[*index].name().trim() == name)
        {
            pairs.push((server_index, local_index));
            claimed_server.insert(server_index);
        }
    }

    for &(server_index, local_index) in &pairs {
        server[server_index].set_key(local[local_index].key());
    }
    debug!(matched = pairs.len(), total = server.len(), "reconciled reloaded entities");
    pairs
}

fn name_counts<'a, T: Reconcilable + 'a>(
    entities: impl Iterator<Item = &'a T>,
) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for entity in entities {
        *counts.entry(entity.name().trim().to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
#[path = "tests/draft_tests.rs"]
mod tests;
