use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{
    ChapterId, ChapterSourceKind, CourseId, CourseStatus, CreatorUuid, DurationUnit, PackageId,
    QuestionType, ScoringFormula, SubjectId, TestId, TestScopeKind,
};

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendOtpRequest {
    pub useremail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub uuid: Option<CreatorUuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupOtpRequest {
    pub useremail: String,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCreatorRequest {
    pub name: String,
    pub email: String,
    pub dob: String,
    pub display: String,
    pub mobile_number: String,
    pub address: String,
    pub terms: bool,
    pub youtube_channel: String,
    pub bio: String,
    pub categories: Vec<String>,
    pub email_otp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteAccountRequest {
    pub useremail: String,
    pub otp: String,
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

/// Course as returned by `GET /creator/v2/courses/{id}`.
///
/// The API is inconsistent about field names (`Name` vs `name`, `books` vs
/// `subjects`, three spellings of the thumbnail path). Every spelling is kept
/// here and resolved once by the client's normalization step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    #[serde(default, alias = "_id")]
    pub id: Option<CourseId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "Name", skip_serializing_if = "Option::is_none")]
    pub legacy_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, rename = "thumbnailPath", skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
    #[serde(default)]
    pub status: Option<CourseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<SubjectRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<SubjectRecord>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    #[serde(default, alias = "_id")]
    pub id: Option<SubjectId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "Name", skip_serializing_if = "Option::is_none")]
    pub legacy_name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub chapters: Option<Vec<ChapterRecord>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    #[serde(default, alias = "_id")]
    pub id: Option<ChapterId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "Name", skip_serializing_if = "Option::is_none")]
    pub legacy_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "Url", skip_serializing_if = "Option::is_none")]
    pub legacy_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
    #[serde(default, rename = "inputType")]
    pub input_type: Option<ChapterSourceKind>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSummary {
    #[serde(alias = "_id")]
    pub id: CourseId,
    #[serde(default, alias = "title")]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<CourseStatus>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoursePage {
    pub items: Vec<CourseSummary>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// `GET /creator/v2/courses` answers with either the paginated envelope or a bare list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CourseListing {
    Page(CoursePage),
    Bare(Vec<CourseSummary>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCourseRequest {
    pub name: String,
    pub title: String,
    pub description: String,
    pub status: CourseStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseUpdateRequest {
    pub name: String,
    pub title: String,
    pub description: String,
    pub status: CourseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedResponse<I> {
    #[serde(alias = "_id")]
    pub id: I,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePathQuery {
    pub file_path: String,
}

// ---------------------------------------------------------------------------
// Subjects ("books") and chapters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectUpsert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SubjectId>,
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterUpsert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ChapterId>,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    pub order: u32,
    #[serde(rename = "inputType")]
    pub input_type: ChapterSourceKind,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRef<I> {
    #[serde(alias = "_id")]
    pub id: I,
    #[serde(default, alias = "Name")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkUpsertResponse<I> {
    #[serde(default = "Vec::new")]
    pub created: Vec<EntityRef<I>>,
    #[serde(default = "Vec::new")]
    pub updated: Vec<EntityRef<I>>,
}

impl<I> Default for BulkUpsertResponse<I> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            updated: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterContentUpdate {
    pub content: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    #[serde(alias = "_id")]
    pub id: TestId,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub kind: TestScopeKind,
    #[serde(default)]
    pub status: Option<String>,
}

/// Tests endpoints answer with a bare list or an `{items}` envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TestListing {
    Bare(Vec<TestSummary>),
    Envelope { items: Vec<TestSummary> },
}

impl TestListing {
    pub fn into_items(self) -> Vec<TestSummary> {
        match self {
            Self::Bare(items) | Self::Envelope { items } => items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TestId>,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub kind: TestScopeKind,
    /// Minutes.
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub has_negative_marking: bool,
    #[serde(default)]
    pub scoring_formula: ScoringFormula,
    #[serde(default)]
    pub unattempted_marks: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_subject: Option<String>,
    #[serde(default)]
    pub selected_chapters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_subjects: Option<Vec<String>>,
    #[serde(default)]
    pub sections: Vec<TestSection>,
    #[serde(default = "default_test_status")]
    pub status: String,
}

fn default_test_status() -> String {
    "draft".to_string()
}

fn default_positive_marks() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub use_uniform_marking: bool,
    #[serde(default = "default_positive_marks")]
    pub uniform_marks_pos: f64,
    #[serde(default)]
    pub uniform_marks_neg: f64,
    /// Minutes, zero when the section is untimed.
    #[serde(default)]
    pub time_limit: u32,
    #[serde(default)]
    pub selected_chapters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_count: Option<u32>,
    #[serde(default)]
    pub unattempted_marks: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(flatten)]
    pub body: QuestionBody,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_positive_marks")]
    pub marks_pos: f64,
    #[serde(default)]
    pub marks_neg: f64,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuestionBody {
    #[serde(rename = "MCQ")]
    MultipleChoice {
        #[serde(default)]
        options: Vec<AnswerOption>,
    },
    #[serde(rename = "MSQ")]
    MultiSelect {
        #[serde(default)]
        options: Vec<AnswerOption>,
    },
    #[serde(rename = "True/False")]
    TrueFalse {
        #[serde(default)]
        options: Vec<AnswerOption>,
    },
    #[serde(rename = "Descriptive")]
    Descriptive {
        #[serde(default, rename = "correctAnswer")]
        model_answer: String,
    },
    #[serde(rename = "Fill-in-the-Blanks")]
    FillBlank {
        #[serde(default, rename = "correctAnswer")]
        correct_answer: String,
        #[serde(default)]
        blanks: Vec<String>,
    },
    #[serde(rename = "Matching")]
    Matching {
        #[serde(default)]
        pairs: Vec<MatchPair>,
    },
    #[serde(rename = "Sequence")]
    Sequence {
        #[serde(default, rename = "sequenceItems")]
        items: Vec<SequenceItem>,
    },
}

impl QuestionBody {
    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::MultipleChoice { .. } => QuestionType::MultipleChoice,
            Self::MultiSelect { .. } => QuestionType::MultiSelect,
            Self::TrueFalse { .. } => QuestionType::TrueFalse,
            Self::Descriptive { .. } => QuestionType::Descriptive,
            Self::FillBlank { .. } => QuestionType::FillBlank,
            Self::Matching { .. } => QuestionType::Matching,
            Self::Sequence { .. } => QuestionType::Sequence,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "isCorrect")]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    #[serde(default)]
    pub left: String,
    #[serde(default)]
    pub right: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceItem {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoGenerateRequest {
    pub test_type: TestScopeKind,
    pub num_sections: u32,
    pub sections: Vec<AutoGenerateSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoGenerateSection {
    pub name: String,
    pub question_count: u32,
    pub type_distribution: BTreeMap<QuestionType, u32>,
    pub chapters: Vec<String>,
    pub selected_subjects: Vec<String>,
    pub marks_pos: f64,
    pub marks_neg: f64,
    pub unattempted_marks: f64,
    pub time_limit: u32,
}

// ---------------------------------------------------------------------------
// Packages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<PackageId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub duration: PackageDuration,
    #[serde(default)]
    pub features: PackageFeatures,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageDuration {
    #[serde(default)]
    pub value: Option<u32>,
    #[serde(default)]
    pub unit: DurationUnit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFeatures {
    #[serde(default)]
    pub content: bool,
    #[serde(default)]
    pub videos: bool,
    #[serde(default)]
    pub tests: bool,
    #[serde(default)]
    pub ai_doubt: bool,
    #[serde(default)]
    pub ai_analysis: bool,
}

impl PackageFeatures {
    pub fn any(&self) -> bool {
        self.content || self.videos || self.tests || self.ai_doubt || self.ai_analysis
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePackageRequest {
    #[serde(flatten)]
    pub package: PackageRecord,
    pub course_id: CourseId,
}
