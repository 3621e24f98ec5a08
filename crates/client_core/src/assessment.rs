//! Test authoring: question rules, the manual test editor, and auto-generation
//! configuration.

use std::collections::{BTreeMap, BTreeSet};

use shared::{
    domain::{QuestionType, ScoringFormula, TestScopeKind},
    protocol::{
        AnswerOption, AutoGenerateRequest, AutoGenerateSection, MatchPair, Question, QuestionBody,
        SequenceItem, TestDocument, TestSection,
    },
};
use thiserror::Error;
use tracing::debug;

use crate::{draft::DraftCourse, error::ClientError};

pub const MAX_GENERATED_QUESTIONS: u32 = 30;
pub const DEFAULT_TEST_DURATION: u32 = 60;
const DEFAULT_GENERATED_COUNT: u32 = 10;
const GENERATED_TEST_TITLE: &str = "Auto Generated Test";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionError {
    #[error("Question text is required")]
    MissingText,
    #[error("At least two options required for {kind}")]
    TooFewOptions { kind: &'static str },
    #[error("At least two non-empty options required for {kind}")]
    TooFewFilledOptions { kind: &'static str },
    #[error("One option must be selected as correct for MCQ")]
    NoCorrectChoice,
    #[error("At least one option must be selected for MSQ")]
    NoSelectedOptions,
    #[error("True/False must have two options")]
    TrueFalseOptionCount,
    #[error("Options must include True and False")]
    TrueFalseLabels,
    #[error("Select the correct option for True/False")]
    TrueFalseNoCorrect,
    #[error("Model answer is required for Descriptive questions")]
    MissingModelAnswer,
    #[error("Correct answer is required for Fill-in-the-Blanks")]
    MissingFillAnswer,
    #[error("At least two pairs are required for Matching")]
    TooFewPairs,
    #[error("Both left and right items required for each pair")]
    IncompletePair,
    #[error("At least two items required for Sequence")]
    TooFewSequenceItems,
    #[error("Sequence items cannot be empty")]
    EmptySequenceItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestError {
    #[error("Test title is required")]
    MissingTitle,
    #[error("Duration must be greater than zero")]
    InvalidDuration,
    #[error("Select a subject for a chapter test")]
    MissingSubject,
    #[error("Select a chapter for a chapter test")]
    MissingChapter,
    #[error("Select at least one chapter")]
    NoSelectedChapters,
    #[error("Select at least one subject")]
    NoSelectedSubjects,
    #[error("Add at least one section")]
    NoSections,
    #[error("Section {position} needs a name")]
    UnnamedSection { position: usize },
    #[error("Section {position} has no questions")]
    EmptySection { position: usize },
    #[error("Section {section}, question {question}: {source}")]
    InvalidQuestion {
        section: usize,
        question: usize,
        source: QuestionError,
    },
}

impl From<TestError> for ClientError {
    fn from(value: TestError) -> Self {
        ClientError::validation(value.to_string())
    }
}

fn filled(text: &str) -> bool {
    !text.trim().is_empty()
}

/// Returns the first rule the question breaks.
pub fn validate_question(question: &Question) -> Result<(), QuestionError> {
    if !filled(&question.text) {
        return Err(QuestionError::MissingText);
    }

    match &question.body {
        QuestionBody::MultipleChoice { options } | QuestionBody::MultiSelect { options } => {
            let kind = question.body.question_type().label();
            if options.len() < 2 {
                return Err(QuestionError::TooFewOptions { kind });
            }
            if options.iter().filter(|option| filled(&option.text)).count() < 2 {
                return Err(QuestionError::TooFewFilledOptions { kind });
            }
            if !options.iter().any(|option| option.is_correct) {
                return Err(match question.body {
                    QuestionBody::MultiSelect { .. } => QuestionError::NoSelectedOptions,
                    _ => QuestionError::NoCorrectChoice,
                });
            }
        }
        QuestionBody::TrueFalse { options } => {
            if options.len() < 2 {
                return Err(QuestionError::TrueFalseOptionCount);
            }
            let labels: Vec<String> = options
                .iter()
                .map(|option| option.text.trim().to_lowercase())
                .collect();
            if !(labels.iter().any(|l| l == "true") && labels.iter().any(|l| l == "false")) {
                return Err(QuestionError::TrueFalseLabels);
            }
            if !options.iter().any(|option| option.is_correct) {
                return Err(QuestionError::TrueFalseNoCorrect);
            }
        }
        QuestionBody::Descriptive { model_answer } => {
            if !filled(model_answer) {
                return Err(QuestionError::MissingModelAnswer);
            }
        }
        QuestionBody::FillBlank { correct_answer, .. } => {
            if !filled(correct_answer) {
                return Err(QuestionError::MissingFillAnswer);
            }
        }
        QuestionBody::Matching { pairs } => {
            if pairs.len() < 2 {
                return Err(QuestionError::TooFewPairs);
            }
            if pairs
                .iter()
                .any(|pair| !filled(&pair.left) || !filled(&pair.right))
            {
                return Err(QuestionError::IncompletePair);
            }
        }
        QuestionBody::Sequence { items } => {
            if items.len() < 2 {
                return Err(QuestionError::TooFewSequenceItems);
            }
            if items.iter().any(|item| !filled(&item.text)) {
                return Err(QuestionError::EmptySequenceItem);
            }
        }
    }
    Ok(())
}

pub fn validate_test(test: &TestDocument) -> Result<(), TestError> {
    if !filled(&test.title) {
        return Err(TestError::MissingTitle);
    }
    if test.duration == 0 {
        return Err(TestError::InvalidDuration);
    }
    match test.kind {
        TestScopeKind::Chapter => {
            if !test.selected_subject.as_deref().is_some_and(filled) {
                return Err(TestError::MissingSubject);
            }
            if !test.chapter_id.as_deref().is_some_and(|id| !id.is_empty()) {
                return Err(TestError::MissingChapter);
            }
        }
        TestScopeKind::Overall => {
            if test.selected_chapters.is_empty() {
                return Err(TestError::NoSelectedChapters);
            }
            if test
                .selected_subjects
                .as_ref()
                .is_some_and(|subjects| subjects.is_empty())
            {
                return Err(TestError::NoSelectedSubjects);
            }
        }
    }
    if test.sections.is_empty() {
        return Err(TestError::NoSections);
    }
    for (index, section) in test.sections.iter().enumerate() {
        let position = index + 1;
        if !filled(&section.name) {
            return Err(TestError::UnnamedSection { position });
        }
        let planned = section.question_count.unwrap_or(0) > 0;
        if !planned && section.questions.is_empty() {
            return Err(TestError::EmptySection { position });
        }
        for (question_index, question) in section.questions.iter().enumerate() {
            validate_question(question).map_err(|source| TestError::InvalidQuestion {
                section: position,
                question: question_index + 1,
                source,
            })?;
        }
    }
    Ok(())
}

pub fn test_valid(test: &TestDocument) -> bool {
    validate_test(test).is_ok()
}

fn blank_options() -> Vec<AnswerOption> {
    vec![AnswerOption::default(), AnswerOption::default()]
}

/// Empty answer shape for a question of `kind`.
pub fn blank_body(kind: QuestionType) -> QuestionBody {
    match kind {
        QuestionType::MultipleChoice => QuestionBody::MultipleChoice {
            options: blank_options(),
        },
        QuestionType::MultiSelect => QuestionBody::MultiSelect {
            options: blank_options(),
        },
        QuestionType::TrueFalse => QuestionBody::TrueFalse {
            options: vec![
                AnswerOption {
                    text: "True".to_string(),
                    is_correct: false,
                },
                AnswerOption {
                    text: "False".to_string(),
                    is_correct: false,
                },
            ],
        },
        QuestionType::Descriptive => QuestionBody::Descriptive {
            model_answer: String::new(),
        },
        QuestionType::FillBlank => QuestionBody::FillBlank {
            correct_answer: String::new(),
            blanks: Vec::new(),
        },
        QuestionType::Matching => QuestionBody::Matching {
            pairs: vec![MatchPair::default()],
        },
        QuestionType::Sequence => QuestionBody::Sequence {
            items: vec![SequenceItem {
                text: String::new(),
                order: 1,
            }],
        },
    }
}

pub fn blank_question(kind: QuestionType, marks_pos: f64, marks_neg: f64) -> Question {
    Question {
        body: blank_body(kind),
        text: String::new(),
        marks_pos,
        marks_neg,
        explanation: String::new(),
        image: None,
    }
}

fn options_mut(body: &mut QuestionBody) -> Option<&mut Vec<AnswerOption>> {
    match body {
        QuestionBody::MultipleChoice { options }
        | QuestionBody::MultiSelect { options }
        | QuestionBody::TrueFalse { options } => Some(options),
        _ => None,
    }
}

pub fn blank_section(position: usize) -> TestSection {
    TestSection {
        name: format!("Section {position}"),
        questions: Vec::new(),
        use_uniform_marking: false,
        uniform_marks_pos: 1.0,
        uniform_marks_neg: 0.0,
        time_limit: 0,
        selected_chapters: Vec::new(),
        question_count: None,
        unattempted_marks: 0.0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogChapter {
    /// Server id, or the chapter name while the chapter is unsaved.
    pub id: String,
    pub name: String,
    pub subject: String,
}

/// Flat list of the draft's chapters used to scope tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterCatalog {
    chapters: Vec<CatalogChapter>,
}

impl ChapterCatalog {
    pub fn from_draft(course: &DraftCourse) -> Self {
        let chapters = course
            .subjects
            .iter()
            .flat_map(|subject| {
                subject.chapters.iter().map(move |chapter| CatalogChapter {
                    id: chapter
                        .id
                        .as_ref()
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| chapter.name.clone()),
                    name: chapter.name.clone(),
                    subject: subject.name.clone(),
                })
            })
            .collect();
        Self { chapters }
    }

    pub fn chapters(&self) -> &[CatalogChapter] {
        &self.chapters
    }

    pub fn find(&self, id: &str) -> Option<&CatalogChapter> {
        self.chapters.iter().find(|chapter| chapter.id == id)
    }

    /// Sorted, without duplicates or blank names.
    pub fn subjects(&self) -> Vec<String> {
        self.chapters
            .iter()
            .filter(|chapter| !chapter.subject.is_empty())
            .map(|chapter| chapter.subject.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn chapters_for_subject(&self, subject: &str) -> Vec<&CatalogChapter> {
        self.chapters
            .iter()
            .filter(|chapter| chapter.subject == subject)
            .collect()
    }

    /// Every chapter when `subjects` is empty.
    pub fn chapters_for_subjects(&self, subjects: &[String]) -> Vec<&CatalogChapter> {
        self.chapters
            .iter()
            .filter(|chapter| subjects.is_empty() || subjects.contains(&chapter.subject))
            .collect()
    }

    pub fn display_name(&self, id: &str) -> String {
        match self.find(id) {
            Some(chapter) => format!("{} - {}", chapter.subject, chapter.name),
            None => id.to_string(),
        }
    }
}

/// A test being written or edited, plus which section has focus.
#[derive(Debug, Clone, PartialEq)]
pub struct TestEditor {
    test: TestDocument,
    focused_section: usize,
    catalog: ChapterCatalog,
}

impl TestEditor {
    pub fn new_test(catalog: ChapterCatalog) -> Self {
        let mut editor = Self {
            test: TestDocument {
                id: None,
                title: String::new(),
                kind: TestScopeKind::Chapter,
                duration: DEFAULT_TEST_DURATION,
                instructions: String::new(),
                has_negative_marking: false,
                scoring_formula: ScoringFormula::RawScore,
                unattempted_marks: 0.0,
                chapter_id: None,
                selected_subject: None,
                selected_chapters: Vec::new(),
                selected_subjects: None,
                sections: vec![blank_section(1)],
                status: "draft".to_string(),
            },
            focused_section: 0,
            catalog,
        };
        editor.set_scope(TestScopeKind::Chapter);
        editor
    }

    /// Wraps a test fetched from the server, filling in the scope fields the
    /// server leaves out.
    pub fn open(mut test: TestDocument, catalog: ChapterCatalog) -> Self {
        match test.kind {
            TestScopeKind::Chapter => {
                let subject = test
                    .chapter_id
                    .as_deref()
                    .and_then(|id| catalog.find(id))
                    .map(|chapter| chapter.subject.clone());
                if subject.is_some() {
                    test.selected_subject = subject;
                }
            }
            TestScopeKind::Overall => {
                test.selected_subjects.get_or_insert_with(Vec::new);
            }
        }
        Self {
            test,
            focused_section: 0,
            catalog,
        }
    }

    pub fn test(&self) -> &TestDocument {
        &self.test
    }

    pub fn test_mut(&mut self) -> &mut TestDocument {
        &mut self.test
    }

    pub fn into_test(self) -> TestDocument {
        self.test
    }

    pub fn catalog(&self) -> &ChapterCatalog {
        &self.catalog
    }

    pub fn focused_section(&self) -> usize {
        self.focused_section
    }

    pub fn validate(&self) -> Result<(), TestError> {
        validate_test(&self.test)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn set_scope(&mut self, kind: TestScopeKind) {
        self.test.kind = kind;
        match kind {
            TestScopeKind::Overall => {
                self.test.selected_chapters = self
                    .catalog
                    .chapters()
                    .iter()
                    .map(|chapter| chapter.id.clone())
                    .collect();
                self.test.chapter_id = None;
                self.test.selected_subject = None;
                self.test.selected_subjects.get_or_insert_with(Vec::new);
            }
            TestScopeKind::Chapter => {
                if self.test.chapter_id.is_none() {
                    self.test.chapter_id = self
                        .catalog
                        .chapters()
                        .first()
                        .map(|chapter| chapter.id.clone());
                }
                let subject = self
                    .test
                    .chapter_id
                    .as_deref()
                    .and_then(|id| self.catalog.find(id))
                    .map(|chapter| chapter.subject.clone());
                if subject.is_some() {
                    self.test.selected_subject = subject;
                }
            }
        }
    }

    /// Picking another subject drops the chapter choice.
    pub fn select_subject(&mut self, subject: impl Into<String>) {
        self.test.selected_subject = Some(subject.into());
        self.test.chapter_id = None;
    }

    pub fn select_chapter(&mut self, chapter_id: impl Into<String>) {
        self.test.chapter_id = Some(chapter_id.into());
    }

    pub fn add_section(&mut self) {
        let position = self.test.sections.len() + 1;
        self.test.sections.push(blank_section(position));
        self.focused_section = self.test.sections.len() - 1;
    }

    pub fn remove_section(&mut self, index: usize) {
        if index >= self.test.sections.len() {
            return;
        }
        self.test.sections.remove(index);
        if self.focused_section >= self.test.sections.len() {
            self.focused_section = self.test.sections.len().saturating_sub(1);
        }
    }

    pub fn prev_section(&mut self) {
        self.focused_section = self.focused_section.saturating_sub(1);
    }

    pub fn next_section(&mut self) {
        if self.focused_section + 1 < self.test.sections.len() {
            self.focused_section += 1;
        }
    }

    /// Appends a blank MCQ and returns its index.
    pub fn add_question(&mut self, section: usize) -> Option<usize> {
        let section = self.test.sections.get_mut(section)?;
        let (pos, neg) = if section.use_uniform_marking {
            (section.uniform_marks_pos, section.uniform_marks_neg)
        } else {
            (1.0, 0.0)
        };
        section
            .questions
            .push(blank_question(QuestionType::MultipleChoice, pos, neg));
        Some(section.questions.len() - 1)
    }

    pub fn remove_question(&mut self, section: usize, question: usize) {
        if let Some(section) = self.test.sections.get_mut(section) {
            if question < section.questions.len() {
                section.questions.remove(question);
            }
        }
    }

    pub fn question_mut(&mut self, section: usize, question: usize) -> Option<&mut Question> {
        self.test.sections.get_mut(section)?.questions.get_mut(question)
    }

    /// Replaces the answer shape. Options survive a switch between option-based
    /// kinds.
    pub fn change_question_type(&mut self, section: usize, question: usize, kind: QuestionType) {
        let Some(question) = self.question_mut(section, question) else {
            return;
        };
        if question.body.question_type() == kind {
            return;
        }
        let kept = options_mut(&mut question.body).map(std::mem::take);
        let mut body = blank_body(kind);
        if let (Some(kept), Some(options)) = (kept, options_mut(&mut body)) {
            if kind != QuestionType::TrueFalse {
                *options = kept;
            }
        }
        question.body = body;
    }

    pub fn set_uniform_marking(&mut self, section: usize, enabled: bool) {
        if let Some(target) = self.test.sections.get_mut(section) {
            target.use_uniform_marking = enabled;
            apply_uniform_marks(target);
        }
    }

    pub fn set_uniform_marks(&mut self, section: usize, marks_pos: f64, marks_neg: f64) {
        if let Some(target) = self.test.sections.get_mut(section) {
            target.uniform_marks_pos = marks_pos;
            target.uniform_marks_neg = marks_neg;
            apply_uniform_marks(target);
        }
    }

    /// Single-choice kinds keep exactly one correct option; MSQ toggles.
    pub fn set_correct_option(&mut self, section: usize, question: usize, option: usize) {
        let Some(question) = self.question_mut(section, question) else {
            return;
        };
        match &mut question.body {
            QuestionBody::MultipleChoice { options } | QuestionBody::TrueFalse { options } => {
                if option < options.len() {
                    for (index, candidate) in options.iter_mut().enumerate() {
                        candidate.is_correct = index == option;
                    }
                }
            }
            QuestionBody::MultiSelect { options } => {
                if let Some(candidate) = options.get_mut(option) {
                    candidate.is_correct = !candidate.is_correct;
                }
            }
            _ => {}
        }
    }

    pub fn add_option(&mut self, section: usize, question: usize) {
        if let Some(options) = self
            .question_mut(section, question)
            .and_then(|q| options_mut(&mut q.body))
        {
            options.push(AnswerOption::default());
        }
    }

    pub fn remove_option(&mut self, section: usize, question: usize, option: usize) {
        if let Some(options) = self
            .question_mut(section, question)
            .and_then(|q| options_mut(&mut q.body))
        {
            if option < options.len() {
                options.remove(option);
            }
        }
    }

    pub fn add_pair(&mut self, section: usize, question: usize) {
        if let Some(Question {
            body: QuestionBody::Matching { pairs },
            ..
        }) = self.question_mut(section, question)
        {
            pairs.push(MatchPair::default());
        }
    }

    pub fn remove_pair(&mut self, section: usize, question: usize, pair: usize) {
        if let Some(Question {
            body: QuestionBody::Matching { pairs },
            ..
        }) = self.question_mut(section, question)
        {
            if pair < pairs.len() {
                pairs.remove(pair);
            }
        }
    }

    pub fn add_sequence_item(&mut self, section: usize, question: usize) {
        if let Some(Question {
            body: QuestionBody::Sequence { items },
            ..
        }) = self.question_mut(section, question)
        {
            let order = u32::try_from(items.len() + 1).unwrap_or(u32::MAX);
            items.push(SequenceItem {
                text: String::new(),
                order,
            });
        }
    }

    pub fn remove_sequence_item(&mut self, section: usize, question: usize, item: usize) {
        if let Some(Question {
            body: QuestionBody::Sequence { items },
            ..
        }) = self.question_mut(section, question)
        {
            if item < items.len() {
                items.remove(item);
            }
        }
    }
}

fn apply_uniform_marks(section: &mut TestSection) {
    if !section.use_uniform_marking {
        return;
    }
    for question in &mut section.questions {
        question.marks_pos = section.uniform_marks_pos;
        question.marks_neg = section.uniform_marks_neg;
    }
}

pub fn default_distribution() -> BTreeMap<QuestionType, u32> {
    let mut distribution: BTreeMap<QuestionType, u32> =
        QuestionType::ALL.iter().map(|kind| (*kind, 0)).collect();
    distribution.insert(QuestionType::MultipleChoice, DEFAULT_GENERATED_COUNT);
    distribution
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoGenSection {
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

impl AutoGenSection {
    pub fn new(position: usize) -> Self {
        Self {
            name: format!("Section {position}"),
            question_count: DEFAULT_GENERATED_COUNT,
            type_distribution: default_distribution(),
            chapters: Vec::new(),
            selected_subjects: Vec::new(),
            marks_pos: 1.0,
            marks_neg: 0.0,
            unattempted_marks: 0.0,
            time_limit: 0,
        }
    }

    pub fn set_question_count(&mut self, count: u32) {
        self.question_count = count.min(MAX_GENERATED_QUESTIONS);
    }

    pub fn distribution_total(&self) -> u32 {
        self.type_distribution.values().sum()
    }

    /// Splits `question_count` across question types in proportion to the
    /// distribution. Rounding leftovers go to MCQ.
    pub fn allocation(&self) -> BTreeMap<QuestionType, u32> {
        let requested = self.question_count;
        let sum = self.distribution_total();

        if requested == 0 {
            return self.type_distribution.clone();
        }

        let mut out: BTreeMap<QuestionType, u32> = self
            .type_distribution
            .keys()
            .map(|kind| (*kind, 0))
            .collect();
        if sum == 0 {
            out.insert(QuestionType::MultipleChoice, requested);
            return out;
        }

        let mut allocated = 0;
        for (kind, weight) in &self.type_distribution {
            let share = (u64::from(*weight) * u64::from(requested) / u64::from(sum)) as u32;
            out.insert(*kind, share);
            allocated += share;
        }
        *out.entry(QuestionType::MultipleChoice).or_insert(0) +=
            requested.saturating_sub(allocated);
        out
    }

    fn is_valid(&self) -> bool {
        self.question_count > 0
            && !self.selected_subjects.is_empty()
            && !self.chapters.is_empty()
            && self.distribution_total() == self.question_count
    }

    fn to_request(&self) -> AutoGenerateSection {
        AutoGenerateSection {
            name: self.name.clone(),
            question_count: self.question_count,
            type_distribution: self.type_distribution.clone(),
            chapters: self.chapters.clone(),
            selected_subjects: self.selected_subjects.clone(),
            marks_pos: self.marks_pos,
            marks_neg: self.marks_neg,
            unattempted_marks: self.unattempted_marks,
            time_limit: self.time_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoGenConfig {
    pub test_type: TestScopeKind,
    pub sections: Vec<AutoGenSection>,
}

impl Default for AutoGenConfig {
    fn default() -> Self {
        Self {
            test_type: TestScopeKind::Chapter,
            sections: vec![AutoGenSection::new(1)],
        }
    }
}

impl AutoGenConfig {
    /// Grows with fresh sections or truncates.
    pub fn set_section_count(&mut self, count: usize) {
        if count < self.sections.len() {
            self.sections.truncate(count);
            return;
        }
        for position in self.sections.len() + 1..=count {
            self.sections.push(AutoGenSection::new(position));
        }
    }

    pub fn total_questions(&self) -> u32 {
        self.sections.iter().map(|section| section.question_count).sum()
    }

    pub fn is_valid(&self) -> bool {
        !self.sections.is_empty()
            && self.sections.iter().all(AutoGenSection::is_valid)
            && self.total_questions() > 0
    }

    pub fn to_request(&self) -> AutoGenerateRequest {
        AutoGenerateRequest {
            test_type: self.test_type,
            num_sections: u32::try_from(self.sections.len()).unwrap_or(u32::MAX),
            sections: self.sections.iter().map(AutoGenSection::to_request).collect(),
        }
    }

    /// Builds a local draft test with placeholder questions from the
    /// allocation of every section.
    pub fn generate_skeleton(&self, catalog: ChapterCatalog) -> TestEditor {
        let mut editor = TestEditor::new_test(catalog);
        editor.test.title = GENERATED_TEST_TITLE.to_string();
        editor.test.sections = self
            .sections
            .iter()
            .enumerate()
            .map(|(index, config)| {
                let mut section = blank_section(index + 1);
                if filled(&config.name) {
                    section.name = config.name.clone();
                }
                section.use_uniform_marking = true;
                section.uniform_marks_pos = config.marks_pos;
                section.uniform_marks_neg = config.marks_neg;
                section.time_limit = config.time_limit;
                section.selected_chapters = config.chapters.clone();
                section.unattempted_marks = config.unattempted_marks;

                let mut capped = config.clone();
                capped.set_question_count(config.question_count);
                for (kind, count) in capped.allocation() {
                    for number in 1..=count {
                        section.questions.push(generated_question(
                            kind,
                            number,
                            config.marks_pos,
                            config.marks_neg,
                        ));
                    }
                }
                section
            })
            .collect();
        debug!(
            sections = editor.test.sections.len(),
            "generated local test skeleton"
        );
        editor
    }
}

fn generated_question(kind: QuestionType, number: u32, marks_pos: f64, marks_neg: f64) -> Question {
    let mut question = blank_question(kind, marks_pos, marks_neg);
    question.text = format!("Generated {} Question {number} (Chapter: N/A)", kind.label());
    if let Some(options) = options_mut(&mut question.body) {
        if kind != QuestionType::TrueFalse {
            *options = vec![
                AnswerOption {
                    text: "Option A".to_string(),
                    is_correct: false,
                },
                AnswerOption {
                    text: "Option B".to_string(),
                    is_correct: false,
                },
            ];
        }
    }
    question
}

#[cfg(test)]
#[path = "tests/assessment_tests.rs"]
mod tests;
