//! Stage validity predicates over the draft aggregate.
//!
//! The `validate_*` functions report the first failing rule; the boolean
//! predicates are what gate wizard navigation.

use thiserror::Error;

use crate::{
    draft::{DraftChapter, DraftCourse},
    error::ClientError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Course name is required")]
    MissingCourseName,
    #[error("Course description is required")]
    MissingDescription,
    #[error("A course thumbnail is required")]
    MissingThumbnail,
    #[error("Add at least one subject")]
    NoSubjects,
    #[error("Subject {position} needs a name")]
    UnnamedSubject { position: usize },
    #[error("Subject \"{subject}\" needs at least one chapter")]
    NoChapters { subject: String },
    #[error("Chapter {position} in \"{subject}\" needs a name")]
    UnnamedChapter { subject: String, position: usize },
    #[error("Chapter \"{chapter}\" in \"{subject}\" needs a link or uploaded file")]
    MissingChapterSource { subject: String, chapter: String },
}

impl From<ValidationError> for ClientError {
    fn from(value: ValidationError) -> Self {
        ClientError::validation(value.to_string())
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn validate_course_info(course: &DraftCourse) -> Result<(), ValidationError> {
    if blank(&course.name) {
        return Err(ValidationError::MissingCourseName);
    }
    if blank(&course.description) {
        return Err(ValidationError::MissingDescription);
    }
    if !course.thumbnail.is_set() {
        return Err(ValidationError::MissingThumbnail);
    }
    Ok(())
}

pub fn validate_subjects(course: &DraftCourse) -> Result<(), ValidationError> {
    if course.subjects.is_empty() {
        return Err(ValidationError::NoSubjects);
    }
    match course.subjects.iter().position(|subject| blank(&subject.name)) {
        Some(index) => Err(ValidationError::UnnamedSubject {
            position: index + 1,
        }),
        None => Ok(()),
    }
}

pub fn validate_chapters(course: &DraftCourse) -> Result<(), ValidationError> {
    validate_subjects(course)?;
    for subject in &course.subjects {
        if subject.chapters.is_empty() {
            return Err(ValidationError::NoChapters {
                subject: subject.name.trim().to_string(),
            });
        }
        for (index, chapter) in subject.chapters.iter().enumerate() {
            if blank(&chapter.name) {
                return Err(ValidationError::UnnamedChapter {
                    subject: subject.name.trim().to_string(),
                    position: index + 1,
                });
            }
            if !chapter.source.is_complete() {
                return Err(ValidationError::MissingChapterSource {
                    subject: subject.name.trim().to_string(),
                    chapter: chapter.name.trim().to_string(),
                });
            }
        }
    }
    Ok(())
}

pub fn chapter_valid(chapter: &DraftChapter) -> bool {
    !blank(&chapter.name) && chapter.source.is_complete()
}

pub fn course_info_valid(course: &DraftCourse) -> bool {
    validate_course_info(course).is_ok()
}

pub fn subjects_valid(course: &DraftCourse) -> bool {
    validate_subjects(course).is_ok()
}

pub fn chapters_valid(course: &DraftCourse) -> bool {
    validate_chapters(course).is_ok()
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
