use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(CourseId);
id_newtype!(SubjectId);
id_newtype!(ChapterId);
id_newtype!(TestId);
id_newtype!(PackageId);
id_newtype!(CreatorUuid);

/// Client-side correlation key for draft entities. Never sent as a server identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalKey(pub Uuid);

impl LocalKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LocalKey {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    #[default]
    Draft,
    Active,
}

impl CourseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterSourceKind {
    #[default]
    #[serde(alias = "link")]
    Youtube,
    File,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TestScopeKind {
    #[default]
    #[serde(rename = "CHAPTER")]
    Chapter,
    #[serde(rename = "OVERALL")]
    Overall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "MCQ")]
    MultipleChoice,
    #[serde(rename = "MSQ")]
    MultiSelect,
    #[serde(rename = "True/False")]
    TrueFalse,
    #[serde(rename = "Descriptive")]
    Descriptive,
    #[serde(rename = "Fill-in-the-Blanks")]
    FillBlank,
    #[serde(rename = "Matching")]
    Matching,
    #[serde(rename = "Sequence")]
    Sequence,
}

impl QuestionType {
    pub const ALL: [QuestionType; 7] = [
        QuestionType::MultipleChoice,
        QuestionType::MultiSelect,
        QuestionType::TrueFalse,
        QuestionType::Descriptive,
        QuestionType::FillBlank,
        QuestionType::Matching,
        QuestionType::Sequence,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::MultipleChoice => "MCQ",
            Self::MultiSelect => "MSQ",
            Self::TrueFalse => "True/False",
            Self::Descriptive => "Descriptive",
            Self::FillBlank => "Fill-in-the-Blanks",
            Self::Matching => "Matching",
            Self::Sequence => "Sequence",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScoringFormula {
    #[default]
    #[serde(rename = "Raw Score")]
    RawScore,
    #[serde(rename = "Percentile (JEE/NEET)")]
    Percentile,
    #[serde(rename = "Scaled Score (CAT)")]
    Scaled,
    #[serde(rename = "Custom")]
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    #[default]
    Months,
    Years,
}
