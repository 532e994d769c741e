// SPDX-License-Identifier: MPL-2.0

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// `{subject}_grade{g}_lesson_{n}`, e.g. `maths_grade1_lesson_1`
static LESSON_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(english|maths|science|social|gk)_grade([1-5])_lesson_([1-9][0-9]*)$")
        .expect("lesson id pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    English,
    Maths,
    Science,
    Social,
    Gk,
}

impl Subject {
    pub const ALL: [Subject; 5] = [
        Subject::English,
        Subject::Maths,
        Subject::Science,
        Subject::Social,
        Subject::Gk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Subject::English => "english",
            Subject::Maths => "maths",
            Subject::Science => "science",
            Subject::Social => "social",
            Subject::Gk => "gk",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Subject::English => "English",
            Subject::Maths => "Maths",
            Subject::Science => "Science",
            Subject::Social => "Social Studies",
            Subject::Gk => "General Knowledge",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown subject: {0}")]
pub struct UnknownSubject(pub String);

impl FromStr for Subject {
    type Err = UnknownSubject;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subject::ALL
            .into_iter()
            .find(|subject| subject.as_str() == s)
            .ok_or_else(|| UnknownSubject(s.to_string()))
    }
}

/// A parsed lesson identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LessonKey {
    pub subject: Subject,
    pub grade: u8,
    pub number: u32,
}

impl LessonKey {
    pub fn parse(lesson_id: &str) -> Option<Self> {
        let caps = LESSON_ID_RE.captures(lesson_id)?;
        Some(Self {
            subject: caps[1].parse().ok()?,
            grade: caps[2].parse().ok()?,
            number: caps[3].parse().ok()?,
        })
    }

    pub fn id(&self) -> String {
        format!("{}_grade{}_lesson_{}", self.subject, self.grade, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_round_trip_through_str() {
        for subject in Subject::ALL {
            assert_eq!(subject.as_str().parse::<Subject>(), Ok(subject));
        }
        let err = "history".parse::<Subject>().unwrap_err();
        assert_eq!(err, UnknownSubject("history".to_string()));
        assert_eq!(err.to_string(), "unknown subject: history");
    }

    #[test]
    fn test_unknown_subject_is_an_error_value() {
        let err: Box<dyn std::error::Error + Send + Sync> = Box::new(UnknownSubject("art".to_string()));
        assert_eq!(err.to_string(), "unknown subject: art");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_lesson_key_parse() {
        let key = LessonKey::parse("maths_grade1_lesson_1").unwrap();
        assert_eq!(key.subject, Subject::Maths);
        assert_eq!(key.grade, 1);
        assert_eq!(key.number, 1);
        assert_eq!(key.id(), "maths_grade1_lesson_1");
    }

    #[test]
    fn test_lesson_key_rejects_malformed() {
        assert!(LessonKey::parse("maths_grade9_lesson_1").is_none());
        assert!(LessonKey::parse("maths_grade1_lesson_0").is_none());
        assert!(LessonKey::parse("art_grade1_lesson_1").is_none());
        assert!(LessonKey::parse("maths_grade1_lesson_1 ").is_none());
    }
}
