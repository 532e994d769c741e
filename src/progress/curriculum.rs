// SPDX-License-Identifier: MPL-2.0

use crate::progress::record::ProgressRecord;
use crate::progress::subject::{LessonKey, Subject};
use std::collections::HashMap;

/// How many lessons each subject has at each grade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curriculum {
    default_lessons: u32,
    overrides: HashMap<(Subject, u8), u32>,
}

impl Curriculum {
    pub fn uniform(lessons_per_grade: u32) -> Self {
        Self {
            default_lessons: lessons_per_grade,
            overrides: HashMap::new(),
        }
    }

    pub fn with_lessons(mut self, subject: Subject, grade: u8, lessons: u32) -> Self {
        self.overrides.insert((subject, grade), lessons);
        self
    }

    pub fn lesson_count(&self, subject: Subject, grade: u8) -> u32 {
        self.overrides
            .get(&(subject, grade))
            .copied()
            .unwrap_or(self.default_lessons)
    }

    pub fn lesson_ids(&self, subject: Subject, grade: u8) -> impl Iterator<Item = String> {
        (1..=self.lesson_count(subject, grade)).map(move |number| {
            LessonKey {
                subject,
                grade,
                number,
            }
            .id()
        })
    }

    /// Every lesson of the subject at this grade is done. An empty subject
    /// never counts as complete.
    pub fn is_subject_complete(&self, record: &ProgressRecord, subject: Subject, grade: u8) -> bool {
        self.lesson_count(subject, grade) > 0
            && self
                .lesson_ids(subject, grade)
                .all(|id| record.completed_lessons.contains(&id))
    }
}
