// SPDX-License-Identifier: MPL-2.0

//! Badge catalog and unlock evaluation.

use crate::progress::curriculum::Curriculum;
use crate::progress::record::{AwardRecord, ProgressRecord};
use crate::progress::subject::Subject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What a badge asks for. Serialized as `{"lessons": 10}` and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeRequirement {
    Lessons(u64),
    PerfectQuizzes(u64),
    SubjectComplete(Subject),
    Streak(u32),
}

impl BadgeRequirement {
    pub fn is_met(&self, record: &ProgressRecord, grade: u8, curriculum: &Curriculum) -> bool {
        match *self {
            BadgeRequirement::Lessons(count) => record.completed_lessons.len() as u64 >= count,
            BadgeRequirement::PerfectQuizzes(count) => record.perfect_quiz_count() as u64 >= count,
            BadgeRequirement::SubjectComplete(subject) => {
                curriculum.is_subject_complete(record, subject, grade)
            }
            BadgeRequirement::Streak(days) => record.current_streak >= days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub icon: String,
    #[serde(default)]
    pub description: String,
    pub requirement: BadgeRequirement,
}

impl Badge {
    fn new(id: &str, name: &str, icon: &str, description: &str, requirement: BadgeRequirement) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            description: description.to_string(),
            requirement,
        }
    }

    pub fn to_award(&self) -> AwardRecord {
        AwardRecord::new(&self.id, &self.name, &self.icon)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeCatalog {
    badges: Vec<Badge>,
}

impl BadgeCatalog {
    pub fn new(badges: Vec<Badge>) -> Self {
        Self { badges }
    }

    /// The badges shipped with the app
    pub fn standard() -> Self {
        use BadgeRequirement::*;

        let mut badges = vec![
            Badge::new("first_steps", "First Steps", "\u{1F463}", "Finish your first lesson", Lessons(1)),
            Badge::new("super_learner", "Super Learner", "\u{1F31F}", "Finish 10 lessons", Lessons(10)),
            Badge::new("lesson_legend", "Lesson Legend", "\u{1F3C6}", "Finish 50 lessons", Lessons(50)),
            Badge::new("quiz_whiz", "Quiz Whiz", "\u{1F9E0}", "Get every answer right in a quiz", PerfectQuizzes(1)),
            Badge::new("perfect_five", "Perfect Five", "\u{1F4AF}", "Score 100% in 5 quizzes", PerfectQuizzes(5)),
            Badge::new("on_fire", "On Fire", "\u{1F525}", "Learn 3 days in a row", Streak(3)),
            Badge::new("week_warrior", "Week Warrior", "\u{1F4C5}", "Learn 7 days in a row", Streak(7)),
        ];

        for subject in Subject::ALL {
            badges.push(Badge::new(
                &format!("{}_champion", subject.as_str()),
                &format!("{} Champion", subject.display_name()),
                "\u{1F396}",
                &format!("Finish every {} lesson in your grade", subject.display_name()),
                SubjectComplete(subject),
            ));
        }

        Self { badges }
    }

    pub fn get(&self, id: &str) -> Option<&Badge> {
        self.badges.iter().find(|b| b.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Badge> {
        self.badges.iter()
    }

    pub fn len(&self) -> usize {
        self.badges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }
}

/// Ids of badges whose requirement `record` meets and which it does not hold.
pub fn evaluate(
    record: &ProgressRecord,
    grade: u8,
    catalog: &BadgeCatalog,
    curriculum: &Curriculum,
) -> BTreeSet<String> {
    catalog
        .iter()
        .filter(|badge| !record.has_badge(&badge.id))
        .filter(|badge| badge.requirement.is_met(record, grade, curriculum))
        .map(|badge| badge.id.clone())
        .collect()
}
