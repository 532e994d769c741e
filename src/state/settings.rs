// SPDX-License-Identifier: MPL-2.0

use crate::config::APP_ID;
use crate::progress::rules::{StreakMode, ThresholdLevels};
use crate::progress::{Curriculum, Rules};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

fn default_leaderboard_size() -> usize {
    10
}

fn default_lessons_per_grade() -> u32 {
    10
}

/// Persistent application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// How many leaderboard rows to show above the student's own row
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
    /// Lessons per subject per grade, used for subject-complete badges
    #[serde(default = "default_lessons_per_grade")]
    pub lessons_per_grade: u32,
    /// Points needed for each level after the first. Unset keeps whatever
    /// level the backend stores.
    #[serde(default)]
    pub level_thresholds: Option<Vec<u64>>,
    #[serde(default)]
    pub streak_mode: StreakMode,
    #[serde(default)]
    pub theme: Theme,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            leaderboard_size: default_leaderboard_size(),
            lessons_per_grade: default_lessons_per_grade(),
            level_thresholds: None,
            streak_mode: StreakMode::default(),
            theme: Theme::default(),
        }
    }
}

impl AppSettings {
    /// Get the settings file path (~/.config/app.kidquest.KidQuest/settings.json)
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push(APP_ID);
            p.push("settings.json");
            p
        })
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                log::warn!("[SETTINGS] ignoring unreadable {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::settings_path().ok_or("Could not determine config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {e}"))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {e}"))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {e}"))?;

        Ok(())
    }

    pub fn rules(&self) -> Rules {
        let mut rules = Rules::default();
        if let Some(thresholds) = &self.level_thresholds {
            rules.level = Box::new(ThresholdLevels::new(thresholds.clone()));
        }
        rules.streak = self.streak_mode.rule();
        rules
    }

    pub fn curriculum(&self) -> Curriculum {
        Curriculum::uniform(self.lessons_per_grade)
    }
}
