use serde::{Deserialize, Serialize};

use super::{non_blank, SchemaError, Validator};

pub const DEFAULT_LEVEL: u8 = 3;
pub const DEFAULT_YEARS: f64 = 1.0;

/// Technical skill as edited in the dashboard. `level` runs 1 (beginner)
/// to 5 (master).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    pub category_id: Option<String>,
    pub level: u8,
    pub years_experience: f64,
    pub tags: Vec<String>,
    pub visibility: bool,
    pub display_order: u32,
}

impl Default for SkillForm {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            category: String::new(),
            category_id: None,
            level: DEFAULT_LEVEL,
            years_experience: DEFAULT_YEARS,
            tags: Vec::new(),
            visibility: true,
            display_order: 0,
        }
    }
}

/// Skill as stored in the `technical_skills` collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub category_id: Option<String>,
    pub level: Option<u8>,
    pub years_experience: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub visibility: Option<bool>,
    pub display_order: Option<u32>,
}

impl SkillRow {
    pub fn level(&self) -> u8 {
        self.level.unwrap_or(0)
    }

    pub fn years(&self) -> f64 {
        self.years_experience.unwrap_or(0.0)
    }

    pub fn display_order(&self) -> u32 {
        self.display_order.unwrap_or(0)
    }
}

impl SkillForm {
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut v = Validator::default();
        v.length("name", &self.name, 1, 50)
            .length("category", &self.category, 1, usize::MAX)
            .check(
                (1..=5).contains(&self.level),
                "level",
                "must be between 1 and 5",
            )
            .check(
                (0.0..=50.0).contains(&self.years_experience),
                "yearsExperience",
                "must be between 0 and 50",
            );
        v.finish()
    }

    pub fn into_row(self) -> SkillRow {
        SkillRow {
            id: non_blank(self.id),
            name: Some(self.name.trim().to_string()),
            category: Some(self.category),
            category_id: non_blank(self.category_id),
            level: Some(self.level),
            years_experience: Some(self.years_experience),
            tags: Some(self.tags),
            visibility: Some(self.visibility),
            display_order: Some(self.display_order),
        }
    }

    pub fn from_row(row: Option<SkillRow>) -> Self {
        let Some(row) = row else {
            return Self::default();
        };
        Self {
            id: row.id,
            name: row.name.unwrap_or_default(),
            category: row.category.unwrap_or_default(),
            category_id: non_blank(row.category_id),
            level: row.level.filter(|l| *l > 0).unwrap_or(DEFAULT_LEVEL),
            years_experience: row.years_experience.unwrap_or(DEFAULT_YEARS),
            tags: row.tags.unwrap_or_default(),
            visibility: row.visibility.unwrap_or(true),
            display_order: row.display_order.unwrap_or(0),
        }
    }
}
