use serde::{Deserialize, Serialize};

use super::{non_blank, SchemaError, Validator};

pub const DEFAULT_COLOR: &str = "default";
pub const DEFAULT_ICON: &str = "mdi:folder-outline";

/// Skill category as edited in the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: String,
    pub label: String,
    pub color: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<String>,
    pub display_order: u32,
    /// Computed from linked skills, never stored.
    pub skill_count: u32,
}

impl Default for CategoryForm {
    fn default() -> Self {
        Self {
            id: None,
            value: String::new(),
            label: String::new(),
            color: DEFAULT_COLOR.to_string(),
            icon: Some(DEFAULT_ICON.to_string()),
            description: Some(String::new()),
            parent_id: None,
            display_order: 0,
            skill_count: 0,
        }
    }
}

/// Category as stored in the `categories` collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: Option<String>,
    pub label: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<String>,
    pub display_order: Option<u32>,
}

impl CategoryForm {
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut v = Validator::default();
        v.length("value", &self.value, 1, 50)
            .length("label", &self.label, 1, 50)
            .length(
                "description",
                self.description.as_deref().unwrap_or_default(),
                0,
                200,
            );
        v.finish()
    }

    pub fn into_row(self) -> CategoryRow {
        CategoryRow {
            id: non_blank(self.id),
            value: Some(self.value.trim().to_string()),
            label: Some(self.label.trim().to_string()),
            color: Some(self.color),
            icon: self.icon,
            description: Some(
                self.description
                    .map(|d| d.trim().to_string())
                    .unwrap_or_default(),
            ),
            parent_id: non_blank(self.parent_id),
            display_order: Some(self.display_order),
        }
    }

    /// Blank form for `None`; missing or blank stored fields fall back to
    /// the form defaults.
    pub fn from_row(row: Option<CategoryRow>) -> Self {
        let Some(row) = row else {
            return Self::default();
        };
        Self {
            id: row.id,
            value: row.value.unwrap_or_default(),
            label: row.label.unwrap_or_default(),
            color: non_blank(row.color).unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            icon: Some(non_blank(row.icon).unwrap_or_else(|| DEFAULT_ICON.to_string())),
            description: Some(row.description.unwrap_or_default()),
            parent_id: non_blank(row.parent_id),
            display_order: row.display_order.unwrap_or(0),
            skill_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_to_row_trims_and_renames() {
        let form: CategoryForm = serde_json::from_value(json!({
            "value": "  backend ",
            "label": " Back-end ",
            "description": "  servers  ",
            "parentId": "",
            "displayOrder": 3
        }))
        .unwrap();
        let row = form.into_row();
        assert_eq!(row.value.as_deref(), Some("backend"));
        assert_eq!(row.label.as_deref(), Some("Back-end"));
        assert_eq!(row.description.as_deref(), Some("servers"));
        assert_eq!(row.parent_id, None);
        assert_eq!(row.display_order, Some(3));

        let stored = serde_json::to_value(&row).unwrap();
        assert_eq!(stored["display_order"], json!(3));
        assert!(stored.get("id").is_none());
    }

    #[test]
    fn test_row_to_form_fills_defaults() {
        let row: CategoryRow = serde_json::from_value(json!({
            "id": "c1",
            "value": "tools",
            "color": "",
            "parent_id": "p1"
        }))
        .unwrap();
        let form = CategoryForm::from_row(Some(row));
        assert_eq!(form.id.as_deref(), Some("c1"));
        assert_eq!(form.label, "");
        assert_eq!(form.color, DEFAULT_COLOR);
        assert_eq!(form.icon.as_deref(), Some(DEFAULT_ICON));
        assert_eq!(form.parent_id.as_deref(), Some("p1"));
        assert_eq!(form.display_order, 0);
    }

    #[test]
    fn test_missing_row_gives_blank_form() {
        assert_eq!(CategoryForm::from_row(None), CategoryForm::default());
    }

    #[test]
    fn test_validation_limits() {
        let mut form = CategoryForm {
            value: "x".repeat(51),
            label: String::new(),
            description: Some("d".repeat(201)),
            ..CategoryForm::default()
        };
        match form.validate() {
            Err(SchemaError::Invalid(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected invalid, got {other:?}"),
        }

        form.value = "ok".into();
        form.label = "Ok".into();
        form.description = None;
        assert!(form.validate().is_ok());
    }
}
