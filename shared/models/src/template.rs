//! Card templates: an ordered list of fields placed on the front or back of a card.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::user::is_valid_mobile;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardSide {
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "portrait" => Some(Self::Portrait),
            "landscape" => Some(Self::Landscape),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Date,
    Email,
    Phone,
    Image,
}

impl FieldType {
    /// Check a submitted value against the field type.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Self::Text | Self::Image => true,
            Self::Number => value.trim().parse::<f64>().is_ok(),
            Self::Date => NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).is_ok(),
            Self::Email => {
                let mut parts = value.trim().splitn(2, '@');
                matches!(
                    (parts.next(), parts.next()),
                    (Some(local), Some(domain)) if !local.is_empty() && domain.contains('.')
                )
            }
            Self::Phone => is_valid_mobile(value.trim()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TemplateField {
    #[validate(custom = "validate_field_key")]
    pub key: String,
    #[validate(length(min = 1, max = 100, message = "Field label must be between 1 and 100 characters"))]
    pub label: String,
    #[serde(default)]
    pub field_type: FieldType,
    pub side: CardSide,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub orientation: Orientation,
    pub front_background_url: Option<String>,
    pub back_background_url: Option<String>,
    pub fields: Vec<TemplateField>,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A problem found while checking card data against a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldProblem {
    MissingRequired { key: String },
    UnknownField { key: String },
    InvalidValue { key: String, expected: FieldType },
}

impl std::fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { key } => write!(f, "'{key}' is required"),
            Self::UnknownField { key } => write!(f, "'{key}' is not a field of this template"),
            Self::InvalidValue { key, expected } => {
                write!(f, "'{key}' is not a valid {expected:?} value")
            }
        }
    }
}

/// Sort fields front-first by position and renumber positions per side.
///
/// Fields with equal positions keep their submitted order.
pub fn normalize_fields(fields: &mut [TemplateField]) {
    fields.sort_by_key(|f| (f.side, f.position));
    let mut next = BTreeMap::new();
    for field in fields.iter_mut() {
        let counter = next.entry(field.side).or_insert(0u32);
        field.position = *counter;
        *counter += 1;
    }
}

impl Template {
    pub fn fields_for(&self, side: CardSide) -> impl Iterator<Item = &TemplateField> {
        self.fields.iter().filter(move |f| f.side == side)
    }

    pub fn field(&self, key: &str) -> Option<&TemplateField> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Check submitted card data against the template's fields.
    pub fn validate_card_data(&self, data: &BTreeMap<String, String>) -> Vec<FieldProblem> {
        let mut problems = Vec::new();

        for field in &self.fields {
            match data.get(&field.key).map(|v| v.trim()) {
                None | Some("") if field.required => problems.push(FieldProblem::MissingRequired {
                    key: field.key.clone(),
                }),
                Some(value) if !value.is_empty() && !field.field_type.accepts(value) => {
                    problems.push(FieldProblem::InvalidValue {
                        key: field.key.clone(),
                        expected: field.field_type,
                    })
                }
                _ => {}
            }
        }

        for key in data.keys() {
            if self.field(key).is_none() {
                problems.push(FieldProblem::UnknownField { key: key.clone() });
            }
        }

        problems
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTemplateRequest {
    /// Required for owners and agents; admins always create inside their own organization.
    pub organization_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "Template name must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[serde(default)]
    pub orientation: Orientation,
    pub front_background_url: Option<String>,
    pub back_background_url: Option<String>,
    #[validate(custom = "validate_field_list")]
    pub fields: Vec<TemplateField>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTemplateRequest {
    #[validate(length(min = 1, max = 255, message = "Template name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub orientation: Option<Orientation>,
    pub front_background_url: Option<String>,
    pub back_background_url: Option<String>,
    #[validate(custom = "validate_field_list")]
    pub fields: Option<Vec<TemplateField>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateFilter {
    pub search: Option<String>,
    pub organization_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

/// Field keys are lower snake_case identifiers.
pub fn is_valid_field_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && key.len() <= 64
}

pub fn validate_field_key(key: &str) -> Result<(), ValidationError> {
    if is_valid_field_key(key) {
        Ok(())
    } else {
        let mut error = ValidationError::new("field_key");
        error.message = Some(format!("'{key}' is not a valid field key").into());
        Err(error)
    }
}

pub fn validate_field_list(fields: &[TemplateField]) -> Result<(), ValidationError> {
    if fields.is_empty() {
        let mut error = ValidationError::new("fields");
        error.message = Some("A template needs at least one field".into());
        return Err(error);
    }

    let mut seen = HashSet::new();
    for field in fields {
        if field.validate().is_err() {
            let mut error = ValidationError::new("field");
            error.message = Some(format!("Field '{}' needs a snake_case key and a label", field.key).into());
            return Err(error);
        }
        if !seen.insert(field.key.as_str()) {
            let mut error = ValidationError::new("duplicate_field");
            error.message = Some(format!("Field key '{}' is used more than once", field.key).into());
            return Err(error);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(key: &str, side: CardSide, position: u32, field_type: FieldType, required: bool) -> TemplateField {
        TemplateField {
            key: key.to_string(),
            label: key.to_uppercase(),
            field_type,
            side,
            position,
            required,
        }
    }

    fn template(fields: Vec<TemplateField>) -> Template {
        Template {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Student".to_string(),
            description: None,
            orientation: Orientation::Portrait,
            front_background_url: None,
            back_background_url: None,
            fields,
            is_active: true,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_normalize_orders_front_first_and_renumbers() {
        let mut fields = vec![
            field("address", CardSide::Back, 5, FieldType::Text, false),
            field("class", CardSide::Front, 10, FieldType::Text, false),
            field("blood_group", CardSide::Back, 1, FieldType::Text, false),
            field("roll_no", CardSide::Front, 2, FieldType::Number, true),
        ];
        normalize_fields(&mut fields);

        let order: Vec<(&str, CardSide, u32)> = fields
            .iter()
            .map(|f| (f.key.as_str(), f.side, f.position))
            .collect();
        assert_eq!(
            order,
            vec![
                ("roll_no", CardSide::Front, 0),
                ("class", CardSide::Front, 1),
                ("blood_group", CardSide::Back, 0),
                ("address", CardSide::Back, 1),
            ]
        );
    }

    #[test]
    fn test_validate_card_data() {
        let template = template(vec![
            field("roll_no", CardSide::Front, 0, FieldType::Number, true),
            field("dob", CardSide::Front, 1, FieldType::Date, true),
            field("guardian_phone", CardSide::Back, 0, FieldType::Phone, false),
        ]);

        let mut data = BTreeMap::new();
        data.insert("roll_no".to_string(), "42".to_string());
        data.insert("dob".to_string(), "2010-04-01".to_string());
        assert!(template.validate_card_data(&data).is_empty());

        data.insert("dob".to_string(), "01/04/2010".to_string());
        data.insert("nickname".to_string(), "Ace".to_string());
        data.remove("roll_no");
        let problems = template.validate_card_data(&data);
        assert_eq!(
            problems,
            vec![
                FieldProblem::MissingRequired { key: "roll_no".to_string() },
                FieldProblem::InvalidValue { key: "dob".to_string(), expected: FieldType::Date },
                FieldProblem::UnknownField { key: "nickname".to_string() },
            ]
        );
    }

    #[test]
    fn test_blank_required_value_is_missing() {
        let template = template(vec![field("name", CardSide::Front, 0, FieldType::Text, true)]);
        let mut data = BTreeMap::new();
        data.insert("name".to_string(), "   ".to_string());
        assert_eq!(
            template.validate_card_data(&data),
            vec![FieldProblem::MissingRequired { key: "name".to_string() }]
        );
    }

    #[test]
    fn test_field_list_rules() {
        assert!(validate_field_list(&[]).is_err());
        let duplicated = vec![
            field("name", CardSide::Front, 0, FieldType::Text, true),
            field("name", CardSide::Back, 0, FieldType::Text, false),
        ];
        assert!(validate_field_list(&duplicated).is_err());
    }

    #[test]
    fn test_field_key_rules() {
        assert!(is_valid_field_key("employee_id"));
        assert!(is_valid_field_key("line2"));
        assert!(!is_valid_field_key("Employee"));
        assert!(!is_valid_field_key("2nd_line"));
        assert!(!is_valid_field_key(""));
        assert!(!is_valid_field_key("first-name"));
    }

    #[test]
    fn test_field_type_accepts() {
        assert!(FieldType::Email.accepts("a@b.co"));
        assert!(!FieldType::Email.accepts("a@b"));
        assert!(FieldType::Phone.accepts("+919876543210"));
        assert!(!FieldType::Number.accepts("forty"));
    }
}
