//! Issued ID cards and their status lifecycle.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::template::{CardSide, FieldType, Template};

/// Card status.
///
/// `draft -> approved -> printed -> issued`, `approved -> draft` to send a
/// card back, and every status except `revoked` may move to `revoked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    #[default]
    Draft,
    Approved,
    Printed,
    Issued,
    Revoked,
}

impl CardStatus {
    pub const ALL: [CardStatus; 5] = [
        CardStatus::Draft,
        CardStatus::Approved,
        CardStatus::Printed,
        CardStatus::Issued,
        CardStatus::Revoked,
    ];

    pub fn can_transition_to(&self, target: CardStatus) -> bool {
        use CardStatus::*;

        match (self, target) {
            (Draft, Approved) => true,
            (Approved, Draft) => true,
            (Approved, Printed) => true,
            (Printed, Issued) => true,
            (Revoked, _) => false,
            (_, Revoked) => true,
            _ => false,
        }
    }

    /// Transitions that only admins and above may perform.
    pub fn requires_admin(&self, target: CardStatus) -> bool {
        matches!(target, CardStatus::Approved | CardStatus::Revoked)
            || (*self == CardStatus::Approved && target == CardStatus::Draft)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CardStatus::Revoked)
    }

    /// Only drafts may have their content edited.
    pub fn is_editable(&self) -> bool {
        matches!(self, CardStatus::Draft)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Printed => "printed",
            Self::Issued => "issued",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "approved" => Ok(Self::Approved),
            "printed" => Ok(Self::Printed),
            "issued" => Ok(Self::Issued),
            "revoked" => Ok(Self::Revoked),
            other => Err(format!("unknown card status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdCard {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub template_id: Uuid,
    pub card_number: String,
    pub holder_name: String,
    pub photo_url: Option<String>,
    pub data: BTreeMap<String, String>,
    pub issue_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub status: CardStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdCard {
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < today)
    }

    /// Lay the card's data out on the template's front and back.
    pub fn render(&self, template: &Template) -> RenderedCard {
        let side = |side: CardSide| {
            template
                .fields_for(side)
                .map(|field| RenderedField {
                    key: field.key.clone(),
                    label: field.label.clone(),
                    field_type: field.field_type,
                    value: self.data.get(&field.key).cloned(),
                })
                .collect()
        };

        RenderedCard {
            card_number: self.card_number.clone(),
            holder_name: self.holder_name.clone(),
            photo_url: self.photo_url.clone(),
            orientation: template.orientation.as_str().to_string(),
            front_background_url: template.front_background_url.clone(),
            back_background_url: template.back_background_url.clone(),
            front: side(CardSide::Front),
            back: side(CardSide::Back),
        }
    }
}

/// Format a card number as `{CODE}-{YEAR}-{serial:06}`.
pub fn format_card_number(org_code: &str, issue_date: NaiveDate, serial: i64) -> String {
    format!("{}-{}-{:06}", org_code, issue_date.year(), serial)
}

/// A card as response payload, with the derived expiry flag.
#[derive(Debug, Clone, Serialize)]
pub struct IdCardView {
    #[serde(flatten)]
    pub card: IdCard,
    pub is_expired: bool,
}

impl IdCardView {
    pub fn new(card: IdCard, today: NaiveDate) -> Self {
        let is_expired = card.is_expired_on(today);
        Self { card, is_expired }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RenderedField {
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RenderedCard {
    pub card_number: String,
    pub holder_name: String,
    pub photo_url: Option<String>,
    pub orientation: String,
    pub front_background_url: Option<String>,
    pub back_background_url: Option<String>,
    pub front: Vec<RenderedField>,
    pub back: Vec<RenderedField>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_create_dates", skip_on_field_errors = false))]
pub struct CreateIdCardRequest {
    pub template_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Holder name must be between 1 and 255 characters"))]
    pub holder_name: String,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    /// Defaults to today
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateIdCardRequest {
    #[validate(length(min = 1, max = 255, message = "Holder name must be between 1 and 255 characters"))]
    pub holder_name: Option<String>,
    pub photo_url: Option<String>,
    pub data: Option<BTreeMap<String, String>>,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCardStatusRequest {
    pub status: CardStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdCardFilter {
    pub search: Option<String>,
    pub status: Option<CardStatus>,
    pub template_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
}

/// Card counts per status.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CardStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
}

impl CardStats {
    pub fn from_counts(counts: impl IntoIterator<Item = (CardStatus, i64)>) -> Self {
        let mut by_status: BTreeMap<String, i64> = CardStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut total = 0;
        for (status, count) in counts {
            *by_status.entry(status.as_str().to_string()).or_default() += count;
            total += count;
        }
        Self { total, by_status }
    }
}

pub fn check_date_order(
    issue_date: NaiveDate,
    expiry_date: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    match expiry_date {
        Some(expiry) if expiry <= issue_date => {
            let mut error = ValidationError::new("expiry_date");
            error.message = Some("Expiry date must be after the issue date".into());
            Err(error)
        }
        _ => Ok(()),
    }
}

fn validate_create_dates(request: &CreateIdCardRequest) -> Result<(), ValidationError> {
    match request.issue_date {
        Some(issue) => check_date_order(issue, request.expiry_date),
        None => check_date_order(Utc::now().date_naive(), request.expiry_date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Orientation, TemplateField};

    #[test]
    fn test_card_transitions() {
        use CardStatus::*;

        assert!(Draft.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Printed));
        assert!(Printed.can_transition_to(Issued));
        assert!(Approved.can_transition_to(Draft));
        assert!(Issued.can_transition_to(Revoked));
        assert!(Draft.can_transition_to(Revoked));

        assert!(!Draft.can_transition_to(Issued));
        assert!(!Issued.can_transition_to(Draft));
        assert!(!Printed.can_transition_to(Approved));
        for target in CardStatus::ALL {
            assert!(!Revoked.can_transition_to(target));
        }
    }

    #[test]
    fn test_admin_only_transitions() {
        use CardStatus::*;

        assert!(Draft.requires_admin(Approved));
        assert!(Printed.requires_admin(Revoked));
        assert!(Approved.requires_admin(Draft));
        assert!(!Approved.requires_admin(Printed));
        assert!(!Printed.requires_admin(Issued));
    }

    #[test]
    fn test_card_number_format() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(format_card_number("GVPS", date, 42), "GVPS-2024-000042");
    }

    #[test]
    fn test_expiry_order() {
        let issue = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(check_date_order(issue, None).is_ok());
        assert!(check_date_order(issue, NaiveDate::from_ymd_opt(2025, 1, 1)).is_ok());
        assert!(check_date_order(issue, Some(issue)).is_err());
    }

    #[test]
    fn test_create_request_rejects_inverted_dates() {
        let request = CreateIdCardRequest {
            template_id: Uuid::new_v4(),
            holder_name: "Meera".to_string(),
            photo_url: None,
            data: BTreeMap::new(),
            issue_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            expiry_date: NaiveDate::from_ymd_opt(2024, 4, 1),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_stats_include_every_status() {
        let stats = CardStats::from_counts(vec![(CardStatus::Draft, 3), (CardStatus::Issued, 2)]);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.by_status.len(), CardStatus::ALL.len());
        assert_eq!(stats.by_status["revoked"], 0);
        assert_eq!(stats.by_status["draft"], 3);
    }

    #[test]
    fn test_render_places_fields_by_side() {
        let template = Template {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Employee".to_string(),
            description: None,
            orientation: Orientation::Landscape,
            front_background_url: Some("/uploads/front.png".to_string()),
            back_background_url: None,
            fields: vec![
                TemplateField {
                    key: "employee_id".to_string(),
                    label: "Employee ID".to_string(),
                    field_type: FieldType::Text,
                    side: CardSide::Front,
                    position: 0,
                    required: true,
                },
                TemplateField {
                    key: "emergency_contact".to_string(),
                    label: "Emergency Contact".to_string(),
                    field_type: FieldType::Phone,
                    side: CardSide::Back,
                    position: 0,
                    required: false,
                },
            ],
            is_active: true,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mut data = BTreeMap::new();
        data.insert("employee_id".to_string(), "E-104".to_string());
        let card = IdCard {
            id: Uuid::new_v4(),
            organization_id: template.organization_id,
            template_id: template.id,
            card_number: "ACME-2024-000001".to_string(),
            holder_name: "Kiran".to_string(),
            photo_url: None,
            data,
            issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            status: CardStatus::Draft,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let rendered = card.render(&template);
        assert_eq!(rendered.orientation, "landscape");
        assert_eq!(rendered.front.len(), 1);
        assert_eq!(rendered.front[0].value.as_deref(), Some("E-104"));
        assert_eq!(rendered.back[0].label, "Emergency Contact");
        assert_eq!(rendered.back[0].value, None);

        assert!(card.is_expired_on(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()));
        assert!(!card.is_expired_on(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
    }
}
