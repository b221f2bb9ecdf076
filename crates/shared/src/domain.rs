use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::protocol::{ValidationIssue, ValidationReport};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(SessionId);
id_newtype!(ClientId);
id_newtype!(BranchId);
id_newtype!(ItemId);

/// A unit of remote workflow state. Every stage owns at most one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Order,
    ClientSearch,
    ClientCreation,
    BranchSelection,
    BasicOrderInfo,
    ItemManager,
    ItemBasicInfo,
    ItemCharacteristics,
    ItemDefects,
    ItemPricing,
    ItemPhotos,
    OrderParameters,
    OrderConfirmation,
}

impl Stage {
    pub const ALL: [Stage; 13] = [
        Stage::Order,
        Stage::ClientSearch,
        Stage::ClientCreation,
        Stage::BranchSelection,
        Stage::BasicOrderInfo,
        Stage::ItemManager,
        Stage::ItemBasicInfo,
        Stage::ItemCharacteristics,
        Stage::ItemDefects,
        Stage::ItemPricing,
        Stage::ItemPhotos,
        Stage::OrderParameters,
        Stage::OrderConfirmation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Order => "order",
            Stage::ClientSearch => "client_search",
            Stage::ClientCreation => "client_creation",
            Stage::BranchSelection => "branch_selection",
            Stage::BasicOrderInfo => "basic_order_info",
            Stage::ItemManager => "item_manager",
            Stage::ItemBasicInfo => "item_basic_info",
            Stage::ItemCharacteristics => "item_characteristics",
            Stage::ItemDefects => "item_defects",
            Stage::ItemPricing => "item_pricing",
            Stage::ItemPhotos => "item_photos",
            Stage::OrderParameters => "order_parameters",
            Stage::OrderConfirmation => "order_confirmation",
        }
    }

    /// Stage whose session seeds this one, if any.
    pub fn parent(self) -> Option<Stage> {
        match self {
            Stage::ItemBasicInfo
            | Stage::ItemCharacteristics
            | Stage::ItemDefects
            | Stage::ItemPricing
            | Stage::ItemPhotos => Some(Stage::ItemManager),
            _ => None,
        }
    }

    pub fn is_item_substage(self) -> bool {
        self.parent() == Some(Stage::ItemManager)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level wizard steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    ClientSelection,
    BranchSelection,
    ItemManagement,
    OrderParameters,
    OrderConfirmation,
}

impl WizardStep {
    pub const ORDER: [WizardStep; 5] = [
        WizardStep::ClientSelection,
        WizardStep::BranchSelection,
        WizardStep::ItemManagement,
        WizardStep::OrderParameters,
        WizardStep::OrderConfirmation,
    ];
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WizardStep::ClientSelection => "client_selection",
            WizardStep::BranchSelection => "branch_selection",
            WizardStep::ItemManagement => "item_management",
            WizardStep::OrderParameters => "order_parameters",
            WizardStep::OrderConfirmation => "order_confirmation",
        };
        f.write_str(label)
    }
}

/// Item characterization sub-steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSubstep {
    BasicInfo,
    Characteristics,
    DefectsStains,
    PriceCalculation,
    PhotoDocumentation,
}

impl ItemSubstep {
    pub const ORDER: [ItemSubstep; 5] = [
        ItemSubstep::BasicInfo,
        ItemSubstep::Characteristics,
        ItemSubstep::DefectsStains,
        ItemSubstep::PriceCalculation,
        ItemSubstep::PhotoDocumentation,
    ];

    pub fn stage(self) -> Stage {
        match self {
            ItemSubstep::BasicInfo => Stage::ItemBasicInfo,
            ItemSubstep::Characteristics => Stage::ItemCharacteristics,
            ItemSubstep::DefectsStains => Stage::ItemDefects,
            ItemSubstep::PriceCalculation => Stage::ItemPricing,
            ItemSubstep::PhotoDocumentation => Stage::ItemPhotos,
        }
    }
}

impl fmt::Display for ItemSubstep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.stage(), f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommunicationChannel {
    Phone,
    Sms,
    Viber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub client_id: ClientId,
    pub full_name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicOrderInfo {
    pub receipt_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_tag: Option<String>,
}

impl BasicOrderInfo {
    pub fn is_complete(&self) -> bool {
        !self.receipt_number.trim().is_empty()
    }
}

/// Client creation form as submitted to the `client_creation` stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClient {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub communication_channels: Vec<CommunicationChannel>,
    pub source: crate::acquisition::AcquisitionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_details: Option<String>,
}

impl NewClient {
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();
        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("phone", &self.phone),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationIssue::for_field(field, format!("{field} is required")));
            }
        }
        if let Some(email) = self.email.as_deref().filter(|email| !email.is_empty()) {
            if !looks_like_email(email) {
                errors.push(ValidationIssue::for_field("email", "email is malformed"));
            }
        }

        if errors.is_empty() {
            ValidationReport::ok()
        } else {
            ValidationReport::invalid(errors)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    #[default]
    Standard,
    #[serde(rename = "URGENT_48H")]
    Urgent48h,
    #[serde(rename = "URGENT_24H")]
    Urgent24h,
}

impl Urgency {
    pub fn surcharge_percent(self) -> u8 {
        match self {
            Urgency::Standard => 0,
            Urgency::Urgent48h => 50,
            Urgency::Urgent24h => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    #[default]
    None,
    Evercard,
    SocialMedia,
    Military,
    Custom,
}

impl DiscountType {
    pub fn default_percent(self) -> u8 {
        match self {
            DiscountType::Evercard | DiscountType::Military => 10,
            DiscountType::SocialMedia => 5,
            DiscountType::None | DiscountType::Custom => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Terminal,
    Cash,
    BankTransfer,
}

pub const MAX_NOTES_CHARS: usize = 1000;

/// Execution, discount and payment settings of the whole order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_completion_date: Option<NaiveDate>,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_discount_percent: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl OrderParameters {
    pub fn effective_discount_percent(&self) -> u8 {
        match self.discount_type {
            DiscountType::Custom => self.custom_discount_percent.unwrap_or(0),
            other => other.default_percent(),
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();
        if self.expected_completion_date.is_none() {
            errors.push(ValidationIssue::for_field(
                "expected_completion_date",
                "expected completion date is required",
            ));
        }
        if self.discount_type == DiscountType::Custom {
            match self.custom_discount_percent {
                None => errors.push(ValidationIssue::for_field(
                    "custom_discount_percent",
                    "custom discount needs a percentage",
                )),
                Some(percent) if percent > 100 => errors.push(ValidationIssue::for_field(
                    "custom_discount_percent",
                    "discount cannot exceed 100%",
                )),
                Some(_) => {}
            }
        }
        if self.payment_method.is_none() {
            errors.push(ValidationIssue::for_field(
                "payment_method",
                "payment method is required",
            ));
        }
        if self
            .notes
            .as_deref()
            .is_some_and(|notes| notes.chars().count() > MAX_NOTES_CHARS)
        {
            errors.push(ValidationIssue::for_field(
                "notes",
                format!("notes cannot exceed {MAX_NOTES_CHARS} characters"),
            ));
        }

        if errors.is_empty() {
            ValidationReport::ok()
        } else {
            ValidationReport::invalid(errors)
        }
    }
}

/// Final review of the order: summary checked, terms accepted, client signed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub summary_reviewed: bool,
    pub terms_accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl OrderConfirmation {
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();
        if !self.summary_reviewed {
            errors.push(ValidationIssue::for_field(
                "summary_reviewed",
                "review the order summary",
            ));
        }
        if !self.terms_accepted {
            errors.push(ValidationIssue::for_field(
                "terms_accepted",
                "the client must accept the terms",
            ));
        }
        if self.signature.as_deref().map_or(true, |s| s.trim().is_empty()) {
            errors.push(ValidationIssue::for_field("signature", "the client must sign"));
        }

        if errors.is_empty() {
            ValidationReport::ok()
        } else {
            ValidationReport::invalid(errors)
        }
    }
}

fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}
