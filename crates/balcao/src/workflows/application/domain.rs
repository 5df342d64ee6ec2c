use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fields collected by the contractor intake form. Serialized names match the
/// data-service columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldName {
    #[serde(rename = "nome")]
    Name,
    #[serde(rename = "nicho")]
    Niche,
    #[serde(rename = "instagram")]
    Instagram,
    #[serde(rename = "whatsapp")]
    Whatsapp,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "faturamento")]
    Revenue,
    #[serde(rename = "como_ajudar")]
    HowToHelp,
    #[serde(rename = "por_que_escolher")]
    WhyChoose,
}

impl FieldName {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::Name,
            Self::Niche,
            Self::Instagram,
            Self::Whatsapp,
            Self::Email,
            Self::Revenue,
            Self::HowToHelp,
            Self::WhyChoose,
        ]
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Name => "nome",
            Self::Niche => "nicho",
            Self::Instagram => "instagram",
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
            Self::Revenue => "faturamento",
            Self::HowToHelp => "como_ajudar",
            Self::WhyChoose => "por_que_escolher",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "Full name",
            Self::Niche => "Niche",
            Self::Instagram => "Instagram",
            Self::Whatsapp => "WhatsApp",
            Self::Email => "Email",
            Self::Revenue => "Monthly revenue",
            Self::HowToHelp => "How can we help",
            Self::WhyChoose => "Why choose this project",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ordered().into_iter().find(|field| field.key() == key)
    }
}

/// Every intake field, always present and empty until edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFields {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "nicho")]
    pub niche: String,
    pub instagram: String,
    pub whatsapp: String,
    pub email: String,
    #[serde(rename = "faturamento")]
    pub revenue: String,
    #[serde(rename = "como_ajudar")]
    pub how_to_help: String,
    #[serde(rename = "por_que_escolher")]
    pub why_choose: String,
}

impl ApplicationFields {
    pub fn get(&self, field: FieldName) -> &str {
        match field {
            FieldName::Name => &self.name,
            FieldName::Niche => &self.niche,
            FieldName::Instagram => &self.instagram,
            FieldName::Whatsapp => &self.whatsapp,
            FieldName::Email => &self.email,
            FieldName::Revenue => &self.revenue,
            FieldName::HowToHelp => &self.how_to_help,
            FieldName::WhyChoose => &self.why_choose,
        }
    }

    pub fn set(&mut self, field: FieldName, value: impl Into<String>) {
        let slot = match field {
            FieldName::Name => &mut self.name,
            FieldName::Niche => &mut self.niche,
            FieldName::Instagram => &mut self.instagram,
            FieldName::Whatsapp => &mut self.whatsapp,
            FieldName::Email => &mut self.email,
            FieldName::Revenue => &mut self.revenue,
            FieldName::HowToHelp => &mut self.how_to_help,
            FieldName::WhyChoose => &mut self.why_choose,
        };
        *slot = value.into();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Record handed to the data service on final submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub user_id: String,
    #[serde(flatten)]
    pub fields: ApplicationFields,
}

/// Outcome of checking one field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldCheck {
    Valid,
    Invalid(String),
}

/// Rule applied to a required field when a step is gated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Validator {
    Required { message: String },
    MinChars { min: usize, message: String },
    Email { message: String },
}

impl Validator {
    pub fn required_for(field: FieldName) -> Self {
        Self::Required {
            message: format!("{} is required", field.label()),
        }
    }

    pub fn min_chars(min: usize, message: impl Into<String>) -> Self {
        Self::MinChars {
            min,
            message: message.into(),
        }
    }

    pub fn email(message: impl Into<String>) -> Self {
        Self::Email {
            message: message.into(),
        }
    }

    pub fn check(&self, value: &str) -> FieldCheck {
        let value = value.trim();
        let (valid, message) = match self {
            Validator::Required { message } => (!value.is_empty(), message),
            Validator::MinChars { min, message } => (value.chars().count() >= *min, message),
            Validator::Email { message } => (looks_like_email(value), message),
        };
        if valid {
            FieldCheck::Valid
        } else {
            FieldCheck::Invalid(message.clone())
        }
    }
}

fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| !label.is_empty())
}

/// One page of the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDefinition {
    pub label: String,
    pub required_fields: Vec<FieldName>,
    pub validators: BTreeMap<FieldName, Validator>,
}

impl StepDefinition {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            required_fields: Vec::new(),
            validators: BTreeMap::new(),
        }
    }

    /// Require a field using the default non-empty rule.
    pub fn require(mut self, field: FieldName) -> Self {
        if !self.required_fields.contains(&field) {
            self.required_fields.push(field);
        }
        self
    }

    /// Require a field with an explicit rule.
    pub fn require_with(mut self, field: FieldName, validator: Validator) -> Self {
        self = self.require(field);
        self.validators.insert(field, validator);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlueprintError {
    #[error("a wizard needs at least one step")]
    NoSteps,
}

/// Ordered steps of a wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WizardBlueprint {
    steps: Vec<StepDefinition>,
}

impl WizardBlueprint {
    pub fn new(steps: Vec<StepDefinition>) -> Result<Self, BlueprintError> {
        if steps.is_empty() {
            return Err(BlueprintError::NoSteps);
        }
        Ok(Self { steps })
    }

    /// Contractor intake: basic info, contact, business, project details.
    pub fn standard() -> Self {
        Self {
            steps: vec![
                StepDefinition::new("Basic information")
                    .require_with(
                        FieldName::Name,
                        Validator::min_chars(2, "Name must have at least 2 characters"),
                    )
                    .require_with(
                        FieldName::Niche,
                        Validator::Required {
                            message: "Select a niche".to_string(),
                        },
                    ),
                StepDefinition::new("Contact")
                    .require(FieldName::Instagram)
                    .require(FieldName::Whatsapp)
                    .require_with(FieldName::Email, Validator::email("Invalid email")),
                StepDefinition::new("Business").require(FieldName::Revenue),
                StepDefinition::new("Project details")
                    .require_with(
                        FieldName::HowToHelp,
                        Validator::min_chars(
                            10,
                            "Describe how we can help (at least 10 characters)",
                        ),
                    )
                    .require_with(
                        FieldName::WhyChoose,
                        Validator::min_chars(
                            10,
                            "Explain why this project stands out (at least 10 characters)",
                        ),
                    ),
            ],
        }
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn last_index(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn labels(&self) -> Vec<String> {
        self.steps.iter().map(|step| step.label.clone()).collect()
    }
}
