use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{ApplicationFields, FieldCheck, FieldName, StepDefinition, Validator};

/// Verdict of the validation gate guarding a forward transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GateResult {
    Passed,
    Blocked { errors: BTreeMap<FieldName, String> },
}

impl GateResult {
    pub fn is_passed(&self) -> bool {
        matches!(self, GateResult::Passed)
    }
}

/// Check every required field of `step`, collecting all failures so the
/// whole form can show its errors at once. Fields without an explicit rule
/// must be non-empty.
pub fn can_advance(step: &StepDefinition, fields: &ApplicationFields) -> GateResult {
    let errors: BTreeMap<FieldName, String> = step
        .required_fields
        .iter()
        .filter_map(|field| {
            let check = match step.validators.get(field) {
                Some(validator) => validator.check(fields.get(*field)),
                None => Validator::required_for(*field).check(fields.get(*field)),
            };
            match check {
                FieldCheck::Valid => None,
                FieldCheck::Invalid(message) => Some((*field, message)),
            }
        })
        .collect();

    if errors.is_empty() {
        GateResult::Passed
    } else {
        GateResult::Blocked { errors }
    }
}
