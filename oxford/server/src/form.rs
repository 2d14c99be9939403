//! Editable drafts of one record.
//!
//! A [`RecordForm`] holds the in-progress values of a fixed field list.
//! Validation is presence only: required text must be non-empty and required
//! checkboxes must be ticked. There are no cross-field or range checks.

use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};

use crate::remote::{Row, value_text};

/// Input widget and storage conversion of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    LongText,
    Email,
    Phone,
    Date,
    Time,
    Number,
    Checkbox,
    Choice(&'static [&'static str]),
}

impl FieldKind {
    /// Name of the HTML input type used to edit the field.
    pub fn input_type(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::LongText => "textarea",
            FieldKind::Email => "email",
            FieldKind::Phone => "tel",
            FieldKind::Date => "date",
            FieldKind::Time => "time",
            FieldKind::Number => "number",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Choice(_) => "select",
        }
    }

    /// Empty values of these kinds are stored as `null`.
    fn null_when_empty(&self) -> bool {
        matches!(self, FieldKind::Date | FieldKind::Time | FieldKind::Number)
    }
}

/// Static description of one form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    message: Option<&'static str>,
}

impl FieldSpec {
    pub const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
            message: None,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field required with a specific error message.
    pub const fn required_with(mut self, message: &'static str) -> Self {
        self.required = true;
        self.message = Some(message);
        self
    }

    pub fn required_message(&self) -> String {
        match self.message {
            Some(message) => message.to_string(),
            None => format!("{} is required", self.label),
        }
    }
}

/// Current value of a field in a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("This record is read-only")]
    ReadOnly,
    #[error("Unknown field '{0}'")]
    UnknownField(String),
    #[error("Field '{0}' does not accept this kind of value")]
    KindMismatch(&'static str),
}

/// Field name to message; empty means the draft is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    fn insert(&mut self, field: &'static str, message: String) {
        self.0.insert(field, message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordForm {
    fields: &'static [FieldSpec],
    draft: BTreeMap<&'static str, FieldValue>,
    read_only: bool,
}

impl RecordForm {
    pub fn blank(fields: &'static [FieldSpec]) -> Self {
        let draft = fields
            .iter()
            .map(|field| {
                let value = match field.kind {
                    FieldKind::Checkbox => FieldValue::Flag(false),
                    _ => FieldValue::Text(String::new()),
                };
                (field.name, value)
            })
            .collect();
        Self {
            fields,
            draft,
            read_only: false,
        }
    }

    /// Starts a draft from an existing row. Columns outside the field list
    /// are ignored; missing or null columns start empty.
    pub fn from_row(fields: &'static [FieldSpec], row: &Row) -> Self {
        let draft = fields
            .iter()
            .map(|field| {
                let stored = row.get(field.name);
                let value = match field.kind {
                    FieldKind::Checkbox => FieldValue::Flag(stored.is_some_and(is_truthy)),
                    _ => FieldValue::Text(stored.map(value_text).unwrap_or_default()),
                };
                (field.name, value)
            })
            .collect();
        Self {
            fields,
            draft,
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.draft.get(field)
    }

    /// Text of a field; empty for checkboxes and unknown fields.
    pub fn text(&self, field: &str) -> &str {
        match self.draft.get(field) {
            Some(FieldValue::Text(text)) => text,
            _ => "",
        }
    }

    pub fn flag(&self, field: &str) -> bool {
        matches!(self.draft.get(field), Some(FieldValue::Flag(true)))
    }

    pub fn set_text(&mut self, field: &str, value: impl Into<String>) -> Result<(), FormError> {
        let field_spec = self.editable(field)?;
        if field_spec.kind == FieldKind::Checkbox {
            return Err(FormError::KindMismatch(field_spec.name));
        }
        self.draft.insert(field_spec.name, FieldValue::Text(value.into()));
        Ok(())
    }

    pub fn set_flag(&mut self, field: &str, value: bool) -> Result<(), FormError> {
        let field_spec = self.editable(field)?;
        if field_spec.kind != FieldKind::Checkbox {
            return Err(FormError::KindMismatch(field_spec.name));
        }
        self.draft.insert(field_spec.name, FieldValue::Flag(value));
        Ok(())
    }

    /// Replaces the whole draft with a submitted HTML form.
    ///
    /// Browsers omit unticked checkboxes, so an absent checkbox is `false`.
    pub fn apply(&mut self, submitted: &HashMap<String, String>) -> Result<(), FormError> {
        if self.read_only {
            return Err(FormError::ReadOnly);
        }
        for field in self.fields {
            let value = match field.kind {
                FieldKind::Checkbox => FieldValue::Flag(
                    submitted
                        .get(field.name)
                        .is_some_and(|value| value != "false" && value != "off"),
                ),
                _ => FieldValue::Text(submitted.get(field.name).cloned().unwrap_or_default()),
            };
            self.draft.insert(field.name, value);
        }
        Ok(())
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::default();
        for field in self.fields.iter().filter(|field| field.required) {
            let present = match self.draft.get(field.name) {
                Some(FieldValue::Text(text)) => !text.is_empty(),
                Some(FieldValue::Flag(flag)) => *flag,
                None => false,
            };
            if !present {
                errors.insert(field.name, field.required_message());
            }
        }
        errors
    }

    /// The row written to storage: exactly the form's fields.
    pub fn payload(&self) -> Row {
        let mut row = Row::new();
        for field in self.fields {
            let value = match self.draft.get(field.name) {
                Some(FieldValue::Flag(flag)) => Value::Bool(*flag),
                Some(FieldValue::Text(text)) if text.is_empty() && field.kind.null_when_empty() => {
                    Value::Null
                }
                Some(FieldValue::Text(text)) if field.kind == FieldKind::Number => number(text),
                Some(FieldValue::Text(text)) => Value::String(text.clone()),
                None => Value::Null,
            };
            row.insert(field.name.to_string(), value);
        }
        row
    }

    fn editable(&self, field: &str) -> Result<&'static FieldSpec, FormError> {
        if self.read_only {
            return Err(FormError::ReadOnly);
        }
        self.fields
            .iter()
            .find(|field_spec| field_spec.name == field)
            .ok_or_else(|| FormError::UnknownField(field.to_string()))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => matches!(text.as_str(), "true" | "on" | "1"),
        _ => false,
    }
}

/// Numeric text becomes a JSON number; anything else is passed through.
fn number(text: &str) -> Value {
    let trimmed = text.trim();
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::from(integer);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text.to_string()))
}
