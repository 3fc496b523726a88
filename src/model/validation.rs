//! Field Validation
//!
//! Turns raw text tokens into typed record fields. The same rules apply to every
//! input path (interactive prompts, script lines, recovery-log replay), so a token
//! accepted once is accepted again when it is replayed.

use chrono::{Local, NaiveDate};
use thiserror::Error;

use super::types::{Coordinates, FormOfEducation, Person, Semester, StudyGroupDraft};

pub const BIRTHDAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be a number, got '{value}'")]
    NotANumber { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("'{0}' is not a date (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("birthday {0} lies in the future")]
    FutureDate(NaiveDate),

    #[error("unknown {field} '{value}', expected one of: {allowed}")]
    UnknownConstant {
        field: &'static str,
        value: String,
        allowed: String,
    },

    #[error("{field} must not contain commas or line breaks")]
    ForbiddenCharacter { field: &'static str },

    #[error("expected {expected} fields, got {found}")]
    InsufficientArguments { expected: usize, found: usize },
}

/// One input field of a record, in the order it is prompted and recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    X,
    Y,
    StudentsCount,
    FormOfEducation,
    Semester,
    AdminName,
    AdminBirthday,
    AdminHeight,
    AdminPassport,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Name,
        Field::X,
        Field::Y,
        Field::StudentsCount,
        Field::FormOfEducation,
        Field::Semester,
        Field::AdminName,
        Field::AdminBirthday,
        Field::AdminHeight,
        Field::AdminPassport,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Field::Name => "group name",
            Field::X => "coordinate x",
            Field::Y => "coordinate y",
            Field::StudentsCount => "students count",
            Field::FormOfEducation => "form of education",
            Field::Semester => "semester",
            Field::AdminName => "admin name",
            Field::AdminBirthday => "admin birthday",
            Field::AdminHeight => "admin height",
            Field::AdminPassport => "admin passport id",
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            Field::Y => "coordinate y (float, empty to skip)".to_string(),
            Field::FormOfEducation => format!(
                "form of education [{}]",
                FormOfEducation::ALL
                    .iter()
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Field::Semester => format!(
                "semester [{}]",
                Semester::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Field::AdminBirthday => "admin birthday (YYYY-MM-DD)".to_string(),
            Field::AdminHeight => "admin height (empty to skip)".to_string(),
            other => other.label().to_string(),
        }
    }

    /// Checks `raw` against this field's rule without building a draft.
    pub fn validate(&self, raw: &str) -> Result<(), ValidationError> {
        let label = self.label();
        match self {
            Field::Name | Field::AdminName | Field::AdminPassport => {
                parse_text(label, raw).map(|_| ())
            }
            Field::X => parse_int(label, raw).map(|_| ()),
            Field::Y => parse_optional_float(label, raw).map(|_| ()),
            Field::StudentsCount => parse_positive_int(label, raw).map(|_| ()),
            Field::FormOfEducation => raw.parse::<FormOfEducation>().map(|_| ()),
            Field::Semester => raw.parse::<Semester>().map(|_| ()),
            Field::AdminBirthday => parse_birthday(raw).map(|_| ()),
            Field::AdminHeight => parse_optional_positive_float(label, raw).map(|_| ()),
        }
    }
}

pub fn parse_text(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if value.contains([',', '\n', '\r']) {
        return Err(ValidationError::ForbiddenCharacter { field });
    }
    Ok(value.to_string())
}

pub fn parse_int(field: &'static str, raw: &str) -> Result<i32, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    value.parse().map_err(|_| ValidationError::NotANumber {
        field,
        value: value.to_string(),
    })
}

pub fn parse_positive_int(field: &'static str, raw: &str) -> Result<i64, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    let parsed: i64 = value.parse().map_err(|_| ValidationError::NotANumber {
        field,
        value: value.to_string(),
    })?;
    if parsed <= 0 {
        return Err(ValidationError::NotPositive { field });
    }
    Ok(parsed)
}

/// Parses a record identifier given as a command argument.
pub fn parse_id(raw: &str) -> Result<i32, ValidationError> {
    let id = parse_int("id", raw)?;
    if id <= 0 {
        return Err(ValidationError::NotPositive { field: "id" });
    }
    Ok(id)
}

pub fn parse_optional_float(field: &'static str, raw: &str) -> Result<Option<f64>, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| ValidationError::NotANumber {
            field,
            value: value.to_string(),
        })
}

pub fn parse_optional_positive_float(
    field: &'static str,
    raw: &str,
) -> Result<Option<f64>, ValidationError> {
    match parse_optional_float(field, raw)? {
        Some(v) if v <= 0.0 => Err(ValidationError::NotPositive { field }),
        other => Ok(other),
    }
}

pub fn parse_birthday(raw: &str) -> Result<NaiveDate, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty {
            field: Field::AdminBirthday.label(),
        });
    }
    let date = NaiveDate::parse_from_str(value, BIRTHDAY_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))?;
    if date > Local::now().date_naive() {
        return Err(ValidationError::FutureDate(date));
    }
    Ok(date)
}

/// Applies the field rules to a draft that arrived already typed (over the wire).
pub fn validate_draft(draft: &StudyGroupDraft) -> Result<(), ValidationError> {
    parse_text(Field::Name.label(), &draft.name)?;
    if let Some(y) = draft.coordinates.y {
        if !y.is_finite() {
            return Err(ValidationError::NotANumber {
                field: Field::Y.label(),
                value: y.to_string(),
            });
        }
    }
    if draft.students_count <= 0 {
        return Err(ValidationError::NotPositive {
            field: Field::StudentsCount.label(),
        });
    }
    validate_person(&draft.group_admin)
}

pub fn validate_person(person: &Person) -> Result<(), ValidationError> {
    parse_text(Field::AdminName.label(), &person.name)?;
    parse_text(Field::AdminPassport.label(), &person.passport_id)?;
    if person.birthday > Local::now().date_naive() {
        return Err(ValidationError::FutureDate(person.birthday));
    }
    match person.height {
        Some(h) if !h.is_finite() => Err(ValidationError::NotANumber {
            field: Field::AdminHeight.label(),
            value: h.to_string(),
        }),
        Some(h) if h <= 0.0 => Err(ValidationError::NotPositive {
            field: Field::AdminHeight.label(),
        }),
        _ => Ok(()),
    }
}

/// Builds a draft from exactly one token per [`Field`], in [`Field::ALL`] order.
pub fn draft_from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<StudyGroupDraft, ValidationError> {
    if tokens.len() != Field::ALL.len() {
        return Err(ValidationError::InsufficientArguments {
            expected: Field::ALL.len(),
            found: tokens.len(),
        });
    }
    let t = |i: usize| tokens[i].as_ref();

    Ok(StudyGroupDraft {
        name: parse_text(Field::Name.label(), t(0))?,
        coordinates: Coordinates {
            x: parse_int(Field::X.label(), t(1))?,
            y: parse_optional_float(Field::Y.label(), t(2))?,
        },
        students_count: parse_positive_int(Field::StudentsCount.label(), t(3))?,
        form_of_education: t(4).parse()?,
        semester: t(5).parse()?,
        group_admin: Person {
            name: parse_text(Field::AdminName.label(), t(6))?,
            birthday: parse_birthday(t(7))?,
            height: parse_optional_positive_float(Field::AdminHeight.label(), t(8))?,
            passport_id: parse_text(Field::AdminPassport.label(), t(9))?,
        },
    })
}

/// Renders a draft back into the token form accepted by [`draft_from_tokens`].
pub fn draft_to_tokens(draft: &StudyGroupDraft) -> Vec<String> {
    vec![
        draft.name.clone(),
        draft.coordinates.x.to_string(),
        draft.coordinates.y.map(|y| y.to_string()).unwrap_or_default(),
        draft.students_count.to_string(),
        draft.form_of_education.as_str().to_string(),
        draft.semester.as_str().to_string(),
        draft.group_admin.name.clone(),
        draft.group_admin.birthday.format(BIRTHDAY_FORMAT).to_string(),
        draft.group_admin.height.map(|h| h.to_string()).unwrap_or_default(),
        draft.group_admin.passport_id.clone(),
    ]
}

/// Builds an administrator from the four admin tokens (name, birthday, height, passport).
pub fn person_from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Person, ValidationError> {
    if tokens.len() != 4 {
        return Err(ValidationError::InsufficientArguments {
            expected: 4,
            found: tokens.len(),
        });
    }
    Ok(Person {
        name: parse_text(Field::AdminName.label(), tokens[0].as_ref())?,
        birthday: parse_birthday(tokens[1].as_ref())?,
        height: parse_optional_positive_float(Field::AdminHeight.label(), tokens[2].as_ref())?,
        passport_id: parse_text(Field::AdminPassport.label(), tokens[3].as_ref())?,
    })
}
