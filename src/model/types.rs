use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::validation::ValidationError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub x: i32,
    pub y: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormOfEducation {
    DistanceEducation,
    FullTimeEducation,
    EveningClasses,
}

impl FormOfEducation {
    pub const ALL: [FormOfEducation; 3] = [
        FormOfEducation::DistanceEducation,
        FormOfEducation::FullTimeEducation,
        FormOfEducation::EveningClasses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormOfEducation::DistanceEducation => "DISTANCE_EDUCATION",
            FormOfEducation::FullTimeEducation => "FULL_TIME_EDUCATION",
            FormOfEducation::EveningClasses => "EVENING_CLASSES",
        }
    }
}

impl FromStr for FormOfEducation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|form| form.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownConstant {
                field: "form of education",
                value: s.to_string(),
                allowed: Self::ALL.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", "),
            })
    }
}

impl fmt::Display for FormOfEducation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Semester {
    First,
    Second,
    Fourth,
    Sixth,
    Seventh,
}

impl Semester {
    pub const ALL: [Semester; 5] = [
        Semester::First,
        Semester::Second,
        Semester::Fourth,
        Semester::Sixth,
        Semester::Seventh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Semester::First => "FIRST",
            Semester::Second => "SECOND",
            Semester::Fourth => "FOURTH",
            Semester::Sixth => "SIXTH",
            Semester::Seventh => "SEVENTH",
        }
    }
}

impl FromStr for Semester {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|semester| semester.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownConstant {
                field: "semester",
                value: s.to_string(),
                allowed: Self::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "),
            })
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The administrator embedded in every group.
///
/// Two records are administered by the same person when the whole value matches;
/// `passport_id` alone must never be shared by two different people.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub name: String,
    pub birthday: NaiveDate,
    pub height: Option<f64>,
    pub passport_id: String,
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (born {}", self.name, self.birthday)?;
        if let Some(height) = self.height {
            write!(f, ", height {}", height)?;
        }
        write!(f, ", passport {})", self.passport_id)
    }
}

/// Everything a client submits for Add/Update: the record minus the server-stamped fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudyGroupDraft {
    pub name: String,
    pub coordinates: Coordinates,
    pub students_count: i64,
    pub form_of_education: FormOfEducation,
    pub semester: Semester,
    pub group_admin: Person,
}

/// The managed record.
///
/// `id`, `owner` and `creation_date` are set once by the server and survive updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudyGroup {
    pub id: i32,
    pub name: String,
    pub coordinates: Coordinates,
    pub creation_date: DateTime<Utc>,
    pub students_count: i64,
    pub form_of_education: FormOfEducation,
    pub semester: Semester,
    pub group_admin: Person,
    pub owner: String,
}

impl StudyGroup {
    pub fn from_draft(id: i32, draft: StudyGroupDraft, owner: &str) -> Self {
        Self::from_draft_at(id, draft, owner, Utc::now())
    }

    pub fn from_draft_at(
        id: i32,
        draft: StudyGroupDraft,
        owner: &str,
        creation_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: draft.name,
            coordinates: draft.coordinates,
            creation_date,
            students_count: draft.students_count,
            form_of_education: draft.form_of_education,
            semester: draft.semester,
            group_admin: draft.group_admin,
            owner: owner.to_string(),
        }
    }

    /// Builds the replacement for an update: descriptive fields come from `draft`,
    /// identity fields stay.
    pub fn with_draft(&self, draft: StudyGroupDraft) -> Self {
        Self::from_draft_at(self.id, draft, &self.owner, self.creation_date)
    }

    /// Natural ordering: identifier against identifier.
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }

    pub fn is_owned_by(&self, username: &str) -> bool {
        self.owner == username
    }
}

impl fmt::Display for StudyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} at ({}, {}) created {} | students: {} | {} | semester {} | admin: {} | owner: {}",
            self.id,
            self.name,
            self.coordinates.x,
            self.coordinates
                .y
                .map(|y| y.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.creation_date.format("%Y-%m-%d %H:%M:%S"),
            self.students_count,
            self.form_of_education,
            self.semester,
            self.group_admin,
            self.owner
        )
    }
}
