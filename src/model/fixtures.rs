//! Shared record builders for unit tests across the crate.

use chrono::NaiveDate;

use super::types::{Coordinates, FormOfEducation, Person, Semester, StudyGroup, StudyGroupDraft};

pub fn admin(name: &str, passport: &str) -> Person {
    Person {
        name: name.to_string(),
        birthday: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
        height: Some(180.0),
        passport_id: passport.to_string(),
    }
}

pub fn draft(name: &str) -> StudyGroupDraft {
    StudyGroupDraft {
        name: name.to_string(),
        coordinates: Coordinates { x: 10, y: Some(2.5) },
        students_count: 25,
        form_of_education: FormOfEducation::FullTimeEducation,
        semester: Semester::Second,
        group_admin: admin("Bob", "P-1"),
    }
}

pub fn group(id: i32, owner: &str) -> StudyGroup {
    StudyGroup::from_draft(id, draft(&format!("group-{}", id)), owner)
}
