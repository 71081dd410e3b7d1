//! Fixtures shared by the service tests.

use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use crate::entity::prelude::*;
use crate::ids::InstituteId;
use crate::models::migrator::Migrator;
use crate::service::{
    faculty::{self, NewFaculty},
    institutes::{self, NewInstitute},
    students::{self, NewStudent},
    users::{self, NewUser},
};

pub const TEST_PASSWORD: &str = "secret123";

/// Fresh in-memory database with every migration applied.
pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

pub fn new_institute(email: &str) -> NewInstitute {
    NewInstitute {
        name: "RV College of Engineering".to_string(),
        kind: InstituteKind::Private,
        official_email: email.to_string(),
        official_phone: "08067178000".to_string(),
        address_line1: "Mysuru Road".to_string(),
        address_line2: None,
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        pincode: "560059".to_string(),
        is_affiliated: false,
        affiliation_university: None,
        affiliation_id: None,
        institute_code: None,
        established_year: Some(1963),
        accreditation_status: None,
        website: None,
        logo: None,
    }
}

pub async fn create_test_user(db: &DatabaseConnection, name: &str, role: Role) -> UserModel {
    let email = format!(
        "{}.{}@example.com",
        name.to_lowercase().replace(' ', "."),
        crate::ids::UserId::new()
    );
    users::insert_user(
        db,
        NewUser {
            name: name.to_string(),
            email,
            password: TEST_PASSWORD.to_string(),
            role,
            gender: None,
            phone: None,
        },
    )
    .await
    .expect("Failed to create user")
}

pub async fn create_test_institute(db: &DatabaseConnection) -> InstituteModel {
    let email = format!("office.{}@campus.edu", InstituteId::new());
    institutes::insert_institute(db, new_institute(&email))
        .await
        .expect("Failed to create institute")
}

pub fn new_student(roll_number: &str) -> NewStudent {
    NewStudent {
        name: format!("Student {roll_number}"),
        email: format!("{}@students.campus.edu", roll_number.to_lowercase()),
        password: TEST_PASSWORD.to_string(),
        gender: None,
        phone: None,
        roll_number: roll_number.to_string(),
        program_id: None,
        year: Some(2),
        semester: Some(3),
        section: Some("A".to_string()),
    }
}

pub fn new_faculty(employee_code: &str) -> NewFaculty {
    NewFaculty {
        name: format!("Faculty {employee_code}"),
        email: format!("{}@staff.campus.edu", employee_code.to_lowercase()),
        password: TEST_PASSWORD.to_string(),
        gender: None,
        phone: None,
        employee_code: employee_code.to_string(),
        department: "Computer Science".to_string(),
        designation: "Assistant Professor".to_string(),
        subject_area: None,
    }
}

pub async fn create_test_student(
    db: &DatabaseConnection,
    institute_id: InstituteId,
    roll_number: &str,
) -> StudentModel {
    students::StudentsService::new(db.clone())
        .create_student(institute_id, new_student(roll_number))
        .await
        .expect("Failed to create student")
        .student
}

pub async fn create_test_faculty(
    db: &DatabaseConnection,
    institute_id: InstituteId,
    employee_code: &str,
) -> FacultyModel {
    faculty::FacultyService::new(db.clone())
        .create_faculty(institute_id, new_faculty(employee_code))
        .await
        .expect("Failed to create faculty")
        .faculty
}
