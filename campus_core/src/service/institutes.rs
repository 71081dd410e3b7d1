use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{
    entity::prelude::*,
    ids::InstituteId,
    service::validate::{self, Invalid},
};

#[derive(Debug, Error)]
pub enum InstitutesServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("institute not found")]
    InstituteNotFound,

    #[error("official email already registered")]
    EmailTaken,

    #[error("not an admin of this institute")]
    Forbidden,

    #[error(transparent)]
    Invalid(#[from] Invalid),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInstitute {
    pub name: String,
    pub kind: InstituteKind,
    pub official_email: String,
    pub official_phone: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(default)]
    pub is_affiliated: bool,
    #[serde(default)]
    pub affiliation_university: Option<String>,
    #[serde(default)]
    pub affiliation_id: Option<String>,
    #[serde(default)]
    pub institute_code: Option<String>,
    #[serde(default)]
    pub established_year: Option<i32>,
    #[serde(default)]
    pub accreditation_status: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstituteUpdate {
    pub name: Option<String>,
    pub kind: Option<InstituteKind>,
    pub official_phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub is_affiliated: Option<bool>,
    pub affiliation_university: Option<String>,
    pub affiliation_id: Option<String>,
    pub institute_code: Option<String>,
    pub established_year: Option<i32>,
    pub accreditation_status: Option<String>,
    pub website: Option<String>,
    pub logo: Option<String>,
}

fn check_affiliation(
    is_affiliated: bool,
    university: &Option<String>,
    affiliation_id: &Option<String>,
) -> Result<(), Invalid> {
    if is_affiliated && (university.is_none() || affiliation_id.is_none()) {
        return Err(Invalid::new(
            "affiliation_university and affiliation_id are required for affiliated institutes",
        ));
    }
    Ok(())
}

pub async fn insert_institute<C: ConnectionTrait>(
    conn: &C,
    new: NewInstitute,
) -> Result<InstituteModel, InstitutesServiceError> {
    let official_email = validate::email(&new.official_email)?;
    let affiliation_university = validate::optional(new.affiliation_university);
    let affiliation_id = validate::optional(new.affiliation_id);
    check_affiliation(new.is_affiliated, &affiliation_university, &affiliation_id)?;

    let taken = Institute::find()
        .filter(InstituteColumn::OfficialEmail.eq(official_email.as_str()))
        .one(conn)
        .await?
        .is_some();
    if taken {
        return Err(InstitutesServiceError::EmailTaken);
    }

    let now = Utc::now();
    let institute = InstituteActiveModel {
        id: Set(InstituteId::new()),
        name: Set(validate::required("name", &new.name)?),
        kind: Set(new.kind),
        official_email: Set(official_email),
        official_phone: Set(validate::required("official_phone", &new.official_phone)?),
        address_line1: Set(validate::required("address_line1", &new.address_line1)?),
        address_line2: Set(validate::optional(new.address_line2)),
        city: Set(validate::required("city", &new.city)?),
        state: Set(validate::required("state", &new.state)?),
        pincode: Set(validate::pincode(&new.pincode)?),
        is_affiliated: Set(new.is_affiliated),
        affiliation_university: Set(affiliation_university),
        affiliation_id: Set(affiliation_id),
        institute_code: Set(validate::optional(new.institute_code)),
        established_year: Set(new.established_year),
        accreditation_status: Set(validate::optional(new.accreditation_status)),
        website: Set(validate::optional(new.website)),
        logo: Set(validate::optional(new.logo)),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let institute = Institute::insert(institute).exec_with_returning(conn).await?;
    info!(institute_id = %institute.id, "institute created");
    Ok(institute)
}

#[derive(Clone)]
pub struct InstitutesService {
    db: DatabaseConnection,
}

impl InstitutesService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_institute(
        &self,
        new: NewInstitute,
    ) -> Result<InstituteModel, InstitutesServiceError> {
        insert_institute(&self.db, new).await
    }

    pub async fn get_institute(
        &self,
        institute_id: InstituteId,
    ) -> Result<InstituteModel, InstitutesServiceError> {
        Institute::find_by_id(institute_id)
            .one(&self.db)
            .await?
            .ok_or(InstitutesServiceError::InstituteNotFound)
    }

    pub async fn list_institutes(&self) -> Result<Vec<InstituteModel>, InstitutesServiceError> {
        Ok(Institute::find()
            .order_by_asc(InstituteColumn::Name)
            .all(&self.db)
            .await?)
    }

    /// Applies a partial update. Only an admin of the institute may call this.
    pub async fn update_institute(
        &self,
        institute_id: InstituteId,
        acting_institute: Option<InstituteId>,
        update: InstituteUpdate,
    ) -> Result<InstituteModel, InstitutesServiceError> {
        let institute = self.get_institute(institute_id).await?;
        if acting_institute != Some(institute.id) {
            return Err(InstitutesServiceError::Forbidden);
        }

        let is_affiliated = update.is_affiliated.unwrap_or(institute.is_affiliated);
        let university = match update.affiliation_university {
            Some(v) => validate::optional(Some(v)),
            None => institute.affiliation_university.clone(),
        };
        let affiliation_id = match update.affiliation_id {
            Some(v) => validate::optional(Some(v)),
            None => institute.affiliation_id.clone(),
        };
        check_affiliation(is_affiliated, &university, &affiliation_id)?;

        let mut active: InstituteActiveModel = institute.into();
        if let Some(name) = update.name {
            active.name = Set(validate::required("name", &name)?);
        }
        if let Some(kind) = update.kind {
            active.kind = Set(kind);
        }
        if let Some(phone) = update.official_phone {
            active.official_phone = Set(validate::required("official_phone", &phone)?);
        }
        if let Some(line) = update.address_line1 {
            active.address_line1 = Set(validate::required("address_line1", &line)?);
        }
        if update.address_line2.is_some() {
            active.address_line2 = Set(validate::optional(update.address_line2));
        }
        if let Some(city) = update.city {
            active.city = Set(validate::required("city", &city)?);
        }
        if let Some(state) = update.state {
            active.state = Set(validate::required("state", &state)?);
        }
        if let Some(pincode) = update.pincode {
            active.pincode = Set(validate::pincode(&pincode)?);
        }
        active.is_affiliated = Set(is_affiliated);
        active.affiliation_university = Set(university);
        active.affiliation_id = Set(affiliation_id);
        if update.institute_code.is_some() {
            active.institute_code = Set(validate::optional(update.institute_code));
        }
        if update.established_year.is_some() {
            active.established_year = Set(update.established_year);
        }
        if update.accreditation_status.is_some() {
            active.accreditation_status = Set(validate::optional(update.accreditation_status));
        }
        if update.website.is_some() {
            active.website = Set(validate::optional(update.website));
        }
        if update.logo.is_some() {
            active.logo = Set(validate::optional(update.logo));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }
}
