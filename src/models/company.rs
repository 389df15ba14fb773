use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompanyStatus {
    Trial,
    Active,
    Suspended,
}

impl CompanyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyStatus::Trial => "TRIAL",
            CompanyStatus::Active => "ACTIVE",
            CompanyStatus::Suspended => "SUSPENDED",
        }
    }
}

impl fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompanyStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "TRIAL" => Ok(CompanyStatus::Trial),
            "ACTIVE" => Ok(CompanyStatus::Active),
            "SUSPENDED" => Ok(CompanyStatus::Suspended),
            other => Err(format!("unknown company status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    pub status: CompanyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbCompany {
    pub id: Uuid,
    pub name: String,
    pub name_en: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbCompany> for Company {
    type Error = AppError;

    fn try_from(value: DbCompany) -> Result<Self, Self::Error> {
        let status = value
            .status
            .parse()
            .map_err(|err: String| AppError::internal(format!("company {}: {err}", value.id)))?;

        Ok(Company {
            id: value.id,
            name: value.name,
            name_en: value.name_en,
            status,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompanyCreateRequest {
    #[schema(example = "Khairat Al-Ard Quarries")]
    pub name: String,
    pub name_en: Option<String>,
}
