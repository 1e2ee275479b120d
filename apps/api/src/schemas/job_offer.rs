//! Job offers: the nested form the tracker edits and the row kept in the
//! `job_offers` collection.
//!
//! Every nested block exists on the form even when the stored row lacks it,
//! so the UI can bind fields without null checks. `analysis` is the one
//! exception: it is produced by the matching step and stays absent until then.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{non_blank, SchemaError, Validator};

pub const DEFAULT_STATUS: &str = "active";
pub const DEFAULT_CURRENCY: &str = "EUR";

// ────────────────────────────────────────────────────────────────────────────
// Form shape
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobOfferForm {
    pub id: Option<String>,
    pub title: String,
    pub company: CompanyForm,
    pub status: String,
    pub contract: ContractForm,
    pub description: String,
    pub requirements: Vec<String>,
    pub responsibilities: Vec<String>,
    pub key_skills: Vec<String>,
    pub application_info: ApplicationInfoForm,
    pub metadata: MetadataForm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisForm>,
}

impl Default for JobOfferForm {
    fn default() -> Self {
        Self {
            id: None,
            title: String::new(),
            company: CompanyForm::default(),
            status: DEFAULT_STATUS.to_string(),
            contract: ContractForm::default(),
            description: String::new(),
            requirements: Vec::new(),
            responsibilities: Vec::new(),
            key_skills: Vec::new(),
            application_info: ApplicationInfoForm::default(),
            metadata: MetadataForm::default(),
            analysis: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyForm {
    pub name: String,
    pub website: String,
    pub logo_url: String,
    pub location: String,
    pub industry: String,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContractForm {
    #[serde(rename = "type")]
    pub contract_type: String,
    /// Months.
    pub duration: Option<u32>,
    pub work_mode: String,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub currency: String,
    pub benefits: Vec<String>,
}

impl Default for ContractForm {
    fn default() -> Self {
        Self {
            contract_type: String::new(),
            duration: None,
            work_mode: String::new(),
            salary_min: None,
            salary_max: None,
            currency: DEFAULT_CURRENCY.to_string(),
            benefits: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationInfoForm {
    pub url: String,
    pub contact_email: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataForm {
    pub source: String,
    pub imported_at: Option<String>,
    pub last_updated: Option<String>,
    pub favorite: bool,
    pub notes: String,
    pub confidence_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisForm {
    pub match_score: Option<f64>,
    pub skills_match: Vec<SkillMatch>,
    pub missing_skills: Vec<String>,
    pub keywords: Vec<String>,
}

/// Shared by both shapes: its field names are case-neutral.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub name: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Row shape
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOfferRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub company: Option<CompanyRow>,
    pub status: Option<String>,
    pub contract: Option<ContractRow>,
    pub description: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub responsibilities: Option<Vec<String>>,
    pub key_skills: Option<Vec<String>>,
    pub application_info: Option<ApplicationInfoRow>,
    pub metadata: Option<MetadataRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyRow {
    pub name: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub location: Option<String>,
    pub industry: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractRow {
    #[serde(rename = "type")]
    pub contract_type: Option<String>,
    pub duration: Option<u32>,
    pub work_mode: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub currency: Option<String>,
    pub benefits: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationInfoRow {
    pub url: Option<String>,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataRow {
    pub source: Option<String>,
    pub imported_at: Option<String>,
    pub last_updated: Option<String>,
    pub favorite: Option<bool>,
    pub notes: Option<String>,
    pub confidence_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisRow {
    pub match_score: Option<f64>,
    pub skills_match: Option<Vec<SkillMatch>>,
    pub missing_skills: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
}

// ────────────────────────────────────────────────────────────────────────────
// Transforms
// ────────────────────────────────────────────────────────────────────────────

impl JobOfferForm {
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut v = Validator::default();
        v.length("title", &self.title, 1, 200)
            .length("company.name", &self.company.name, 1, 100)
            .optional_url("company.website", &self.company.website)
            .optional_url("company.logoUrl", &self.company.logo_url)
            .length("company.location", &self.company.location, 0, 200)
            .length("company.industry", &self.company.industry, 0, 100)
            .length("company.size", &self.company.size, 0, 50)
            .length("contract.type", &self.contract.contract_type, 1, usize::MAX)
            .length("description", &self.description, 1, usize::MAX)
            .optional_url("applicationInfo.url", &self.application_info.url)
            .optional_email(
                "applicationInfo.contactEmail",
                &self.application_info.contact_email,
            )
            .length(
                "applicationInfo.contactName",
                &self.application_info.contact_name,
                0,
                100,
            )
            .length(
                "applicationInfo.contactPhone",
                &self.application_info.contact_phone,
                0,
                20,
            )
            .unit_score("metadata.confidenceScore", self.metadata.confidence_score);

        if let (Some(min), Some(max)) = (self.contract.salary_min, self.contract.salary_max) {
            v.check(
                min <= max,
                "contract.salaryMax",
                "must not be below the minimum salary",
            );
        }
        if let Some(analysis) = &self.analysis {
            v.unit_score("analysis.matchScore", analysis.match_score);
            for (i, skill) in analysis.skills_match.iter().enumerate() {
                v.unit_score(&format!("analysis.skillsMatch[{i}].score"), Some(skill.score));
            }
        }
        v.finish()
    }

    /// Stamps `metadata.last_updated` with the current time when the form
    /// does not carry one.
    pub fn into_row(self) -> JobOfferRow {
        let company = self.company;
        let contract = self.contract;
        let info = self.application_info;
        let meta = self.metadata;

        JobOfferRow {
            id: non_blank(self.id),
            title: Some(self.title.trim().to_string()),
            company: Some(CompanyRow {
                name: Some(company.name.trim().to_string()),
                website: Some(company.website),
                logo_url: Some(company.logo_url),
                location: Some(company.location),
                industry: Some(company.industry),
                size: Some(company.size),
            }),
            status: Some(self.status),
            contract: Some(ContractRow {
                contract_type: Some(contract.contract_type),
                duration: contract.duration,
                work_mode: Some(contract.work_mode),
                salary_min: contract.salary_min,
                salary_max: contract.salary_max,
                currency: Some(contract.currency),
                benefits: Some(contract.benefits),
            }),
            description: Some(self.description),
            requirements: Some(self.requirements),
            responsibilities: Some(self.responsibilities),
            key_skills: Some(self.key_skills),
            application_info: Some(ApplicationInfoRow {
                url: Some(info.url),
                contact_email: Some(info.contact_email),
                contact_name: Some(info.contact_name),
                contact_phone: Some(info.contact_phone),
                deadline: non_blank(info.deadline),
            }),
            metadata: Some(MetadataRow {
                source: Some(meta.source),
                imported_at: non_blank(meta.imported_at),
                last_updated: non_blank(meta.last_updated)
                    .or_else(|| Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))),
                favorite: Some(meta.favorite),
                notes: Some(meta.notes),
                confidence_score: meta.confidence_score,
            }),
            analysis: self.analysis.map(|a| AnalysisRow {
                match_score: a.match_score,
                skills_match: Some(a.skills_match),
                missing_skills: Some(a.missing_skills),
                keywords: Some(a.keywords),
            }),
        }
    }

    pub fn from_row(row: Option<JobOfferRow>) -> Self {
        let Some(row) = row else {
            return Self::default();
        };
        let company = row.company.unwrap_or_default();
        let contract = row.contract.unwrap_or_default();
        let info = row.application_info.unwrap_or_default();
        let meta = row.metadata.unwrap_or_default();

        Self {
            id: row.id,
            title: row.title.unwrap_or_default(),
            company: CompanyForm {
                name: company.name.unwrap_or_default(),
                website: company.website.unwrap_or_default(),
                logo_url: company.logo_url.unwrap_or_default(),
                location: company.location.unwrap_or_default(),
                industry: company.industry.unwrap_or_default(),
                size: company.size.unwrap_or_default(),
            },
            status: non_blank(row.status).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            contract: ContractForm {
                contract_type: contract.contract_type.unwrap_or_default(),
                duration: contract.duration,
                work_mode: contract.work_mode.unwrap_or_default(),
                salary_min: contract.salary_min,
                salary_max: contract.salary_max,
                currency: non_blank(contract.currency)
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                benefits: contract.benefits.unwrap_or_default(),
            },
            description: row.description.unwrap_or_default(),
            requirements: row.requirements.unwrap_or_default(),
            responsibilities: row.responsibilities.unwrap_or_default(),
            key_skills: row.key_skills.unwrap_or_default(),
            application_info: ApplicationInfoForm {
                url: info.url.unwrap_or_default(),
                contact_email: info.contact_email.unwrap_or_default(),
                contact_name: info.contact_name.unwrap_or_default(),
                contact_phone: info.contact_phone.unwrap_or_default(),
                deadline: non_blank(info.deadline),
            },
            metadata: MetadataForm {
                source: meta.source.unwrap_or_default(),
                imported_at: non_blank(meta.imported_at),
                last_updated: non_blank(meta.last_updated),
                favorite: meta.favorite.unwrap_or(false),
                notes: meta.notes.unwrap_or_default(),
                confidence_score: meta.confidence_score,
            },
            analysis: row.analysis.map(|a| AnalysisForm {
                match_score: a.match_score,
                skills_match: a.skills_match.unwrap_or_default(),
                missing_skills: a.missing_skills.unwrap_or_default(),
                keywords: a.keywords.unwrap_or_default(),
            }),
        }
    }
}
