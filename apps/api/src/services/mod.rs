//! Dashboard operations on top of the record store.
//!
//! Handlers stay thin: they extract the owner and the payload, then call
//! into these functions, which validate, transform and persist.

pub mod categories;
pub mod job_offers;
pub mod personal_info;
pub mod skills;

/// Collection names shared with the dashboard front end. CV documents
/// (`cvs`) only go through the generic record routes.
pub mod collections {
    pub const PERSONAL_INFO: &str = "personal_info";
    pub const JOB_OFFERS: &str = "job_offers";
    pub const CATEGORIES: &str = "categories";
    pub const SKILLS: &str = "technical_skills";
}
