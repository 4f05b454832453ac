//! The four assessment forms. Importer, end-user, and future-trend forms are described
//! by static schemas; the recipe form keeps a variable-length list of chemicals.

pub mod end_user;
pub mod future;
pub mod importer;
pub mod recipe;

/// Shared by the importer and future-trend forms.
pub const COMPLIANCE_HISTORY: &[&str] = &["Excellent", "Good", "Average", "Poor"];
pub const FINANCIAL_STABILITY: &[&str] = &["High", "Medium", "Low"];
