pub mod config;
pub mod policy;
pub mod student;
pub mod text;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, PolicyConfig};
pub use policy::{ExclusionMatch, ExclusionPolicy, PolicyDecision};
pub use student::{Candidate, GeneralRecord, GradeRecord, StudentDetail, TermRecord};
pub use text::{abbreviate_institution, candidate_label};
