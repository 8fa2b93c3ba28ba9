#![deny(unsafe_code)]

pub mod admin;
pub mod audit;
pub mod error;
pub mod resolution;
pub mod row;
pub mod value;

pub use admin::{AdminLevel, AdminUnit, OutputLevel};
pub use audit::{AuditBundle, AuditEntry, AuditRecord, MatchRecord};
pub use error::{HdxError, Result};
pub use resolution::{ResolutionMethod, ResolutionResult};
pub use row::Row;
pub use value::{CellValue, format_numeric};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_level_round_trips_through_serde() {
        let json = serde_json::to_string(&OutputLevel::Subnational).expect("serialize level");
        assert_eq!(json, "\"subnational\"");
        let back: OutputLevel = serde_json::from_str(&json).expect("deserialize level");
        assert_eq!(back, OutputLevel::Subnational);
    }

    #[test]
    fn unresolved_result_has_no_code() {
        let result = ResolutionResult::unresolved("Nowhere");
        assert!(!result.is_resolved());
        assert_eq!(result.method, ResolutionMethod::Unresolved);
        assert!(result.code.is_none());
    }
}
