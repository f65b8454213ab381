pub mod rules;
pub mod scanner;

pub use rules::{PatternRule, PatternTable};
pub use scanner::{line_number_at, PatternCoverage, PatternScanReport, PatternScanner};
