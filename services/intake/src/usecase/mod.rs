pub mod code;
pub mod evaluation;
pub mod report;
