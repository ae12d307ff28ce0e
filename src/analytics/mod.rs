pub mod dashboard;
pub mod latest;
