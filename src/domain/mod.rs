pub mod filters;
pub mod models;
pub mod scoring;
