pub mod analytics;
pub mod classes;
pub mod core;
pub mod reports;
