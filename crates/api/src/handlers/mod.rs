pub mod logs;
pub mod reports;
pub mod runs;
pub mod static_reports;
pub mod test_plans;
pub mod workers;
