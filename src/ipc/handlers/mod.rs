pub mod backup_exchange;
pub mod core;
pub mod grades;
pub mod performance;
pub mod prediction;
pub mod profiles;
pub mod reports;
pub mod settings;
pub mod students;
pub mod subjects;
