pub mod files;
pub mod payments;
