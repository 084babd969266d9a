pub mod comparison;
pub mod sweep;
