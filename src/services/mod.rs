pub mod achievements;
pub mod ai;
pub mod quota;
pub mod streak;
