pub mod achievements;
pub mod affirmations;
pub mod auth;
pub mod billing;
pub mod challenges;
pub mod entries;
pub mod goals;
pub mod health;
pub mod support;
