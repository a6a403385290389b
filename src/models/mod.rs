pub mod achievement;
pub mod affirmation;
pub mod challenge;
pub mod entry;
pub mod goal;
pub mod subscription;
pub mod support;
pub mod user;
