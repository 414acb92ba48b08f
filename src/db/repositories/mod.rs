pub mod commits;
pub mod progress;
