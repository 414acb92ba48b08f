pub mod commit;
pub mod progress;
pub mod user;

pub use commit::{Commit, NewCommit};
pub use progress::UserProgress;
pub use user::UserId;
