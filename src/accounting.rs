//! Streak and XP accounting.
//!
//! [`advance`] is the whole reward ruleset: one pure transition from the
//! previous progress state to the next, given the local day of the commit
//! being recorded. The pipeline applies it once per commit; nothing else
//! mutates progress.

use crate::calendar::DayKey;
use crate::db::models::UserProgress;

/// XP granted for every recorded commit.
pub const XP_PER_COMMIT: u64 = 100;

/// Progress state after recording one commit on `day`.
///
/// Streak rules:
/// - another commit on the day already recorded holds the streak;
/// - a commit on the immediately following day extends it by one;
/// - any other day (a gap, a first-ever commit, or a day before the last
///   recorded one) starts a fresh streak of 1.
///
/// XP grows by [`XP_PER_COMMIT`] unconditionally, and `last_commit_day`
/// always moves to `day`.
pub fn advance(prev: &UserProgress, day: DayKey) -> UserProgress {
    let streak = match prev.last_commit_day {
        Some(last) if last == day => prev.streak,
        Some(last) if last.next() == Some(day) => prev.streak + 1,
        _ => 1,
    };

    UserProgress {
        xp: prev.xp + XP_PER_COMMIT,
        streak,
        last_commit_day: Some(day),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> DayKey {
        s.parse().unwrap()
    }

    fn progress(xp: u64, streak: u32, last: &str) -> UserProgress {
        UserProgress {
            xp,
            streak,
            last_commit_day: Some(day(last)),
        }
    }

    #[test]
    fn first_commit_starts_a_streak_of_one() {
        let next = advance(&UserProgress::zero(), day("2024-03-01"));
        assert_eq!(next.xp, XP_PER_COMMIT);
        assert_eq!(next.streak, 1);
        assert_eq!(next.last_commit_day, Some(day("2024-03-01")));
    }

    #[test]
    fn same_day_commit_holds_the_streak() {
        let prev = progress(300, 3, "2024-03-01");
        let next = advance(&prev, day("2024-03-01"));
        assert_eq!(next.streak, 3);
        assert_eq!(next.xp, 400);
        assert_eq!(next.last_commit_day, prev.last_commit_day);
    }

    #[test]
    fn next_day_commit_extends_the_streak() {
        let next = advance(&progress(300, 3, "2024-03-01"), day("2024-03-02"));
        assert_eq!(next.streak, 4);
        assert_eq!(next.last_commit_day, Some(day("2024-03-02")));
    }

    #[test]
    fn gap_resets_the_streak() {
        let next = advance(&progress(700, 7, "2024-03-01"), day("2024-03-05"));
        assert_eq!(next.streak, 1);
        assert_eq!(next.xp, 800);
    }

    #[test]
    fn earlier_day_resets_the_streak() {
        // A replayed or clock-skewed event lands before the last recorded
        // day. It still counts as a commit, but not as streak continuity.
        let next = advance(&progress(500, 5, "2024-03-10"), day("2024-03-08"));
        assert_eq!(next.streak, 1);
        assert_eq!(next.last_commit_day, Some(day("2024-03-08")));
    }

    #[test]
    fn streak_extends_across_month_and_year_boundaries() {
        let next = advance(&progress(100, 1, "2023-12-31"), day("2024-01-01"));
        assert_eq!(next.streak, 2);
    }

    #[test]
    fn xp_grows_by_a_fixed_step_on_every_branch() {
        let mut state = UserProgress::zero();
        for d in ["2024-03-01", "2024-03-01", "2024-03-02", "2024-03-09"] {
            state = advance(&state, day(d));
        }
        assert_eq!(state.xp, 4 * XP_PER_COMMIT);
        assert_eq!(state.streak, 1);
    }
}
