//! Progression calculator: the pure formulas behind experience, gold, and
//! levels. No IO and no validation here; callers reject bad input before
//! these run.

/// Experience granted per completed study minute.
pub const XP_PER_MINUTE: u64 = 1;

/// Gold granted per completed study minute, expressed as tenths so the
/// arithmetic stays in integers (4 tenths = 0.4 gold per minute).
pub const GOLD_TENTHS_PER_MINUTE: u64 = 4;

/// Gold bonus granted for every level boundary crossed.
pub const LEVEL_UP_BONUS_GOLD: u64 = 50;

/// Experience span of one level band.
pub const XP_PER_LEVEL: u64 = 100;

/// Convert a study duration into (experience, gold) gains.
///
/// Partial minutes earn nothing: 1 XP per whole minute, then 0.4 gold per
/// whole minute truncated to whole gold. 25 minutes → (25, 10).
pub fn reward_from_study_duration(duration_secs: u64) -> (u64, u64) {
    let minutes = duration_secs / 60;
    let xp = minutes * XP_PER_MINUTE;
    let gold = minutes * GOLD_TENTHS_PER_MINUTE / 10;
    (xp, gold)
}

/// Level for a given experience total: fixed 100-XP bands starting at 1.
pub fn level_from_experience(experience: u64) -> u32 {
    (experience / XP_PER_LEVEL) as u32 + 1
}

/// Gold owed for level-up bonuses when experience moves from `old_xp` to
/// `new_xp`: one [`LEVEL_UP_BONUS_GOLD`] per boundary crossed.
///
/// Iterates boundaries rather than comparing old/new level once, so a
/// single grant that jumps several levels pays every one of them.
pub fn level_up_bonuses(old_xp: u64, new_xp: u64) -> Vec<u32> {
    let old_level = level_from_experience(old_xp);
    let new_level = level_from_experience(new_xp);
    (old_level + 1..=new_level).collect()
}

/// Experience still needed to reach the next level.
pub fn experience_to_next_level(level: u32, experience: u64) -> u64 {
    (level as u64 * XP_PER_LEVEL).saturating_sub(experience)
}

/// Progress through the current level band, 0–99.
pub fn level_progress_percent(experience: u64) -> u64 {
    experience % XP_PER_LEVEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pomodoro_rates_match_documented_values() {
        // 25 minutes: 25 XP, floor(25 * 0.4) = 10 gold.
        assert_eq!(reward_from_study_duration(1500), (25, 10));
        // 60 seconds: 1 XP, floor(0.4) = 0 gold.
        assert_eq!(reward_from_study_duration(60), (1, 0));
        // Partial minutes earn nothing.
        assert_eq!(reward_from_study_duration(59), (0, 0));
        assert_eq!(reward_from_study_duration(119), (1, 0));
    }

    #[test]
    fn level_formula_and_boundaries() {
        assert_eq!(level_from_experience(0), 1);
        assert_eq!(level_from_experience(99), 1);
        assert_eq!(level_from_experience(100), 2);
        assert_eq!(level_from_experience(250), 3);
        assert_eq!(level_from_experience(1000), 11);
    }

    #[test]
    fn level_is_monotonic() {
        let mut prev = 0;
        for xp in 0..10_000u64 {
            let level = level_from_experience(xp);
            assert!(level >= prev);
            assert_eq!(level as u64, xp / 100 + 1);
            prev = level;
        }
    }

    #[test]
    fn multi_level_jump_pays_every_boundary() {
        // 90 XP + 250 XP lands at 340: crosses into levels 2, 3, and 4.
        assert_eq!(level_up_bonuses(90, 340), vec![2, 3, 4]);
        assert_eq!(level_up_bonuses(90, 95), Vec::<u32>::new());
        assert_eq!(level_up_bonuses(99, 100), vec![2]);
        // Landing exactly on a boundary counts.
        assert_eq!(level_up_bonuses(0, 200), vec![2, 3]);
    }

    #[test]
    fn next_level_and_progress_helpers() {
        assert_eq!(experience_to_next_level(1, 40), 60);
        assert_eq!(experience_to_next_level(3, 250), 50);
        assert_eq!(level_progress_percent(250), 50);
        assert_eq!(level_progress_percent(0), 0);
    }
}
