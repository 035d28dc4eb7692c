/// Weight of the rule score in the unified score.
pub const RULE_WEIGHT: f64 = 0.5;
/// Weight of the ML score in the unified score.
pub const ML_WEIGHT: f64 = 0.7;

/// Blends rule and ML scores into one value in `[0, 100]`.
///
/// The weights sum above one so that strong agreement between both signals
/// saturates at 100, while the rule score alone (used as the ML component on
/// fallback) tops out at 72.
pub fn unify(rule_score: u32, ml_score: f64) -> f64 {
    let ml = if ml_score.is_finite() {
        ml_score.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let blended = RULE_WEIGHT * f64::from(rule_score) + ML_WEIGHT * ml;
    ((blended * 100.0).round() / 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_table() {
        let table = [
            (0, 0.0, 0.0),
            (20, 0.0, 10.0),
            (0, 10.0, 7.0),
            (25, 50.0, 47.5),
            (40, 50.0, 55.0),
            (60, 60.0, 72.0),
            (60, 100.0, 100.0),
        ];
        for (rule, ml, expected) in table {
            assert_eq!(unify(rule, ml), expected, "rule={rule} ml={ml}");
        }
    }

    #[test]
    fn monotonic_in_both_inputs() {
        for rule in 0..=60u32 {
            let mut previous = -1.0;
            for ml in 0..=100u32 {
                let score = unify(rule, f64::from(ml));
                assert!(score >= previous, "ml not monotonic at rule={rule} ml={ml}");
                assert!(unify(rule + 1, f64::from(ml)) >= score);
                previous = score;
            }
        }
    }

    #[test]
    fn saturates_at_one_hundred() {
        assert_eq!(unify(60, 100.0), 100.0);
        assert_eq!(unify(60, 250.0), 100.0);
        assert_eq!(unify(u32::MAX, 100.0), 100.0);
        assert_eq!(unify(0, f64::NAN), 0.0);
    }
}
