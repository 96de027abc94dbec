//! Level arithmetic for a single volume step
//!
//! Levels are converted to integer micro-units before any arithmetic so
//! half-way cases like 0.575 round up exactly instead of depending on how
//! the sum lands in binary floating point.

/// Micro-units per full scale
const FULL_SCALE: i64 = 1_000_000;

/// Micro-units per committed increment (0.01)
const HUNDREDTH: i64 = FULL_SCALE / 100;

/// Level to commit after moving `baseline` by `delta`
///
/// The result is clamped to `[0.0, 1.0]` and then rounded half up to the
/// nearest 0.01.
pub fn target_level(baseline: f32, delta: f64) -> f32 {
    let micros = to_micros(f64::from(baseline)) + to_micros(delta);
    let hundredths = round_to_hundredths(clamp_micros(micros));
    (hundredths as f64 / 100.0) as f32
}

/// Nearest whole micro-unit; NaN maps to zero
fn to_micros(value: f64) -> i64 {
    (value * FULL_SCALE as f64).round() as i64
}

fn clamp_micros(micros: i64) -> i64 {
    micros.clamp(0, FULL_SCALE)
}

/// Hundredths for a non-negative micro-unit level, ties rounding up
fn round_to_hundredths(micros: i64) -> i64 {
    (micros + HUNDREDTH / 2) / HUNDREDTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_micros(-200_000), 0);
        assert_eq!(clamp_micros(420_000), 420_000);
        assert_eq!(clamp_micros(1_300_000), FULL_SCALE);
        assert_eq!(to_micros(f64::NAN), 0);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_to_hundredths(to_micros(0.473)), 47);
        assert_eq!(round_to_hundredths(to_micros(0.475)), 48);
        assert_eq!(round_to_hundredths(to_micros(0.986)), 99);
        assert_eq!(round_to_hundredths(to_micros(1.0)), 100);
    }

    #[test]
    fn test_single_step() {
        assert_eq!(target_level(0.5, 0.01), 0.51);
        assert_eq!(target_level(0.5, -0.01), 0.49);
        assert_eq!(target_level(0.996, -0.01), 0.99);
    }

    #[test]
    fn test_half_way_sums_round_up() {
        assert_eq!(target_level(0.475, 0.0), 0.48);
        assert_eq!(target_level(0.565, 0.01), 0.58);
        assert_eq!(target_level(0.015, -0.01), 0.01);
        assert_eq!(target_level(0.045, -0.01), 0.04);
        assert_eq!(target_level(0.285, -0.01), 0.28);
    }

    #[test]
    fn test_saturates_at_bounds() {
        assert_eq!(target_level(1.0, 0.01), 1.0);
        assert_eq!(target_level(0.0, -0.01), 0.0);
        assert_eq!(target_level(0.004, -0.01), 0.0);
        assert_eq!(target_level(0.998, 0.01), 1.0);
    }

    #[test]
    fn test_every_thousandth_matches_decimal_half_up() {
        for i in 0..=1000i64 {
            let baseline = i as f32 / 1000.0;
            for (delta, delta_thousandths) in [(0.01, 10i64), (-0.01, -10)] {
                let thousandths = (i + delta_thousandths).clamp(0, 1000);
                let expected = (((thousandths + 5) / 10) as f64 / 100.0) as f32;

                let level = target_level(baseline, delta);
                assert_eq!(level, expected, "{i}/1000 {delta:+} -> {level}");
            }
        }
    }
}
