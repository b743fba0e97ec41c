//! Property tests for the ledger, resonance table and decay.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use resonance_core::decay::{apply_decay, decay_magnitude};
use resonance_core::energy::{color_index_of, progress_to_next_color, COLOR_THRESHOLDS};
use resonance_core::resonance::{multiplier_for, multiplier_table};
use resonance_core::{Completion, DecayConfig, EnergySource, EnergyState};

fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap()
}

fn completions() -> impl Strategy<Value = Vec<(i64, Option<f64>)>> {
    prop::collection::vec((0i64..200, prop::option::of(-50.0f64..150.0)), 0..30)
}

fn build(items: &[(i64, Option<f64>)]) -> EnergyState {
    items
        .iter()
        .enumerate()
        .fold(EnergyState::new(&morning()), |state, (i, (base, resonance))| {
            let mut completion = Completion::new(EnergySource::Tasks, *base, "task");
            completion.resonance = *resonance;
            state.add_energy(&completion, &(morning() + Duration::minutes(i as i64)))
        })
}

proptest! {
    #[test]
    fn color_index_is_monotone(a in 0i64..2000, b in 0i64..2000) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(color_index_of(lo) <= color_index_of(hi));
        prop_assert!(color_index_of(hi) <= 6);
    }

    #[test]
    fn color_index_matches_thresholds(energy in 0i64..2000) {
        let index = color_index_of(energy);
        prop_assert!(energy >= COLOR_THRESHOLDS[index]);
        if index < 6 {
            prop_assert!(energy < COLOR_THRESHOLDS[index + 1]);
        }
        let progress = progress_to_next_color(energy);
        prop_assert!((0.0..=100.0).contains(&progress));
    }

    #[test]
    fn multiplier_is_total_and_bounded(resonance in any::<f64>()) {
        let m = multiplier_table(resonance);
        prop_assert!([0.6, 0.8, 1.0, 1.2, 1.5, 2.0].contains(&m));
    }

    #[test]
    fn multiplier_is_monotone(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(multiplier_for(Some(lo)) <= multiplier_for(Some(hi)));
    }

    #[test]
    fn total_equals_sum_of_entries(items in completions()) {
        let state = build(&items);
        let sum: i64 = state.entries.iter().map(|e| e.amount).sum();
        prop_assert_eq!(state.total_energy, sum);
        prop_assert!(state.total_energy >= 0);
        prop_assert!(state.validate().is_ok());
        prop_assert!(state.aura_count <= 1);
    }

    #[test]
    fn reset_is_idempotent_within_a_day(items in completions(), minutes in 0i64..600) {
        let state = build(&items);
        let next_day = morning() + Duration::days(1) + Duration::minutes(minutes);
        let once = state.reset_energy_if_needed(&next_day);
        let twice = once.clone().reset_energy_if_needed(&next_day);
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.total_energy, 0);
        prop_assert_eq!(once.daily_history.len(), 1);
    }

    #[test]
    fn decay_magnitude_is_monotone_and_capped(a in 0.0f64..100.0, b in 0.0f64..100.0) {
        let config = DecayConfig::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(decay_magnitude(lo, &config) <= decay_magnitude(hi, &config));
        prop_assert!(decay_magnitude(hi, &config) <= config.per_call_cap());
    }

    #[test]
    fn decay_respects_daily_cap(start in 0i64..5000, calls in 1usize..80) {
        let config = DecayConfig::default();
        let mut state = EnergyState::new(&morning());
        state = state.add_energy(&Completion::new(EnergySource::Goals, start, "seed"), &morning());
        let before = state.total_energy;
        let now = morning() + Duration::hours(10);
        for _ in 0..calls {
            state = apply_decay(state, 30.0, &now, &config);
        }
        let removed = before - state.total_energy;
        prop_assert!(removed <= config.max_decay_per_day);
        prop_assert!(state.total_energy >= 0);
    }
}
