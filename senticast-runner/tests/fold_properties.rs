//! Property tests for walk-forward fold layout and run ids.
//!
//! 1. Folds tile the usable bars: OOS blocks are contiguous, equal, and never
//!    reach the final bar
//! 2. Each IS window ends where its OOS block starts and grows fold by fold
//! 3. Run ids depend on every input

use proptest::prelude::*;
use senticast_core::domain::{DatasetHash, ModelVersion};
use senticast_runner::{create_folds, RunnerConfig, WalkForwardConfig, WalkForwardError};

fn wf_config() -> impl Strategy<Value = WalkForwardConfig> {
    (1usize..8, 1usize..200, 1usize..60).prop_map(|(n_folds, min_is_bars, min_oos_bars)| {
        WalkForwardConfig {
            n_folds,
            min_total_bars: 0,
            min_is_bars,
            min_oos_bars,
        }
    })
}

proptest! {
    #[test]
    fn folds_tile_without_touching_last_bar(config in wf_config(), total in 0usize..2_000) {
        match create_folds(total, &config) {
            Ok(folds) => {
                prop_assert_eq!(folds.len(), config.n_folds);
                let block = folds[0].oos_end - folds[0].oos_start;
                prop_assert!(block >= config.min_oos_bars);
                prop_assert_eq!(folds[0].is_end, config.min_is_bars);
                for pair in folds.windows(2) {
                    prop_assert_eq!(pair[0].oos_end, pair[1].oos_start);
                    prop_assert!(pair[1].is_end > pair[0].is_end);
                }
                for (i, fold) in folds.iter().enumerate() {
                    prop_assert_eq!(fold.fold_index, i);
                    prop_assert_eq!(fold.is_end, fold.oos_start);
                    prop_assert_eq!(fold.oos_end - fold.oos_start, block);
                }
                let last = folds.last().unwrap();
                prop_assert!(last.oos_end < total);
            }
            Err(WalkForwardError::FoldCreationFailed { .. }) => {
                let usable = total.saturating_sub(1);
                let block = usable.saturating_sub(config.min_is_bars) / config.n_folds;
                prop_assert!(block < config.min_oos_bars);
            }
            Err(e) => prop_assert!(false, "unexpected error: {e}"),
        }
    }

    #[test]
    fn run_id_changes_with_any_input(
        window_len in 1usize..10,
        dataset in "[0-9a-f]{8}",
        model in "ridge-[0-9a-f]{12}",
    ) {
        let mut config = RunnerConfig::default();
        config.model.fit.window_len = window_len;
        let d = DatasetHash::from_hash(&dataset);
        let m = ModelVersion::new(model.clone());
        let id = config.run_id(&d, &m).unwrap();

        prop_assert_eq!(&id, &config.run_id(&d, &m).unwrap());
        prop_assert_ne!(&id, &config.run_id(&DatasetHash::from_hash("other"), &m).unwrap());
        prop_assert_ne!(&id, &config.run_id(&d, &ModelVersion::new(format!("{model}x"))).unwrap());

        let mut changed = config.clone();
        changed.model.fit.window_len = window_len + 1;
        prop_assert_ne!(&id, &changed.run_id(&d, &m).unwrap());
    }
}

#[test]
fn too_short_history_is_reported() {
    let config = WalkForwardConfig::default();
    assert!(matches!(
        create_folds(100, &config),
        Err(WalkForwardError::InsufficientData { total_bars: 100, .. })
    ));
}
