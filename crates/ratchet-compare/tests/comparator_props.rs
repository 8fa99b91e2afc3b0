//! Property tests for direction classification, deltas, and win counts

use proptest::prelude::*;
use ratchet_compare::{compare, ComparisonSpec, Contender, Direction, WinTally};
use ratchet_registry::MetricMap;

fn arb_metric_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("loss".to_string()),
        Just("val_loss".to_string()),
        Just("perplexity".to_string()),
        Just("word_error_rate".to_string()),
        Just("accuracy".to_string()),
        Just("bleu".to_string()),
        Just("reward".to_string()),
        Just("f1".to_string()),
    ]
}

proptest! {
    #[test]
    fn direction_heuristic_is_total(name in "[a-zA-Z_/0-9]{0,24}") {
        // Classification never panics and is stable.
        let first = Direction::for_metric(&name);
        let second = Direction::for_metric(&name);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn direction_is_case_insensitive(name in arb_metric_name()) {
        prop_assert_eq!(
            Direction::for_metric(&name),
            Direction::for_metric(&name.to_uppercase())
        );
    }

    #[test]
    fn improvement_agrees_with_strict_comparison(
        name in arb_metric_name(),
        cand in -1e6f64..1e6,
        base in -1e6f64..1e6,
    ) {
        let mut candidate = MetricMap::new();
        candidate.insert(name.clone(), cand);
        let mut baseline = MetricMap::new();
        baseline.insert(name.clone(), base);

        let result = compare(&candidate, &baseline, &ComparisonSpec::new());
        let delta = result.get(&name).unwrap();
        let direction = Direction::for_metric(&name);
        prop_assert_eq!(delta.improved, direction.beats(cand, base));
    }

    #[test]
    fn at_most_one_branch_wins_a_metric(
        values in proptest::collection::vec(-100f64..100.0, 2..6),
    ) {
        let contenders: Vec<Contender> = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut summary = MetricMap::new();
                summary.insert("loss".to_string(), *v);
                Contender::new(format!("branch-{i}"), summary)
            })
            .collect();

        let tally = WinTally::rank(&contenders, &ComparisonSpec::new());
        let total: usize = tally.wins.values().sum();
        prop_assert!(total <= 1);
    }

    #[test]
    fn wins_bounded_by_metric_count(
        losses in proptest::collection::vec(-100f64..100.0, 3),
        accs in proptest::collection::vec(0f64..1.0, 3),
    ) {
        let contenders: Vec<Contender> = losses
            .iter()
            .zip(accs.iter())
            .enumerate()
            .map(|(i, (loss, acc))| {
                let mut summary = MetricMap::new();
                summary.insert("loss".to_string(), *loss);
                summary.insert("accuracy".to_string(), *acc);
                Contender::new(format!("branch-{i}"), summary)
            })
            .collect();

        let tally = WinTally::rank(&contenders, &ComparisonSpec::new());
        for count in tally.wins.values() {
            prop_assert!(*count <= 2);
        }
    }

    #[test]
    fn metrics_missing_from_baseline_are_skipped(
        name in arb_metric_name(),
        value in -1e6f64..1e6,
    ) {
        let mut candidate = MetricMap::new();
        candidate.insert(name.clone(), value);
        let baseline = MetricMap::new();

        let result = compare(&candidate, &baseline, &ComparisonSpec::new());
        prop_assert!(result.is_empty());
        prop_assert!(result.was_skipped(&name));
    }
}
