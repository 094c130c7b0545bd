use ivpdose::prelude::*;
use proptest::prelude::*;

fn grid_time() -> impl Strategy<Value = f64> {
    (0u8..20).prop_map(|k| 0.5 * k as f64)
}

proptest! {
    #[test]
    fn merged_schedule_is_ordered_and_complete(
        events in prop::collection::vec((1i64..=3, grid_time(), -5.0f64..5.0), 0..8),
        mut sampling in prop::collection::vec(grid_time(), 1..12),
    ) {
        sampling.sort_by(f64::total_cmp);
        let records: Vec<EventRecord> = events.iter().copied().map(EventRecord::from).collect();
        let schedule = Schedule::merge(&records, &sampling, 3).unwrap();

        for pair in schedule.rows().windows(2) {
            prop_assert!(pair[0].time <= pair[1].time);
        }

        let shadowed = sampling
            .iter()
            .filter(|t| records.iter().any(|e| e.time == **t))
            .count();
        prop_assert_eq!(schedule.len(), records.len() + sampling.len() - shadowed);

        // jumps keep their input order at every instant
        let jumps: Vec<(usize, f64, f64)> = schedule
            .iter()
            .filter_map(|row| match row.kind {
                RowKind::Jump { state, delta } => Some((state, row.time, delta)),
                RowKind::Sample => None,
            })
            .collect();
        let mut expected: Vec<(usize, f64, f64)> = records
            .iter()
            .map(|e| ((e.state - 1) as usize, e.time, e.delta))
            .collect();
        expected.sort_by(|a, b| a.1.total_cmp(&b.1));
        prop_assert_eq!(jumps, expected);
    }

    #[test]
    fn no_events_leaves_the_sampling_grid(
        mut sampling in prop::collection::vec(grid_time(), 0..12),
    ) {
        sampling.sort_by(f64::total_cmp);
        let schedule = Schedule::merge(&[], &sampling, 1).unwrap();
        prop_assert!(schedule.iter().all(|row| row.state_index() == -1 && row.delta() == 0.0));
        let times: Vec<f64> = schedule.iter().map(|row| row.time).collect();
        prop_assert_eq!(times, sampling);
    }
}
