use proptest::prelude::*;
use weatherface_lib::tick::boundary::{delay_until_next_boundary, next_boundary};

proptest! {
    #[test]
    fn next_boundary_is_aligned_and_strictly_ahead(
        now in -10_000_000_000_000i64..10_000_000_000_000i64,
        interval in 1u64..120_000,
    ) {
        let next = next_boundary(now, interval);
        prop_assert_eq!(next.rem_euclid(interval as i64), 0);
        prop_assert!(next > now);
        prop_assert!(next - now <= interval as i64);
    }

    #[test]
    fn delay_matches_boundary(
        now in 0i64..10_000_000_000_000i64,
        interval in 1u64..120_000,
    ) {
        let delay = delay_until_next_boundary(now, interval);
        prop_assert_eq!(now + delay.as_millis() as i64, next_boundary(now, interval));
    }

    #[test]
    fn rescheduling_from_a_late_fire_never_skips_back(
        start in 0i64..1_000_000_000i64,
        lags in proptest::collection::vec(0i64..2_500, 1..20),
    ) {
        let interval = 1_000u64;
        let mut target = next_boundary(start, interval);
        for lag in lags {
            let fired_at = target + lag;
            let next = next_boundary(fired_at.max(target), interval);
            prop_assert!(next > target);
            prop_assert_eq!(next % 1_000, 0);
            target = next;
        }
    }
}
