use std::collections::BTreeSet;

use proptest::prelude::*;
use rand::{rngs::SmallRng, SeedableRng};
use warzone::{random_position, Missile, MissileType, Position};

fn missile_type() -> impl Strategy<Value = MissileType> {
    prop_oneof![
        Just(MissileType::M1),
        Just(MissileType::M2),
        Just(MissileType::M3),
        Just(MissileType::M4),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn strikes_matches_blast_zone(
        n in 8u8..20,
        tx in 0u8..20,
        ty in 0u8..20,
        kind in missile_type(),
    ) {
        let missile = Missile::new(Position::new(tx % n, ty % n), kind);
        let zone: BTreeSet<Position> = missile.blast_zone(n).into_iter().collect();
        for y in 0..n {
            for x in 0..n {
                let cell = Position::new(x, y);
                prop_assert_eq!(missile.strikes(cell), zone.contains(&cell));
                // Same answer every time it is asked.
                prop_assert_eq!(missile.strikes(cell), missile.strikes(cell));
            }
        }
    }

    #[test]
    fn generated_missiles_land_on_board(seed in any::<u64>(), n in 8u8..32) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let missile = Missile::generate(&mut rng, n);
        prop_assert!(missile.target.x < n && missile.target.y < n);
        prop_assert_eq!(missile.rounds_until_impact, 1);
    }

    #[test]
    fn random_position_avoids_exclusions(seed in any::<u64>(), taken in prop::collection::vec((0u8..8, 0u8..8), 0..40)) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let exclude: BTreeSet<Position> = taken.into_iter().map(|(x, y)| Position::new(x, y)).collect();
        let pos = random_position(&mut rng, 8, &exclude).unwrap();
        prop_assert!(!exclude.contains(&pos));
        prop_assert!(pos.x < 8 && pos.y < 8);
    }
}
