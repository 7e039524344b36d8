use pixmorph::{
    BackendConfig, HostBackend, MorphError, ParallelMatcher, ParallelStrategy, PixelSet,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const STRATEGIES: [ParallelStrategy; 2] =
    [ParallelStrategy::UsedMask, ParallelStrategy::PriorityClaim];

fn grey(levels: &[u8]) -> Vec<u8> {
    levels.iter().flat_map(|&v| [v, v, v, 255]).collect()
}

fn random_pixels(n: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n * 4).map(|_| rng.random()).collect()
}

fn is_permutation(targets: &[u32]) -> bool {
    let mut seen = vec![false; targets.len()];
    for &j in targets {
        match seen.get_mut(j as usize) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

fn backend() -> HostBackend {
    HostBackend::new(BackendConfig::default()).unwrap()
}

#[test]
fn distinct_colors_converge_in_one_pass() {
    let a = grey(&[0, 50, 200]);
    for strategy in STRATEGIES {
        let mut be = backend();
        let out = ParallelMatcher::new(strategy)
            .assign(
                &mut be,
                PixelSet::from_rgba(&a).unwrap(),
                PixelSet::from_rgba(&a).unwrap(),
            )
            .unwrap();
        assert_eq!(out.assignment.as_slice(), &[0, 1, 2], "{strategy:?}");
        assert_eq!(out.passes, 1);
    }
}

#[test]
fn swapped_colors_swap_indices() {
    let a = grey(&[0, 10]);
    let b = grey(&[10, 0]);
    for strategy in STRATEGIES {
        let mut be = backend();
        let out = ParallelMatcher::new(strategy)
            .assign(
                &mut be,
                PixelSet::from_rgba(&a).unwrap(),
                PixelSet::from_rgba(&b).unwrap(),
            )
            .unwrap();
        assert_eq!(out.assignment.as_slice(), &[1, 0], "{strategy:?}");
    }
}

#[test]
fn empty_and_single_inputs() {
    let one = [9u8, 9, 9, 9];
    let other = [1u8, 2, 3, 4];
    for strategy in STRATEGIES {
        let mut be = backend();
        let matcher = ParallelMatcher::new(strategy);
        let empty = PixelSet::from_rgba(&[]).unwrap();
        let out = matcher.assign(&mut be, empty, empty).unwrap();
        assert!(out.assignment.is_empty());
        assert_eq!(out.passes, 0);

        let out = matcher
            .assign(
                &mut be,
                PixelSet::from_rgba(&one).unwrap(),
                PixelSet::from_rgba(&other).unwrap(),
            )
            .unwrap();
        assert_eq!(out.assignment.as_slice(), &[0]);
        assert_eq!(out.passes, 1);
    }
}

#[test]
fn random_inputs_converge_within_bound() {
    let n = 257;
    let a = random_pixels(n, 11);
    let b = random_pixels(n, 12);
    for strategy in STRATEGIES {
        let mut be = backend();
        let out = ParallelMatcher::new(strategy)
            .assign(
                &mut be,
                PixelSet::from_rgba(&a).unwrap(),
                PixelSet::from_rgba(&b).unwrap(),
            )
            .unwrap();
        assert_eq!(out.assignment.len(), n);
        assert!(is_permutation(out.assignment.as_slice()), "{strategy:?}");
        assert!(out.passes >= 1 && out.passes <= n);
        assert_eq!(be.live_buffers(), 0);
    }
}

#[test]
fn uniform_colors_take_one_pass_per_pixel() {
    // Every lane wants destination 0 first; exactly one destination is
    // settled per pass.
    let n = 24;
    let a = grey(&vec![128; n]);
    for strategy in STRATEGIES {
        let mut be = backend();
        let out = ParallelMatcher::new(strategy)
            .assign(
                &mut be,
                PixelSet::from_rgba(&a).unwrap(),
                PixelSet::from_rgba(&a).unwrap(),
            )
            .unwrap();
        assert!(is_permutation(out.assignment.as_slice()));
        assert_eq!(out.passes, n, "{strategy:?}");
    }
}

#[test]
fn priority_claim_breaks_cost_ties_by_lane_index() {
    let n = 6;
    let a = grey(&vec![40; n]);
    let mut be = backend();
    let out = ParallelMatcher::new(ParallelStrategy::PriorityClaim)
        .assign(
            &mut be,
            PixelSet::from_rgba(&a).unwrap(),
            PixelSet::from_rgba(&a).unwrap(),
        )
        .unwrap();
    assert_eq!(out.assignment.as_slice(), &[0, 1, 2, 3, 4, 5]);
}

#[test]
fn priority_claim_prefers_cheaper_claimant() {
    // Both sources want destination 0; source 1 matches it exactly.
    let a = grey(&[5, 0]);
    let b = grey(&[0, 100]);
    let mut be = backend();
    let out = ParallelMatcher::new(ParallelStrategy::PriorityClaim)
        .assign(
            &mut be,
            PixelSet::from_rgba(&a).unwrap(),
            PixelSet::from_rgba(&b).unwrap(),
        )
        .unwrap();
    assert_eq!(out.assignment.as_slice(), &[1, 0]);
    assert_eq!(out.passes, 2);
}

#[test]
fn iteration_cap_is_enforced() {
    let a = grey(&[77; 8]);
    for strategy in STRATEGIES {
        let mut be = backend();
        let err = ParallelMatcher::new(strategy)
            .with_max_iterations(Some(3))
            .assign(
                &mut be,
                PixelSet::from_rgba(&a).unwrap(),
                PixelSet::from_rgba(&a).unwrap(),
            )
            .err()
            .unwrap();
        assert_eq!(err, MorphError::NonConvergence { iterations: 3 });
        assert_eq!(be.live_buffers(), 0, "buffers leaked after failure");
    }
}

#[test]
fn iteration_cap_never_drops_below_one() {
    let matcher = ParallelMatcher::new(ParallelStrategy::UsedMask).with_max_iterations(Some(0));
    assert_eq!(matcher.iteration_cap(10), 1);
    assert_eq!(ParallelMatcher::default().iteration_cap(10), 10);
    assert_eq!(ParallelMatcher::default().iteration_cap(0), 1);
}

#[test]
fn large_lane_counts_are_split_across_dispatches() {
    let n = 37;
    let a = random_pixels(n, 21);
    let b = random_pixels(n, 22);
    for strategy in STRATEGIES {
        let mut be = HostBackend::new(BackendConfig {
            workgroup_size: 4,
            max_workgroups_per_dispatch: 2,
            threads: Some(2),
        })
        .unwrap();
        let out = ParallelMatcher::new(strategy)
            .assign(
                &mut be,
                PixelSet::from_rgba(&a).unwrap(),
                PixelSet::from_rgba(&b).unwrap(),
            )
            .unwrap();
        assert!(is_permutation(out.assignment.as_slice()), "{strategy:?}");
    }
}

#[test]
fn unequal_lengths_fail_before_touching_backend() {
    let a = grey(&[1, 2, 3]);
    let b = grey(&[1, 2]);
    let mut be = backend();
    let err = ParallelMatcher::default()
        .assign(
            &mut be,
            PixelSet::from_rgba(&a).unwrap(),
            PixelSet::from_rgba(&b).unwrap(),
        )
        .err()
        .unwrap();
    assert_eq!(
        err,
        MorphError::LengthMismatch {
            source_len: 3,
            target_len: 2,
        }
    );
    assert_eq!(be.live_buffers(), 0);
}
