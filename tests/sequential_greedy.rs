use pixmorph::{assign_sequential, MorphError, PixelSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

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

#[test]
fn distinct_colors_map_to_themselves() {
    let a = grey(&[0, 50, 200]);
    let b = a.clone();
    let out = assign_sequential(
        PixelSet::from_rgba(&a).unwrap(),
        PixelSet::from_rgba(&b).unwrap(),
    )
    .unwrap();
    assert_eq!(out.as_slice(), &[0, 1, 2]);
}

#[test]
fn swapped_colors_swap_indices() {
    let a = grey(&[0, 10]);
    let b = grey(&[10, 0]);
    let out = assign_sequential(
        PixelSet::from_rgba(&a).unwrap(),
        PixelSet::from_rgba(&b).unwrap(),
    )
    .unwrap();
    assert_eq!(out.as_slice(), &[1, 0]);
}

#[test]
fn empty_and_single_inputs() {
    let empty = PixelSet::from_rgba(&[]).unwrap();
    assert!(assign_sequential(empty, empty).unwrap().is_empty());

    let a = [1u8, 2, 3, 4];
    let b = [200u8, 100, 0, 50];
    let out = assign_sequential(
        PixelSet::from_rgba(&a).unwrap(),
        PixelSet::from_rgba(&b).unwrap(),
    )
    .unwrap();
    assert_eq!(out.as_slice(), &[0]);
}

#[test]
fn ties_go_to_lowest_destination() {
    let a = grey(&[7, 7, 7, 7]);
    let b = grey(&[7, 7, 7, 7]);
    let out = assign_sequential(
        PixelSet::from_rgba(&a).unwrap(),
        PixelSet::from_rgba(&b).unwrap(),
    )
    .unwrap();
    assert_eq!(out.as_slice(), &[0, 1, 2, 3]);
}

#[test]
fn random_inputs_give_permutations_deterministically() {
    let a = random_pixels(300, 1);
    let b = random_pixels(300, 2);
    let sa = PixelSet::from_rgba(&a).unwrap();
    let sb = PixelSet::from_rgba(&b).unwrap();

    let first = assign_sequential(sa, sb).unwrap();
    let second = assign_sequential(sa, sb).unwrap();
    assert_eq!(first.len(), 300);
    assert!(is_permutation(first.as_slice()));
    assert_eq!(first, second);
}

#[test]
fn scan_order_changes_the_result() {
    // Greedy: whichever source is visited first takes the shared nearest
    // destination.
    let a = grey(&[0, 4]);
    let b = grey(&[3, 10]);
    let forward = assign_sequential(
        PixelSet::from_rgba(&a).unwrap(),
        PixelSet::from_rgba(&b).unwrap(),
    )
    .unwrap();
    assert_eq!(forward.as_slice(), &[0, 1]);

    let reversed_a = grey(&[4, 0]);
    let reversed = assign_sequential(
        PixelSet::from_rgba(&reversed_a).unwrap(),
        PixelSet::from_rgba(&b).unwrap(),
    )
    .unwrap();
    // Source 0 (level 0) sits at reversed index 1.
    assert_eq!(reversed.as_slice(), &[0, 1]);
    assert_ne!(forward.target(0), reversed.target(1));
}

#[test]
fn unequal_lengths_fail() {
    let a = grey(&[1, 2, 3]);
    let b = grey(&[1, 2]);
    let err = assign_sequential(
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
}
