use pixmorph::lowlevel::{pack, pack_rgba, unpack, unpack_rgba};
use pixmorph::{remap, remap_owned, Assignment, MorphError, OwnedPixels, PixelSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn pixel_set_rejects_wrong_element_width() {
    let data = [0u8; 10];
    let err = PixelSet::from_rgba(&data).err().unwrap();
    assert_eq!(err, MorphError::ElementWidth { len: 10, width: 4 });
}

#[test]
fn pixel_set_iterates_in_index_order() {
    let data: Vec<u8> = (0u8..12).collect();
    let set = PixelSet::from_rgba(&data).unwrap();
    assert_eq!(set.len(), 3);
    assert!(!set.is_empty());
    let samples: Vec<_> = set.iter().collect();
    assert_eq!(samples, vec![[0, 1, 2, 3], [4, 5, 6, 7], [8, 9, 10, 11]]);
    assert!(PixelSet::from_rgba(&[]).unwrap().is_empty());
}

#[test]
fn codec_round_trips_random_quads() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..1000 {
        let quad: [u8; 4] = rng.random();
        assert_eq!(unpack(pack(quad)), quad);
    }
}

#[test]
fn bulk_codec_keeps_pixel_order() {
    let bytes = [1u8, 2, 3, 4, 250, 251, 252, 253];
    let words = pack_rgba(&bytes).unwrap();
    assert_eq!(words, vec![0x0102_0304, 0xFAFB_FCFD]);
    assert_eq!(unpack_rgba(&words), bytes.to_vec());
}

#[test]
fn remap_moves_each_source_to_its_target() {
    let source = [
        10u8, 10, 10, 255, //
        20, 20, 20, 255, //
        30, 30, 30, 255,
    ];
    let assignment = Assignment::from_targets(vec![2, 0, 1]).unwrap();
    let out = remap(PixelSet::from_rgba(&source).unwrap(), &assignment).unwrap();
    assert_eq!(
        out,
        vec![
            20, 20, 20, 255, //
            30, 30, 30, 255, //
            10, 10, 10, 255,
        ]
    );
}

#[test]
fn remap_rejects_length_mismatch() {
    let source = [0u8; 8];
    let assignment = Assignment::from_targets(vec![0]).unwrap();
    let err = remap(PixelSet::from_rgba(&source).unwrap(), &assignment)
        .err()
        .unwrap();
    assert_eq!(
        err,
        MorphError::LengthMismatch {
            source_len: 2,
            target_len: 1,
        }
    );
}

#[test]
fn remap_owned_keeps_dimensions() {
    let image = OwnedPixels::new((0u8..16).collect(), 2, 2).unwrap();
    let assignment = Assignment::from_targets(vec![3, 2, 1, 0]).unwrap();
    let out = remap_owned(&image, &assignment).unwrap();
    assert_eq!((out.width(), out.height()), (2, 2));
    assert_eq!(&out.data()[0..4], &[12, 13, 14, 15]);
    assert_eq!(&out.data()[12..16], &[0, 1, 2, 3]);
}

#[test]
fn assignment_inverse_undoes_mapping() {
    let assignment = Assignment::from_targets(vec![1, 3, 0, 2]).unwrap();
    let inverse = assignment.inverse();
    for (i, &j) in assignment.as_slice().iter().enumerate() {
        assert_eq!(inverse[j as usize] as usize, i);
    }
    assert_eq!(assignment.clone().into_vec(), vec![1, 3, 0, 2]);
}
