use kdcount::{Error, PointSet};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn to_bytes(coords: &[f32]) -> Vec<u8> {
    coords.iter().flat_map(|c| c.to_le_bytes()).collect()
}

#[test]
fn test_load_raw_records() {
    let coords = [0.0, 1.0, 2.0, 3.5, -4.0, 5.25];
    let points = PointSet::load(&to_bytes(&coords), 3).expect("Should parse two records");

    assert_eq!(points.len(), 2);
    assert_eq!(points.dim(), 3);
    assert_eq!(points.at(0).unwrap(), &[0.0, 1.0, 2.0]);
    assert_eq!(points.at(1).unwrap(), &[3.5, -4.0, 5.25]);
    assert_eq!(points.coords(), &coords);
}

#[test]
fn test_load_malformed_length() {
    // 7 floats cannot form records of 3
    let bytes = to_bytes(&[0.0; 7]);
    match PointSet::load(&bytes, 3) {
        Err(Error::Format { len, record }) => {
            assert_eq!(len, 28);
            assert_eq!(record, 12);
        }
        other => panic!("Expected a format error, got {:?}", other),
    }

    // A stray byte is just as bad
    let mut bytes = to_bytes(&[0.0; 6]);
    bytes.push(0);
    assert!(matches!(PointSet::load(&bytes, 3), Err(Error::Format { .. })));
}

#[test]
fn test_load_empty_buffer() {
    let points = PointSet::load(&[], 3).expect("Empty input is well formed");
    assert!(points.is_empty());
    assert_eq!(points.len(), 0);
    assert!(points.bounds().is_none());
}

#[test]
fn test_zero_dimension_rejected() {
    assert!(matches!(PointSet::load(&[], 0), Err(Error::Config(_))));
    assert!(matches!(PointSet::from_coords(vec![], 0), Err(Error::Config(_))));
}

#[test]
fn test_non_finite_rejected() {
    let result = PointSet::from_coords(vec![0.0, 1.0, 2.0, 3.0, f32::NAN, 5.0], 3);
    match result {
        Err(Error::NonFinite { index, axis }) => {
            assert_eq!(index, 1);
            assert_eq!(axis, 1);
        }
        other => panic!("Expected a non-finite error, got {:?}", other),
    }

    let bytes = to_bytes(&[f32::INFINITY, 0.0]);
    assert!(matches!(PointSet::load(&bytes, 2), Err(Error::NonFinite { index: 0, axis: 0 })));
}

#[test]
fn test_at_out_of_range() {
    let points = PointSet::from_points(&[[0.0, 0.0], [1.0, 1.0]]).unwrap();
    assert!(points.at(1).is_ok());
    match points.at(2) {
        Err(Error::Index { index, len }) => {
            assert_eq!(index, 2);
            assert_eq!(len, 2);
        }
        other => panic!("Expected an index error, got {:?}", other),
    }
}

#[test]
fn test_bounds_and_iter() {
    let points = PointSet::from_points(&[[1.0, -1.0], [3.0, 2.0], [-2.0, 0.5]]).unwrap();
    let b = points.bounds().expect("Non-empty set has bounds");
    assert_eq!(b.min, vec![-2.0, -1.0]);
    assert_eq!(b.max, vec![3.0, 2.0]);

    let collected: Vec<&[f32]> = points.iter().collect();
    assert_eq!(collected.len(), 3);
    assert_eq!(collected[2], &[-2.0, 0.5]);
}

#[test]
fn test_open_file() {
    let path = std::env::temp_dir().join(format!("kdcount_points_{}.raw", std::process::id()));
    std::fs::write(&path, to_bytes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])).unwrap();

    let points = PointSet::open(&path, 3);
    std::fs::remove_file(&path).ok();

    let points = points.expect("Should read the file");
    assert_eq!(points.len(), 2);
    assert_eq!(points.at(1).unwrap(), &[4.0, 5.0, 6.0]);

    let missing = std::env::temp_dir().join("kdcount_does_not_exist.raw");
    assert!(matches!(PointSet::open(&missing, 3), Err(Error::Io(_))));
}

#[test]
fn test_random_points_in_unit_cube() {
    let mut rng = StdRng::seed_from_u64(7);
    let points = PointSet::random(500, 4, &mut rng).unwrap();
    assert_eq!(points.len(), 500);
    assert_eq!(points.dim(), 4);
    assert!(points.coords().iter().all(|&c| (0.0..1.0).contains(&c)));
}
