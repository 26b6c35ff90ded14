use docextract::{
    scorer::{score, score_values, similarity},
    FieldValue,
};

#[test]
fn test_known_distances() {
    assert_eq!(score("abc", "abd"), 1);
    assert_eq!(score("", "abc"), 3);
    assert_eq!(score("kitten", "sitting"), 3);
    assert_eq!(score("42.50", "42.50"), 0);
}

#[test]
fn test_distance_counts_characters_not_bytes() {
    assert_eq!(score("café", "cafe"), 1);
    assert_eq!(score("日本", "日本語"), 1);
}

#[test]
fn test_metric_laws() {
    let samples = ["", "a", "abc", "ACME STORE", "ACME ST0RE SDN BHD", "42.50", "日本語"];
    for x in samples {
        assert_eq!(score(x, x), 0);
        for y in samples {
            assert_eq!(score(x, y), score(y, x));
            assert_eq!(score(x, y) == 0, x == y);
            for z in samples {
                assert!(score(x, z) <= score(x, y) + score(y, z));
            }
        }
    }
}

#[test]
fn test_absent_and_missing_values_compare_as_empty() {
    let present = FieldValue::Present("12.00".to_string());
    assert_eq!(score_values(Some(&present), Some("12.00")), 0);
    assert_eq!(score_values(Some(&FieldValue::Absent), Some("abc")), 3);
    assert_eq!(score_values(None, None), 0);
    assert_eq!(score_values(Some(&present), None), 5);
    // An empty string is a real value, and equal to a missing reference.
    let empty = FieldValue::Present(String::new());
    assert_eq!(score_values(Some(&empty), None), 0);
}

#[test]
fn test_similarity_is_normalized() {
    assert_eq!(similarity("", ""), 1.0);
    assert_eq!(similarity("abc", "abc"), 1.0);
    assert_eq!(similarity("abc", "xyz"), 0.0);
    let s = similarity("ACME STORE", "ACME ST0RE");
    assert!(s > 0.8 && s < 1.0);
}
