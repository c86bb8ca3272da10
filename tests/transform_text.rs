//! Plain-text transform format against JSON-described cases.

use imgalign::{format_transform, parse_transform, AffineTransform2D, AlignError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ParseCase {
    text: String,
    /// Column order m00, m10, m01, m11, m02, m12.
    #[serde(default)]
    expected: Option<[f64; 6]>,
    #[serde(default)]
    error_line: Option<usize>,
}

const CASES: &str = r#"[
    { "text": "1.0000,\t0.0000,\t12.5000,\n0.0000,\t1.0000,\t-3.2500", "expected": [1, 0, 0, 1, 12.5, -3.25] },
    { "text": "0.5 -0.25 4\n0.25 0.5 8\n", "expected": [0.5, 0.25, -0.25, 0.5, 4, 8] },
    { "text": "\n  2, 0, 1,\n\n  0, 3, 2,  \n", "expected": [2, 0, 0, 3, 1, 2] },
    { "text": "1,0,0\n0,1", "error_line": 2 },
    { "text": "1,0,abc\n0,1,0", "error_line": 1 },
    { "text": "1,0,0\n0,1,0\n0,0,1", "error_line": 3 },
    { "text": "", "error_line": 1 }
]"#;

#[test]
fn parse_cases_from_json() {
    let cases: Vec<ParseCase> = serde_json::from_str(CASES).unwrap();
    for case in cases {
        match (case.expected, case.error_line) {
            (Some([m00, m10, m01, m11, m02, m12]), _) => {
                let parsed = parse_transform(&case.text).unwrap();
                assert_eq!(
                    parsed,
                    AffineTransform2D::new(m00, m10, m01, m11, m02, m12),
                    "{:?}",
                    case.text
                );
            }
            (None, Some(line)) => match parse_transform(&case.text) {
                Err(AlignError::TransformParse { line: got, .. }) => {
                    assert_eq!(got, line, "{:?}", case.text)
                }
                other => panic!("expected parse error for {:?}, got {other:?}", case.text),
            },
            (None, None) => panic!("case without expectation"),
        }
    }
}

#[test]
fn display_and_from_str_round_trip() {
    let t = AffineTransform2D::rotation(0.3)
        .pre_concatenate(&AffineTransform2D::translation(-15.125, 240.5));
    let text = t.to_string();
    assert_eq!(text, format_transform(&t));
    assert_eq!(text.lines().count(), 2);
    let back: AffineTransform2D = text.parse().unwrap();
    assert!(back.approx_eq(&t, 1e-4));
}
