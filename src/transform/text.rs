//! Plain-text transform format.
//!
//! A transform is written as its two matrix rows, three numbers each:
//!
//! ```text
//! m00,	m01,	m02,
//! m10,	m11,	m12
//! ```
//!
//! Values are printed with four decimals. Parsing is lenient: commas, tabs and
//! other whitespace all separate values, a separator may trail a row, and
//! blank lines are ignored.

use std::fmt;
use std::str::FromStr;

use super::AffineTransform2D;
use crate::util::{AlignError, AlignResult};

/// Formats a transform as two rows of comma/tab separated values.
pub fn format_transform(transform: &AffineTransform2D) -> String {
    let [[m00, m01, m02], [m10, m11, m12]] = transform.to_row_major();
    format!("{m00:.4},\t{m01:.4},\t{m02:.4},\n{m10:.4},\t{m11:.4},\t{m12:.4}")
}

/// Parses the two-row text form of a transform.
pub fn parse_transform(text: &str) -> AlignResult<AffineTransform2D> {
    let rows: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect();
    if rows.len() != 2 {
        return Err(AlignError::TransformParse {
            line: rows.get(2).map_or(rows.len() + 1, |(line, _)| *line),
            reason: format!("expected 2 rows, found {}", rows.len()),
        });
    }

    let mut matrix = [[0.0f64; 3]; 2];
    for (row, (line, content)) in matrix.iter_mut().zip(rows) {
        let values: Vec<&str> = content
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .collect();
        if values.len() != 3 {
            return Err(AlignError::TransformParse {
                line,
                reason: format!("expected 3 values, found {}", values.len()),
            });
        }
        for (slot, token) in row.iter_mut().zip(values) {
            *slot = token.parse().map_err(|_| AlignError::TransformParse {
                line,
                reason: format!("`{token}` is not a number"),
            })?;
            if !slot.is_finite() {
                return Err(AlignError::TransformParse {
                    line,
                    reason: format!("`{token}` is not finite"),
                });
            }
        }
    }

    Ok(AffineTransform2D::from_row_major(matrix))
}

impl fmt::Display for AffineTransform2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_transform(self))
    }
}

impl FromStr for AffineTransform2D {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_transform(s)
    }
}

#[cfg(test)]
mod tests {
    use super::{format_transform, parse_transform};
    use crate::transform::AffineTransform2D;
    use crate::util::AlignError;

    #[test]
    fn formats_rows_with_tabs() {
        let t = AffineTransform2D::new(1.0, 0.5, -0.25, 2.0, 10.0, -3.0);
        assert_eq!(
            format_transform(&t),
            "1.0000,\t-0.2500,\t10.0000,\n0.5000,\t2.0000,\t-3.0000"
        );
    }

    #[test]
    fn parse_format_round_trip_within_precision() {
        let t = AffineTransform2D::new(0.98765, 0.123456, -0.17, 1.00001, 123.45678, -9.87654);
        let parsed = parse_transform(&format_transform(&t)).unwrap();
        assert!(parsed.approx_eq(&t, 1e-4));
    }

    #[test]
    fn parses_plain_comma_rows() {
        let t: AffineTransform2D = "1, 0, 5\n0, 1, 7\n".parse().unwrap();
        assert_eq!(t, AffineTransform2D::translation(5.0, 7.0));
    }

    #[test]
    fn reports_offending_line() {
        let err = parse_transform("1,0,0\n0,x,0").unwrap_err();
        assert_eq!(
            err,
            AlignError::TransformParse {
                line: 2,
                reason: "`x` is not a number".to_string(),
            }
        );
        assert!(matches!(
            parse_transform("1,0\n0,1,0"),
            Err(AlignError::TransformParse { line: 1, .. })
        ));
        assert!(parse_transform("1,0,0").is_err());
    }
}
