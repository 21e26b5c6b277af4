// Numeric parsing for survey values: decimals with either separator and
// sexagesimal angles
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref ANGLE_PATTERN: Regex = Regex::new(
        r#"^(?P<sign>[-+])?\s*(?P<deg>\d{1,3}(?:[.,]\d+)?)\s*°?\s*(?:(?P<min>\d{1,2}(?:[.,]\d+)?)\s*'\s*(?:(?P<sec>\d{1,2}(?:[.,]\d+)?)\s*"?)?)?\s*(?P<hemi>[NSEWLO])?$"#
    )
    .unwrap();
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AngleError {
    #[error("empty angle")]
    Empty,
    #[error("unrecognized angle notation: {0}")]
    Unrecognized(String),
    #[error("minutes or seconds out of range in {0}")]
    OutOfRange(String),
}

/// A parsed angle in signed decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedAngle {
    pub degrees: f64,
    /// Decimal digits of the least significant component written
    pub decimals: u8,
    pub hemisphere: Option<char>,
}

/// Rewrite a number written with comma or period separators into Rust's
/// float syntax.
///
/// When both separators appear the last one is the decimal mark. A single
/// separator is a decimal mark; repeated ones are thousands groupings.
pub fn canonical_decimal(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_end_matches(['.', ','])
        .replace(' ', "");
    let (sign, body) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed.strip_prefix('+').unwrap_or(trimmed.as_str())),
    };

    if body.is_empty()
        || !body.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
        || !body.starts_with(|c: char| c.is_ascii_digit())
    {
        return None;
    }

    let decimal_mark = decimal_mark(body);
    let mut out = String::with_capacity(body.len() + 1);
    out.push_str(sign);
    for (idx, c) in body.char_indices() {
        match c {
            '.' | ',' if Some(idx) == decimal_mark => out.push('.'),
            '.' | ',' => {}
            c => out.push(c),
        }
    }
    Some(out)
}

/// Byte index of the decimal separator, if the number has one
fn decimal_mark(body: &str) -> Option<usize> {
    let commas = body.matches(',').count();
    let periods = body.matches('.').count();
    match (commas, periods) {
        (0, 0) => None,
        (c, p) if c > 0 && p > 0 => body.rfind(['.', ',']),
        (1, 0) => body.find(','),
        (0, 1) => body.find('.'),
        _ => None,
    }
}

pub fn parse_decimal(raw: &str) -> Option<f64> {
    canonical_decimal(raw)?.parse::<f64>().ok()
}

/// Number of digits written after the decimal mark
pub fn decimal_places(raw: &str) -> u8 {
    canonical_decimal(raw)
        .and_then(|c| c.split_once('.').map(|(_, frac)| frac.len()))
        .map(|n| n.min(u8::MAX as usize) as u8)
        .unwrap_or(0)
}

/// Parse decimal degrees (`45,5°`) or degree-minute-second (`45°30'00"`)
/// notation. Southern and western hemispheres (`S`, `W`, `O`) are negative.
pub fn parse_angle(raw: &str) -> Result<ParsedAngle, AngleError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(AngleError::Empty);
    }
    let caps = ANGLE_PATTERN
        .captures(text)
        .ok_or_else(|| AngleError::Unrecognized(text.to_string()))?;

    let deg_raw = &caps["deg"];
    let minutes = caps.name("min").map(|m| m.as_str());
    let seconds = caps.name("sec").map(|m| m.as_str());

    // Fractional degrees followed by minutes is not a notation anyone writes
    if minutes.is_some() && (deg_raw.contains('.') || deg_raw.contains(',')) {
        return Err(AngleError::Unrecognized(text.to_string()));
    }

    let deg = parse_decimal(deg_raw).ok_or_else(|| AngleError::Unrecognized(text.to_string()))?;
    let min = match minutes {
        Some(m) => parse_decimal(m).ok_or_else(|| AngleError::Unrecognized(text.to_string()))?,
        None => 0.0,
    };
    let sec = match seconds {
        Some(s) => parse_decimal(s).ok_or_else(|| AngleError::Unrecognized(text.to_string()))?,
        None => 0.0,
    };
    if min >= 60.0 || sec >= 60.0 {
        return Err(AngleError::OutOfRange(text.to_string()));
    }

    let hemisphere = caps
        .name("hemi")
        .and_then(|h| h.as_str().chars().next());
    let negative = caps.name("sign").is_some_and(|s| s.as_str() == "-")
        ^ matches!(hemisphere, Some('S') | Some('W') | Some('O'));

    let magnitude = deg + min / 60.0 + sec / 3600.0;
    let decimals = decimal_places(seconds.or(minutes).unwrap_or(deg_raw));

    Ok(ParsedAngle {
        degrees: if negative { -magnitude } else { magnitude },
        decimals,
        hemisphere,
    })
}

/// Bring an azimuth into [0, 360)
pub fn normalize_azimuth(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Parse an azimuth and normalize it
pub fn parse_azimuth(raw: &str) -> Result<f64, AngleError> {
    parse_angle(raw).map(|angle| normalize_azimuth(angle.degrees))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_decimal_separators() {
        assert_eq!(canonical_decimal("7.456.789,123").as_deref(), Some("7456789.123"));
        assert_eq!(canonical_decimal("1,234.5").as_deref(), Some("1234.5"));
        assert_eq!(canonical_decimal("345,67").as_deref(), Some("345.67"));
        assert_eq!(canonical_decimal("345.67").as_deref(), Some("345.67"));
        assert_eq!(canonical_decimal("1.234.567").as_deref(), Some("1234567"));
        assert_eq!(canonical_decimal("-12,5").as_deref(), Some("-12.5"));
        assert_eq!(canonical_decimal("123,45,").as_deref(), Some("123.45"));
        assert_eq!(canonical_decimal("abc"), None);
        assert_eq!(canonical_decimal(""), None);
        assert_eq!(canonical_decimal(",5"), None);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("123,45"), Some(123.45));
        assert_eq!(parse_decimal("7.456.789,12"), Some(7456789.12));
        assert_eq!(parse_decimal("0"), Some(0.0));
    }

    #[test]
    fn test_decimal_places() {
        assert_eq!(decimal_places("345.678,901"), 3);
        assert_eq!(decimal_places("12"), 0);
        assert_eq!(decimal_places("1.234.567"), 0);
    }

    #[test]
    fn test_dms_to_decimal() {
        let angle = parse_angle("45°30'00\"").unwrap();
        assert!((angle.degrees - 45.5).abs() < f64::EPSILON);
        assert_eq!(angle.decimals, 0);
    }

    #[test]
    fn test_dms_with_fractional_seconds_and_hemisphere() {
        let angle = parse_angle("22°33'44,555\" S").unwrap();
        let expected = -(22.0 + 33.0 / 60.0 + 44.555 / 3600.0);
        assert!((angle.degrees - expected).abs() < 1e-12);
        assert_eq!(angle.decimals, 3);
        assert_eq!(angle.hemisphere, Some('S'));

        let west = parse_angle("-47°12'34,567\"").unwrap();
        assert!(west.degrees < 0.0);
    }

    #[test]
    fn test_decimal_degree_notation() {
        assert_eq!(parse_angle("123,25°").unwrap().degrees, 123.25);
        assert_eq!(parse_angle("90").unwrap().degrees, 90.0);
        assert_eq!(parse_angle("45°30'").unwrap().degrees, 45.5);
    }

    #[test]
    fn test_malformed_angles() {
        assert_eq!(parse_angle(""), Err(AngleError::Empty));
        assert!(matches!(parse_angle("45°75'00\""), Err(AngleError::OutOfRange(_))));
        assert!(matches!(parse_angle("45°30'61\""), Err(AngleError::OutOfRange(_))));
        assert!(matches!(parse_angle("XX°"), Err(AngleError::Unrecognized(_))));
        assert!(matches!(parse_angle("45,5°30'"), Err(AngleError::Unrecognized(_))));
    }

    #[test]
    fn test_normalize_azimuth() {
        assert_eq!(normalize_azimuth(360.0), 0.0);
        assert_eq!(normalize_azimuth(370.0), 10.0);
        assert_eq!(normalize_azimuth(-90.0), 270.0);
        assert_eq!(parse_azimuth("400°00'00\"").unwrap(), 40.0);
    }
}
