//! Number format codes and date detection

/// First id available for custom number formats
pub const FIRST_CUSTOM_FORMAT_ID: u32 = 164;

/// Get built-in format code by id
pub fn builtin_format_code(id: u32) -> Option<&'static str> {
    Some(match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

/// Whether a built-in format id is a date/time format
pub fn is_date_format_id(id: u32) -> bool {
    matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58)
}

/// Whether a format code renders its number as a date/time
///
/// Quoted literals, backslash escapes, and bracketed sections (colors,
/// conditions, locale tags) are skipped; elapsed-time brackets such as
/// `[h]` count as time tokens. Only the first section is inspected.
pub fn is_date_format_code(code: &str) -> bool {
    let section = code.split(';').next().unwrap_or("");
    if section.eq_ignore_ascii_case("general") {
        return false;
    }

    let mut chars = section.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let mut inner = String::new();
                for b in chars.by_ref() {
                    if b == ']' {
                        break;
                    }
                    inner.push(b);
                }
                let inner = inner.to_ascii_lowercase();
                if !inner.is_empty() && inner.chars().all(|ch| matches!(ch, 'h' | 'm' | 's')) {
                    return true;
                }
            }
            'y' | 'Y' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' | 'm' | 'M' => return true,
            _ => {}
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_codes() {
        assert_eq!(builtin_format_code(0), Some("General"));
        assert_eq!(builtin_format_code(14), Some("mm-dd-yy"));
        assert_eq!(builtin_format_code(100), None);
    }

    #[test]
    fn test_date_ids() {
        assert!(is_date_format_id(14));
        assert!(is_date_format_id(22));
        assert!(is_date_format_id(46));
        assert!(!is_date_format_id(0));
        assert!(!is_date_format_id(4));
        assert!(!is_date_format_id(49));
    }

    #[test]
    fn test_date_codes() {
        assert!(is_date_format_code("yyyy-mm-dd"));
        assert!(is_date_format_code("[$-409]mmmm d, yyyy"));
        assert!(is_date_format_code("[h]:mm"));
        assert!(is_date_format_code("dd/mm/yyyy;@"));

        assert!(!is_date_format_code("General"));
        assert!(!is_date_format_code("#,##0.00"));
        assert!(!is_date_format_code("[Red]0.00"));
        assert!(!is_date_format_code("0.00\" days\""));
        assert!(!is_date_format_code("\\d0"));
        assert!(!is_date_format_code("_-* #,##0_-"));
    }
}
