//! Shared formula expansion

/// Shift the relative references in a formula by `(rows, cols)`
///
/// Used to expand a shared formula from its anchor cell to the cells that
/// only carry the shared index. Absolute (`$`) parts stay put; text inside
/// string literals and quoted sheet names is left alone. References that
/// would shift before `A1` are returned unchanged.
pub(crate) fn shift_formula(formula: &str, rows: i64, cols: i64) -> String {
    if rows == 0 && cols == 0 {
        return formula.to_string();
    }

    let chars: Vec<char> = formula.chars().collect();
    let mut out = String::with_capacity(formula.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' {
            let quote = c;
            out.push(c);
            i += 1;
            while i < chars.len() {
                out.push(chars[i]);
                if chars[i] == quote {
                    // Doubled quote is an escaped quote
                    if chars.get(i + 1) == Some(&quote) {
                        out.push(quote);
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            continue;
        }

        let boundary = i == 0 || !is_ident_char(chars[i - 1]);
        if boundary && (c == '$' || c.is_ascii_alphabetic()) {
            if let Some((len, shifted)) = shift_reference(&chars[i..], rows, cols) {
                out.push_str(&shifted);
                i += len;
                continue;
            }
            // Not a reference: copy the whole identifier so its tail is not
            // mistaken for one
            while i < chars.len() && (is_ident_char(chars[i]) || chars[i] == '$') {
                out.push(chars[i]);
                i += 1;
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Parse `[$]COL[$]ROW` at the start of `chars`; returns consumed length and
/// the shifted text.
fn shift_reference(chars: &[char], rows: i64, cols: i64) -> Option<(usize, String)> {
    let mut i = 0;
    let col_abs = chars.first() == Some(&'$');
    if col_abs {
        i += 1;
    }
    let col_start = i;
    while i < chars.len() && chars[i].is_ascii_alphabetic() {
        i += 1;
    }
    let letters: String = chars[col_start..i].iter().collect();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }

    let row_abs = chars.get(i) == Some(&'$');
    if row_abs {
        i += 1;
    }
    let row_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i == row_start {
        return None;
    }
    // A following identifier char or call paren means this is a name like LOG10(
    if let Some(&next) = chars.get(i) {
        if is_ident_char(next) || next == '(' || next == '!' {
            return None;
        }
    }

    let row: i64 = chars[row_start..i].iter().collect::<String>().parse().ok()?;
    let col = i64::from(sheetwright_core::CellAddress::letters_to_column(&letters).ok()?);

    let new_row = if row_abs { row } else { row + rows };
    let new_col = if col_abs { col } else { col + cols };
    if new_row < 1 || new_col < 0 || new_col >= i64::from(sheetwright_core::MAX_COLS) {
        return Some((i, chars[..i].iter().collect()));
    }

    Some((
        i,
        format!(
            "{}{}{}{}",
            if col_abs { "$" } else { "" },
            sheetwright_core::CellAddress::column_to_letters(new_col as u16),
            if row_abs { "$" } else { "" },
            new_row
        ),
    ))
}
