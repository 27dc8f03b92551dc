//! BIFF8 formula decompiler.
//!
//! A cell formula is stored as a token stream (`rgce`) in reverse Polish
//! order. Decompiling runs the stream against a stack of text fragments and
//! yields the formula in A1 notation without the leading `=`.
//!
//! Covered: literals, operators, parentheses, cell and area references
//! (including references into other sheets of the same workbook), the
//! attribute tokens Excel inserts around `IF`/`CHOOSE`/`SUM`, and the
//! built-in functions listed in [`FUNCTIONS`]. Shared and array formulas,
//! defined names and external references are reported as unsupported, and
//! the reader keeps only the cached result for such cells.

use sheetwright_core::CellAddress;

use crate::biff::parser::ByteReader;
use crate::biff::strings::read_short_string;
use crate::error::{XlsError, XlsResult};

/// Built-in functions: (`iftab`, name, fixed argument count).
///
/// `None` marks a variable-argument function, which only ever appears in a
/// `PtgFuncVar` token carrying its own count.
pub const FUNCTIONS: &[(u16, &str, Option<u8>)] = &[
    (0, "COUNT", None),
    (1, "IF", None),
    (2, "ISNA", Some(1)),
    (3, "ISERROR", Some(1)),
    (4, "SUM", None),
    (5, "AVERAGE", None),
    (6, "MIN", None),
    (7, "MAX", None),
    (8, "ROW", None),
    (9, "COLUMN", None),
    (10, "NA", Some(0)),
    (12, "STDEV", None),
    (19, "PI", Some(0)),
    (20, "SQRT", Some(1)),
    (21, "EXP", Some(1)),
    (22, "LN", Some(1)),
    (23, "LOG10", Some(1)),
    (24, "ABS", Some(1)),
    (25, "INT", Some(1)),
    (26, "SIGN", Some(1)),
    (27, "ROUND", Some(2)),
    (28, "LOOKUP", None),
    (29, "INDEX", None),
    (30, "REPT", Some(2)),
    (31, "MID", Some(3)),
    (32, "LEN", Some(1)),
    (33, "VALUE", Some(1)),
    (34, "TRUE", Some(0)),
    (35, "FALSE", Some(0)),
    (36, "AND", None),
    (37, "OR", None),
    (38, "NOT", Some(1)),
    (39, "MOD", Some(2)),
    (48, "TEXT", Some(2)),
    (63, "RAND", Some(0)),
    (64, "MATCH", None),
    (65, "DATE", Some(3)),
    (66, "TIME", Some(3)),
    (67, "DAY", Some(1)),
    (68, "MONTH", Some(1)),
    (69, "YEAR", Some(1)),
    (70, "WEEKDAY", None),
    (71, "HOUR", Some(1)),
    (72, "MINUTE", Some(1)),
    (73, "SECOND", Some(1)),
    (74, "NOW", Some(0)),
    (76, "ROWS", Some(1)),
    (77, "COLUMNS", Some(1)),
    (78, "OFFSET", None),
    (82, "SEARCH", None),
    (100, "CHOOSE", None),
    (101, "HLOOKUP", None),
    (102, "VLOOKUP", None),
    (109, "LOG", None),
    (111, "CHAR", Some(1)),
    (112, "LOWER", Some(1)),
    (113, "UPPER", Some(1)),
    (114, "PROPER", Some(1)),
    (115, "LEFT", None),
    (116, "RIGHT", None),
    (117, "EXACT", Some(2)),
    (118, "TRIM", Some(1)),
    (119, "REPLACE", Some(4)),
    (120, "SUBSTITUTE", None),
    (121, "CODE", Some(1)),
    (124, "FIND", None),
    (126, "ISERR", Some(1)),
    (127, "ISTEXT", Some(1)),
    (128, "ISNUMBER", Some(1)),
    (129, "ISBLANK", Some(1)),
    (169, "COUNTA", None),
    (183, "PRODUCT", None),
    (197, "TRUNC", None),
    (212, "ROUNDUP", Some(2)),
    (213, "ROUNDDOWN", Some(2)),
    (221, "TODAY", Some(0)),
    (227, "MEDIAN", None),
    (228, "SUMPRODUCT", None),
    (285, "FLOOR", Some(2)),
    (288, "CEILING", Some(2)),
    (336, "CONCATENATE", None),
    (337, "POWER", Some(2)),
    (344, "SUBTOTAL", None),
    (345, "SUMIF", None),
    (346, "COUNTIF", None),
    (347, "COUNTBLANK", Some(1)),
    (480, "IFERROR", Some(2)),
    (483, "AVERAGEIF", None),
];

fn function(iftab: u16) -> XlsResult<(&'static str, Option<u8>)> {
    FUNCTIONS
        .iter()
        .find(|(id, _, _)| *id == iftab)
        .map(|(_, name, arity)| (*name, *arity))
        .ok_or_else(|| unsupported(format!("function #{iftab}")))
}

fn unsupported(what: String) -> XlsError {
    XlsError::Parse(format!("unsupported formula token: {what}"))
}

/// Decompile a formula token stream.
///
/// `sheet_refs` maps an EXTERNSHEET index to the name of the sheet it points
/// at, or `None` when it points outside the workbook.
pub fn decompile(rgce: &[u8], sheet_refs: &[Option<String>]) -> XlsResult<String> {
    let mut r = ByteReader::new(rgce);
    let mut stack: Vec<String> = Vec::new();

    while !r.is_empty() {
        let ptg = r.u8()?;
        // Reference, value and array classes share one base token
        let base = if ptg >= 0x40 { (ptg & 0x1F) | 0x20 } else { ptg };

        match base {
            0x03..=0x11 => {
                let op = binary_operator(base);
                let rhs = pop(&mut stack)?;
                let lhs = pop(&mut stack)?;
                stack.push(format!("{lhs}{op}{rhs}"));
            }
            0x12 => {
                let operand = pop(&mut stack)?;
                stack.push(format!("+{operand}"));
            }
            0x13 => {
                let operand = pop(&mut stack)?;
                stack.push(format!("-{operand}"));
            }
            0x14 => {
                let operand = pop(&mut stack)?;
                stack.push(format!("{operand}%"));
            }
            0x15 => {
                let inner = pop(&mut stack)?;
                stack.push(format!("({inner})"));
            }
            0x16 => stack.push(String::new()),
            0x17 => {
                let text = read_short_string(&mut r)?;
                stack.push(format!("\"{}\"", text.replace('"', "\"\"")));
            }
            0x19 => attribute(&mut r, &mut stack)?,
            0x1C => stack.push(error_literal(r.u8()?).to_string()),
            0x1D => stack.push(if r.u8()? != 0 { "TRUE" } else { "FALSE" }.to_string()),
            0x1E => stack.push(r.u16()?.to_string()),
            0x1F => stack.push(format_number(r.f64()?)),
            0x21 => {
                let (name, arity) = function(r.u16()?)?;
                let argc = arity.ok_or_else(|| unsupported(format!("{name} without count")))?;
                call(&mut stack, name, argc as usize)?;
            }
            0x22 => {
                let argc = (r.u8()? & 0x7F) as usize;
                let iftab = r.u16()? & 0x7FFF;
                let (name, _) = function(iftab)?;
                call(&mut stack, name, argc)?;
            }
            0x24 => {
                let row = r.u16()?;
                let col = r.u16()?;
                stack.push(cell_ref(row, col));
            }
            0x25 => {
                let area = area_ref(&mut r)?;
                stack.push(area);
            }
            0x26..=0x28 => r.skip(6)?,
            0x29 => r.skip(2)?,
            0x2A => {
                r.skip(4)?;
                stack.push("#REF!".to_string());
            }
            0x2B => {
                r.skip(8)?;
                stack.push("#REF!".to_string());
            }
            0x3A => {
                let prefix = sheet_prefix(r.u16()?, sheet_refs)?;
                let row = r.u16()?;
                let col = r.u16()?;
                stack.push(format!("{prefix}{}", cell_ref(row, col)));
            }
            0x3B => {
                let prefix = sheet_prefix(r.u16()?, sheet_refs)?;
                let area = area_ref(&mut r)?;
                stack.push(format!("{prefix}{area}"));
            }
            0x3C | 0x3D => {
                let prefix = sheet_prefix(r.u16()?, sheet_refs)?;
                r.skip(if base == 0x3C { 4 } else { 8 })?;
                stack.push(format!("{prefix}#REF!"));
            }
            _ => return Err(unsupported(format!("0x{ptg:02X}"))),
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(formula), true) => Ok(formula),
        _ => Err(XlsError::Parse("unbalanced formula token stream".into())),
    }
}

fn pop(stack: &mut Vec<String>) -> XlsResult<String> {
    stack
        .pop()
        .ok_or_else(|| XlsError::Parse("formula operand stack underflow".into()))
}

fn call(stack: &mut Vec<String>, name: &str, argc: usize) -> XlsResult<()> {
    if stack.len() < argc {
        return Err(XlsError::Parse(format!(
            "{name} expects {argc} arguments, stack has {}",
            stack.len()
        )));
    }
    let args = stack.split_off(stack.len() - argc);
    stack.push(format!("{name}({})", args.join(",")));
    Ok(())
}

fn attribute(r: &mut ByteReader<'_>, stack: &mut Vec<String>) -> XlsResult<()> {
    let kind = r.u8()?;
    match kind {
        // tAttrChoose: jump table of (count + 1) offsets
        0x04 => {
            let count = r.u16()? as usize;
            r.skip((count + 1) * 2)?;
        }
        // tAttrSum: SUM with a single argument
        0x10 => {
            r.skip(2)?;
            call(stack, "SUM", 1)?;
        }
        // volatile, if, goto, baxcel, spaces
        _ => r.skip(2)?,
    }
    Ok(())
}

fn binary_operator(ptg: u8) -> &'static str {
    match ptg {
        0x03 => "+",
        0x04 => "-",
        0x05 => "*",
        0x06 => "/",
        0x07 => "^",
        0x08 => "&",
        0x09 => "<",
        0x0A => "<=",
        0x0B => "=",
        0x0C => ">=",
        0x0D => ">",
        0x0E => "<>",
        0x0F => " ",
        0x10 => ",",
        _ => ":",
    }
}

/// Error literal for a BIFF error code
pub fn error_literal(code: u8) -> &'static str {
    match code {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#VALUE!",
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Render a row and a column field (bit 14: column relative, bit 15: row
/// relative) in A1 notation.
fn cell_ref(row: u16, col_field: u16) -> String {
    let col = col_field & 0x3FFF;
    let col_abs = if col_field & 0x4000 == 0 { "$" } else { "" };
    let row_abs = if col_field & 0x8000 == 0 { "$" } else { "" };
    format!(
        "{col_abs}{}{row_abs}{}",
        CellAddress::column_to_letters(col),
        u32::from(row) + 1
    )
}

fn area_ref(r: &mut ByteReader<'_>) -> XlsResult<String> {
    let first_row = r.u16()?;
    let last_row = r.u16()?;
    let first_col = r.u16()?;
    let last_col = r.u16()?;
    Ok(format!(
        "{}:{}",
        cell_ref(first_row, first_col),
        cell_ref(last_row, last_col)
    ))
}

fn sheet_prefix(ixti: u16, sheet_refs: &[Option<String>]) -> XlsResult<String> {
    let name = sheet_refs
        .get(ixti as usize)
        .and_then(Option::as_deref)
        .ok_or_else(|| unsupported(format!("external sheet reference #{ixti}")))?;
    Ok(format!("{}!", quote_sheet_name(name)))
}

/// Quote a sheet name for use in a reference when it needs quoting
pub fn quote_sheet_name(name: &str) -> String {
    let plain = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}
