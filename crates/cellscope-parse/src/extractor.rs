//! Reference extraction.
//!
//! Turns a formula string into the ordered, de-duplicated set of cell and
//! range references it reads. Extraction never fails: fragments that do not
//! parse as references are skipped, and a non-formula input yields an empty
//! sequence.

use std::collections::HashSet;

use cellscope_common::{split_sheet_prefix, take_a1, CellRef, Coord, RefKind};

use crate::scanner::scan;

/// Extract the references a formula reads, resolved against `home_sheet`.
///
/// - bare `A1` resolves to `home_sheet`
/// - `Sheet!A1` / `'Sheet Name'!A1` resolve to the named sheet, quotes
///   stripped
/// - `A1:A10` stays a range reference; callers decide how to walk it
/// - `[Book2.xlsx]Sheet!A1` is flagged external and not resolved further
/// - `$` anchors do not affect identity
///
/// Output order is first-occurrence order, which makes re-extraction from the
/// same formula text idempotent.
pub fn extract_references(formula: &str, home_sheet: &str) -> Vec<CellRef> {
    let outcome = scan(formula);
    let mut seen = HashSet::new();
    let mut refs = Vec::new();
    for candidate in &outcome.candidates {
        if let Some(mut reference) = parse_candidate(candidate, home_sheet) {
            reference.cross_sheet =
                reference.is_external() || reference.sheet != home_sheet;
            if seen.insert(reference.clone()) {
                refs.push(reference);
            }
        }
    }
    refs
}

/// Parse one operand token into a reference, or `None` when it is not one
/// (numbers, booleans, defined names, malformed fragments).
fn parse_candidate(token: &str, home_sheet: &str) -> Option<CellRef> {
    let (workbook, sheet, cell_part) = match split_sheet_prefix(token) {
        Some((prefix, cell_part)) => {
            let (workbook, sheet) = split_workbook(&prefix)?;
            (workbook, sheet, cell_part)
        }
        None => {
            if token.contains('[') || token.contains('\'') {
                // A bracket or quote without a resolvable sheet prefix is a
                // fragment we cannot attribute; skip it.
                return None;
            }
            (None, home_sheet.to_string(), token)
        }
    };

    let (start, rest) = take_a1(cell_part).ok()?;
    let kind = if let Some(end_text) = rest.strip_prefix(':') {
        let (end, tail) = take_a1(end_text).ok()?;
        if !tail.is_empty() {
            return None;
        }
        let top = Coord::new(start.row.min(end.row), start.col.min(end.col));
        let bottom = Coord::new(start.row.max(end.row), start.col.max(end.col));
        RefKind::Range(top, bottom)
    } else if rest.is_empty() {
        RefKind::Cell(start)
    } else {
        return None;
    };

    Some(CellRef {
        sheet,
        kind,
        workbook,
        cross_sheet: false,
    })
}

/// Split a `[Book2.xlsx]Sheet Name` prefix into workbook and sheet parts.
fn split_workbook(prefix: &str) -> Option<(Option<String>, String)> {
    match prefix.strip_prefix('[') {
        Some(rest) => {
            let close = rest.find(']')?;
            let workbook = &rest[..close];
            let sheet = &rest[close + 1..];
            if workbook.is_empty() || sheet.is_empty() {
                return None;
            }
            Some((Some(workbook.to_string()), sheet.to_string()))
        }
        None => {
            if prefix.is_empty() {
                return None;
            }
            Some((None, prefix.to_string()))
        }
    }
}
