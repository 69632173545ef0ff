//! Formula complexity classification.
//!
//! Advisory metadata for the UI; it never gates expansion. The policy is
//! deterministic and monotonic: raising any of the inputs (functions,
//! references, nesting) never lowers the class.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::extractor::extract_references;
use crate::scanner::scan;

/// Functions that pull in lookup tables or conditional aggregation; their
/// presence alone lifts a formula out of the `simple` class.
static HEAVY_FUNCTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "SUMIF", "SUMIFS", "COUNTIF", "COUNTIFS", "AVERAGEIF", "AVERAGEIFS", "VLOOKUP",
        "HLOOKUP", "XLOOKUP", "LOOKUP", "INDEX", "MATCH", "INDIRECT", "OFFSET", "IFERROR",
    ]
    .into_iter()
    .collect()
});

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        })
    }
}

/// What the classifier saw in one formula.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ComplexityReport {
    pub complexity: Complexity,
    pub reference_count: usize,
    pub function_count: usize,
    pub max_nesting: u32,
    pub main_function: Option<String>,
    pub has_cross_sheet: bool,
    pub has_external: bool,
    /// Whether drilling into this formula would show anything: it reads at
    /// least one reference and is not cut off by an external workbook.
    pub can_drill_down: bool,
}

/// Classify a formula resolved against its home sheet.
pub fn classify(formula: &str, home_sheet: &str) -> ComplexityReport {
    let outcome = scan(formula);
    let references = extract_references(formula, home_sheet);

    let distinct: HashSet<&str> = outcome.functions.iter().map(String::as_str).collect();
    let function_count = distinct.len();
    let heavy = distinct
        .iter()
        .any(|name| HEAVY_FUNCTIONS.contains(*name));
    let reference_count = references.len();
    let has_external = references.iter().any(|r| r.is_external());
    let has_cross_sheet = references.iter().any(|r| r.cross_sheet);

    let complexity = if function_count > 3 || reference_count > 10 || outcome.max_nesting > 3 {
        Complexity::Complex
    } else if function_count <= 1 && reference_count <= 3 && outcome.max_nesting <= 2 && !heavy {
        Complexity::Simple
    } else {
        Complexity::Moderate
    };

    ComplexityReport {
        complexity,
        reference_count,
        function_count,
        max_nesting: outcome.max_nesting,
        main_function: outcome.functions.into_iter().next(),
        has_cross_sheet,
        has_external,
        can_drill_down: reference_count > 0 && !has_external,
    }
}
