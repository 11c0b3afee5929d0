//! Post-assembly audit for celebrity-specific prompt content.
//!
//! Unlike the assembler's sanitizer this never rewrites anything; it only
//! reports which kinds of residual description a prompt still carries so
//! the caller can log them.

use std::sync::LazyLock;

use regex::Regex;

/// Residual pattern plus the warning reported when it matches.
const SAFETY_CHECKS: &[(&str, &str)] = &[
    (
        r"(?i)\b(?:his|her)\s+(?:hair|eyes|face|smile|body|build)\b",
        "Physical description of celebrity",
    ),
    (
        r"(?i)\b(?:wearing|dressed\s+in)\s+(?:his|her)\s+(?:signature|trademark)\b",
        "Signature look description",
    ),
    (
        r"(?i)\b(?:as\s+seen\s+in|from\s+the\s+movie|portraying)\b",
        "Specific role reference",
    ),
    (
        r"(?i)\b(?:younger|older|aged|youthful)\s+(?:version|look)\b",
        "Age-specific description",
    ),
];

static SAFETY_RES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SAFETY_CHECKS
        .iter()
        .map(|(pattern, warning)| (Regex::new(pattern).expect("valid regex"), *warning))
        .collect()
});

/// Return one warning per residual pattern found in `prompt`.
///
/// An empty result means the prompt passed the audit.
pub fn prompt_safety_warnings(prompt: &str) -> Vec<&'static str> {
    SAFETY_RES
        .iter()
        .filter(|(re, _)| re.is_match(prompt))
        .map(|(_, warning)| *warning)
        .collect()
}
