//! Scene assembler: structured scene descriptor -> final prompt pair.
//!
//! Components are joined in a fixed order with [`PROMPT_DELIMITER`]:
//!
//! 1. character reference (if any)
//! 2. subject + action clause
//! 3. environment (`in ...`)
//! 4. mood (if any)
//! 5. style
//! 6. lighting (`with ...`)
//! 7. quality/motion boilerplate
//! 8. consistency keywords
//!
//! The joined prompt is then sanitized so that no clause describes the
//! physical appearance of a referenced person. Everything here is pure and
//! deterministic.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;
use crate::story::{SceneDescriptor, ScenePrompt};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Separator between prompt components.
pub const PROMPT_DELIMITER: &str = ", ";

/// Quality and motion keywords appended to every scene prompt.
pub const QUALITY_BOILERPLATE: &str =
    "photorealistic, cinematic, 8k, high detail, natural dynamic motion";

/// Negative prompt used when the descriptor does not provide one.
pub const DEFAULT_NEGATIVE_PROMPT: &str =
    "blurry, low quality, distorted, deformed, cropped, out of frame, watermark, text";

/// Minimum number of words in an action clause (verb + target).
pub const MIN_ACTION_WORDS: usize = 2;

/// Substring patterns that smuggle a referenced person's appearance into a
/// clause. Each match runs up to (not including) the next delimiter.
const LEAK_PATTERNS: &[&str] = &[
    r"(?i)(?:^|\s+)with\s+(?:his|her)\s+(?:signature|distinctive|characteristic)\s+[^,]+",
    r"(?i)(?:^|\s+)featuring\s+(?:his|her)\s+[^,]*?\b(?:appearance|look|style)\b",
    r"(?i)(?:^|\s+)(?:wearing|sporting)\s+(?:his|her)\s+[^,]+",
    r"(?i)(?:^|\s+)(?:known\s+for|recognizable\s+by)\s+[^,]+",
    r"(?i)(?:^|\s+)with\s+(?:intense|piercing|striking)\s+[^,]+",
];

/// A whole clause that starts with a possessive pronoun followed by a
/// physical feature, e.g. "her flowing red hair" or "with his chiseled jawline".
const PHYSICAL_CLAUSE_PATTERN: &str = r"(?i)^(?:(?:with|featuring|showing|and)\s+)?(?:his|her)\s+(?:[\w-]+\s+){0,3}?(?:hair|eyes|face|smile|body|build|skin|jawline|beard|physique|features|figure|complexion)\b";

static LEAK_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    LEAK_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
});

static PHYSICAL_CLAUSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PHYSICAL_CLAUSE_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Convert a structured scene descriptor into its final prompt and
/// negative prompt.
///
/// Fails with [`CoreError::Validation`] when the action is not a
/// multi-word phrase.
pub fn assemble_scene(scene: &SceneDescriptor) -> Result<ScenePrompt, CoreError> {
    validate_action(&scene.action)?;

    let mut components: Vec<String> = Vec::with_capacity(8);

    if let Some(reference) = non_blank(scene.character_reference.as_deref()) {
        components.push(reference.to_string());
    }

    let core_clause = match non_blank(Some(scene.subject.as_str())) {
        Some(subject) => format!("{subject} {}", scene.action.trim()),
        None => scene.action.trim().to_string(),
    };
    components.push(core_clause);

    if let Some(environment) = non_blank(Some(scene.environment.as_str())) {
        components.push(with_preposition("in", environment));
    }
    if let Some(mood) = non_blank(scene.mood.as_deref()) {
        components.push(mood.to_string());
    }
    if let Some(style) = non_blank(Some(scene.style.as_str())) {
        components.push(style.to_string());
    }
    if let Some(lighting) = non_blank(Some(scene.lighting.as_str())) {
        components.push(with_preposition("with", lighting));
    }

    components.push(QUALITY_BOILERPLATE.to_string());

    let keywords: Vec<&str> = scene
        .consistency_keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if !keywords.is_empty() {
        components.push(keywords.join(PROMPT_DELIMITER));
    }

    let prompt = sanitize_prompt(&components.join(PROMPT_DELIMITER));

    let negative_prompt = match non_blank(Some(scene.negative_prompt.as_str())) {
        Some(negative) => negative.to_string(),
        None => DEFAULT_NEGATIVE_PROMPT.to_string(),
    };

    Ok(ScenePrompt {
        prompt,
        negative_prompt,
    })
}

/// Reject actions that are not a multi-word phrase.
pub fn validate_action(action: &str) -> Result<(), CoreError> {
    let words = action.split_whitespace().count();
    if words < MIN_ACTION_WORDS {
        return Err(CoreError::Validation(format!(
            "Scene action '{}' must be a phrase of at least {MIN_ACTION_WORDS} words (verb and target)",
            action.trim()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sanitization
// ---------------------------------------------------------------------------

/// Strip appearance-leaking phrases and clauses, then normalize delimiters.
///
/// The result never contains empty clauses, doubled delimiters, or a
/// trailing delimiter.
pub fn sanitize_prompt(prompt: &str) -> String {
    let mut text = join_clauses(prompt.split(','));
    loop {
        let stripped = LEAK_RES
            .iter()
            .fold(text.clone(), |acc, re| re.replace_all(&acc, "").into_owned());
        let normalized = join_clauses(stripped.split(','));
        if normalized == text {
            break;
        }
        text = normalized;
    }

    join_clauses(
        text.split(',')
            .filter(|clause| !PHYSICAL_CLAUSE_RE.is_match(clause.trim())),
    )
}

/// True if `prompt` still contains a phrase or clause the sanitizer removes.
pub fn contains_appearance_leak(prompt: &str) -> bool {
    LEAK_RES.iter().any(|re| re.is_match(prompt))
        || prompt
            .split(',')
            .map(str::trim)
            .any(|clause| PHYSICAL_CLAUSE_RE.is_match(clause))
}

fn join_clauses<'a>(clauses: impl Iterator<Item = &'a str>) -> String {
    clauses
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .collect::<Vec<_>>()
        .join(PROMPT_DELIMITER)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Prefix `text` with `preposition` unless it already starts with it.
fn with_preposition(preposition: &str, text: &str) -> String {
    let already = text
        .split_whitespace()
        .next()
        .is_some_and(|first| first.eq_ignore_ascii_case(preposition));
    if already {
        text.to_string()
    } else {
        format!("{preposition} {text}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
