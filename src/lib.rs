//! Reduces concrete SQL statements to parameter-free fingerprints suitable
//! for aggregating slow-query telemetry, plus a companion short identifier
//! hash derived from a fingerprint.
//!
//! The public surface is two pure functions: [`fingerprint`] (and its
//! options-threading sibling [`fingerprint_with_options`]) and [`id`].
//! Neither can fail — see `DESIGN.md` for the grounding of every rule
//! implemented in [`scanner`] against the teacher and the retrieved test
//! corpus.

mod hash;
mod options;
mod scanner;

pub use hash::id;
pub use options::{set_replace_numbers_in_words, FingerprintOptions};

/// Fingerprints `input` using the process-wide default
/// [`FingerprintOptions`] (see [`set_replace_numbers_in_words`]).
///
/// Prefer [`fingerprint_with_options`] at new call sites; this wrapper
/// exists only for compatibility with code that flips a global switch
/// instead of threading options through explicitly.
#[tracing::instrument(level = "trace", skip(input), fields(input_len = input.len()))]
pub fn fingerprint(input: &[u8]) -> Vec<u8> {
    fingerprint_with_options(input, FingerprintOptions::from_global())
}

/// Fingerprints `input` with an explicit [`FingerprintOptions`].
///
/// Never fails: malformed, unterminated, or adversarial input still
/// produces a best-effort fingerprint (see spec §7, Error Handling
/// Design — there is no fallible path here by design).
#[tracing::instrument(level = "trace", skip(input), fields(input_len = input.len()))]
pub fn fingerprint_with_options(input: &[u8], opts: FingerprintOptions) -> Vec<u8> {
    if let Some(admin) = admin_command(input) {
        return admin.to_vec();
    }
    if let Some(procname) = call_procedure(input) {
        let mut out = Vec::with_capacity(5 + procname.len());
        out.extend_from_slice(b"call ");
        out.extend_from_slice(&procname);
        return out;
    }
    if is_bare_use(input) {
        return b"use ?".to_vec();
    }

    scanner::scan(input, opts)
}

/// Returns the trimmed, case-preserved input when it begins (after leading
/// whitespace) with `administrator command:` — these are returned verbatim,
/// never scanned.
fn admin_command(input: &[u8]) -> Option<&[u8]> {
    const PREFIX: &[u8] = b"administrator command:";
    let start = skip_leading_ws(input);
    let rest = &input[start..];
    if rest.len() < PREFIX.len() {
        return None;
    }
    if !rest[..PREFIX.len()].eq_ignore_ascii_case(PREFIX) {
        return None;
    }
    let mut end = input.len();
    while end > start && matches!(input[end - 1], b' ' | b'\t' | b'\n' | b'\r') {
        end -= 1;
    }
    Some(&input[start..end])
}

/// If the first keyword is `CALL`, returns the lowercased procedure name
/// token that follows it. Everything after the name, including `(...)`, is
/// discarded by the caller.
fn call_procedure(input: &[u8]) -> Option<Vec<u8>> {
    let (word, after) = leading_word(input)?;
    if !word.eq_ignore_ascii_case(b"call") {
        return None;
    }
    let name_start = skip_leading_ws(&input[after..]) + after;
    let (name, _) = leading_word(&input[name_start..])?;
    Some(name.iter().map(|b| b.to_ascii_lowercase()).collect())
}

/// True when the first (and only meaningful) keyword of the statement is
/// `USE` — i.e. not `... FROM t USE INDEX(...)`, which is a mid-statement
/// index hint and must be scanned normally.
fn is_bare_use(input: &[u8]) -> bool {
    let Some((word, _after)) = leading_word(input) else {
        return false;
    };
    word.eq_ignore_ascii_case(b"use")
}

fn skip_leading_ws(input: &[u8]) -> usize {
    let mut i = 0;
    while i < input.len() && matches!(input[i], b' ' | b'\t' | b'\n' | b'\r') {
        i += 1;
    }
    i
}

/// Returns the first identifier-like word in `input` (after skipping
/// leading whitespace) and the index just past it, or `None` if `input`
/// doesn't start with a word character once whitespace is skipped.
fn leading_word(input: &[u8]) -> Option<(&[u8], usize)> {
    let start = skip_leading_ws(input);
    if start >= input.len() {
        return None;
    }
    let first = input[start];
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut end = start;
    while end < input.len() && (input[end].is_ascii_alphanumeric() || input[end] == b'_') {
        end += 1;
    }
    Some((&input[start..end], end))
}
