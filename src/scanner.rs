//! Single-pass scanner and structural rewriter.
//!
//! Reads the input one byte at a time, left to right, with no lookbehind
//! beyond the last emitted byte and the last completed word. This is the
//! bulk of the crate: see `DESIGN.md` for how each rule here traces back to
//! the teacher's `fingerprint.rs` and to the test corpus in
//! `examples/original_source/query_test.go`.

use tracing::trace;

use crate::options::FingerprintOptions;

/// Entry point used by [`crate::fingerprint_with_options`] once the prefix
/// shortcuts (`administrator command:`, `CALL`, `USE`) have been ruled out.
pub(crate) fn scan(input: &[u8], opts: FingerprintOptions) -> Vec<u8> {
    let mut output: Vec<u8> = Vec::with_capacity(input.len());
    let mut state = RewriteState::default();
    let len = input.len();
    let mut i = 0usize;

    while i < len {
        let b = input[i];
        match b {
            b' ' | b'\t' | b'\n' | b'\r' => {
                emit_space(&mut output);
                i += 1;
            }

            b'\'' => {
                let end = scan_quoted(input, i + 1, b'\'');
                output.push(b'?');
                state.note_literal(b'?');
                i = end;
            }
            b'"' => {
                let end = scan_quoted(input, i + 1, b'"');
                output.push(b'?');
                state.note_literal(b'?');
                i = end;
            }
            b'`' => {
                let end = scan_backtick(input, i + 1);
                output.extend_from_slice(&input[i..end]);
                state.note_literal(*output.last().unwrap());
                i = end;
            }

            b'-' if is_line_comment_start(input, i) => {
                let after_nl = skip_line_comment(input, i);
                close_line_comment(&mut output, &mut state, input, after_nl);
                i = after_nl;
            }
            b'#' => {
                let after_nl = skip_line_comment(input, i);
                close_line_comment(&mut output, &mut state, input, after_nl);
                i = after_nl;
            }
            b'/' if i + 1 < len && input[i + 1] == b'*' => {
                if i + 2 < len && input[i + 2] == b'!' {
                    let end = skip_block_comment(input, i);
                    echo_hint_comment(&mut output, &mut state, &input[i..end]);
                    i = end;
                } else {
                    let was_empty = output.is_empty();
                    let end = skip_block_comment(input, i);
                    if !was_empty {
                        emit_space(&mut output);
                    }
                    state.last_word = None;
                    i = end;
                }
            }

            b'(' => {
                i = handle_open_paren(input, i, &mut output, &mut state);
            }

            b'0'..=b'9' => {
                let end = scan_number(input, i);
                if end < len && is_ident_continue(input[end]) {
                    let word_end = scan_word(input, i);
                    finish_word(&mut output, &mut state, &input[i..word_end], true, opts);
                    i = word_end;
                } else {
                    output.push(b'?');
                    state.note_literal(b'?');
                    i = end;
                }
            }
            b'.' if i + 1 < len && input[i + 1].is_ascii_digit() => {
                let end = scan_number(input, i);
                output.push(b'?');
                state.note_literal(b'?');
                i = end;
            }
            b'+' | b'-' if sign_starts_number(input, i, &state) => {
                let end = scan_number(input, i);
                output.push(b'?');
                state.note_literal(b'?');
                i = end;
            }

            b'x' | b'X' | b'b' | b'B' if i + 1 < len && input[i + 1] == b'\'' => {
                let end = scan_quoted(input, i + 2, b'\'');
                output.push(b'?');
                state.note_literal(b'?');
                i = end;
            }

            _ if is_ident_start(b) => {
                let end = scan_word(input, i);
                finish_word(&mut output, &mut state, &input[i..end], false, opts);
                i = end;
            }

            other => {
                output.push(other);
                state.note_literal(other);
                if other == b';' {
                    state.order_by_mode = false;
                    state.order_phase = OrderPhase::None;
                    state.dup_phase = DupPhase::None;
                }
                i += 1;
            }
        }
    }

    if output.last() == Some(&b' ') {
        output.pop();
    }

    trace!(out_len = output.len(), "scan complete");
    output
}

// ---------------------------------------------------------------------
// Structural state
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderPhase {
    None,
    SeenOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DupPhase {
    None,
    SeenOn,
    SeenOnDuplicate,
    SeenOnDuplicateKey,
    Done,
}

struct RewriteState {
    last_word: Option<String>,
    last_significant_byte: u8,
    order_phase: OrderPhase,
    order_by_mode: bool,
    dup_phase: DupPhase,
    on_duplicate_seen: bool,
}

impl Default for RewriteState {
    fn default() -> Self {
        RewriteState {
            last_word: None,
            last_significant_byte: 0,
            order_phase: OrderPhase::None,
            order_by_mode: false,
            dup_phase: DupPhase::None,
            on_duplicate_seen: false,
        }
    }
}

impl RewriteState {
    /// Record that a non-word byte (punctuation, literal placeholder,
    /// verbatim-copied identifier) was just emitted: it breaks "last word"
    /// lookback but still counts toward the sign-context rule.
    fn note_literal(&mut self, emitted: u8) {
        self.last_significant_byte = emitted;
        self.last_word = None;
    }

    fn advance_order_phase(&mut self, word: &[u8]) {
        self.order_phase = match (self.order_phase, word) {
            (_, b"order") => OrderPhase::SeenOrder,
            (OrderPhase::SeenOrder, b"by") => {
                self.order_by_mode = true;
                OrderPhase::None
            }
            _ => OrderPhase::None,
        };
    }

    fn advance_dup_phase(&mut self, word: &[u8]) {
        self.dup_phase = match (self.dup_phase, word) {
            (_, b"on") => DupPhase::SeenOn,
            (DupPhase::SeenOn, b"duplicate") => DupPhase::SeenOnDuplicate,
            (DupPhase::SeenOnDuplicate, b"key") => DupPhase::SeenOnDuplicateKey,
            (DupPhase::SeenOnDuplicateKey, b"update") => {
                self.on_duplicate_seen = true;
                DupPhase::Done
            }
            (DupPhase::Done, _) => DupPhase::Done,
            _ => DupPhase::None,
        };
    }
}

const ORDER_BY_EXIT_WORDS: [&[u8]; 6] = [
    b"limit",
    b"procedure",
    b"into",
    b"for",
    b"lock",
    b"union",
];

// ---------------------------------------------------------------------
// Word emission
// ---------------------------------------------------------------------

fn finish_word(
    output: &mut Vec<u8>,
    state: &mut RewriteState,
    raw: &[u8],
    leading_digit: bool,
    opts: FingerprintOptions,
) {
    let lowered: Vec<u8> = raw.iter().map(|b| b.to_ascii_lowercase()).collect();

    let was_order_by_mode = state.order_by_mode;
    state.advance_order_phase(&lowered);
    state.advance_dup_phase(&lowered);
    if state.order_by_mode && ORDER_BY_EXIT_WORDS.contains(&lowered.as_slice()) {
        state.order_by_mode = false;
    }

    if lowered == b"null" {
        output.push(b'?');
        state.note_literal(b'?');
        return;
    }

    if was_order_by_mode && lowered == b"asc" {
        if output.last() == Some(&b' ') {
            output.pop();
        }
        // Deliberately not emitted: the previous emitted word is still the
        // most recent one, so `last_word` is left untouched.
        return;
    }

    let transformed = if opts.replace_numbers_in_words && !leading_digit {
        collapse_digit_runs(&lowered)
    } else {
        lowered.clone()
    };

    output.extend_from_slice(&transformed);
    state.last_significant_byte = *transformed.last().unwrap();
    state.last_word = Some(String::from_utf8_lossy(&lowered).into_owned());
}

fn collapse_digit_runs(word: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(word.len());
    let mut i = 0;
    while i < word.len() {
        if word[i].is_ascii_digit() {
            while i < word.len() && word[i].is_ascii_digit() {
                i += 1;
            }
            out.push(b'?');
        } else {
            out.push(word[i]);
            i += 1;
        }
    }
    out
}

// ---------------------------------------------------------------------
// Group collapsing: `IN (...)` / `VALUES (...)` / `VALUE (...)`
// ---------------------------------------------------------------------

fn handle_open_paren(
    input: &[u8],
    paren_idx: usize,
    output: &mut Vec<u8>,
    state: &mut RewriteState,
) -> usize {
    let collapse_keyword: Option<&'static [u8]> = match state.last_word.as_deref() {
        Some("in") => Some(b"in"),
        Some("values") if !state.on_duplicate_seen => Some(b"values"),
        Some("value") if !state.on_duplicate_seen => Some(b"value"),
        _ => None,
    };

    match collapse_keyword {
        Some(kw) => {
            if output.last() == Some(&b' ') {
                output.pop();
            }
            let (end, had_content) = if kw == b"values" || kw == b"value" {
                consume_values_groups(input, paren_idx)
            } else {
                consume_balanced_group(input, paren_idx)
            };
            output.push(b'(');
            if had_content {
                output.extend_from_slice(b"?+");
            }
            output.push(b')');
            state.note_literal(b')');
            end
        }
        None => {
            output.push(b'(');
            state.note_literal(b'(');
            paren_idx + 1
        }
    }
}

/// Consumes one parenthesized group starting at `open_idx` (which must be
/// `(`), discarding its contents. Returns the index just past the matching
/// `)`, and whether any non-whitespace byte was found inside.
fn consume_balanced_group(input: &[u8], open_idx: usize) -> (usize, bool) {
    let len = input.len();
    let mut i = open_idx + 1;
    let mut depth: u32 = 0;
    let mut had_content = false;

    while i < len {
        match input[i] {
            b'\'' => {
                i = scan_quoted(input, i + 1, b'\'');
                had_content = true;
            }
            b'"' => {
                i = scan_quoted(input, i + 1, b'"');
                had_content = true;
            }
            b'`' => {
                i = scan_backtick(input, i + 1);
                had_content = true;
            }
            b'(' => {
                depth += 1;
                had_content = true;
                i += 1;
            }
            b')' => {
                if depth == 0 {
                    return (i + 1, had_content);
                }
                depth -= 1;
                i += 1;
            }
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
            }
            _ => {
                had_content = true;
                i += 1;
            }
        }
    }
    (len, had_content)
}

/// Like [`consume_balanced_group`] but additionally absorbs trailing
/// `, (...)` tuple groups into the same collapse, as `VALUES (...), (...)`
/// requires.
fn consume_values_groups(input: &[u8], first_open_idx: usize) -> (usize, bool) {
    let (mut end, mut had_content) = consume_balanced_group(input, first_open_idx);
    let len = input.len();
    loop {
        let mut j = end;
        while j < len && is_ws(input[j]) {
            j += 1;
        }
        if j < len && input[j] == b',' {
            let mut k = j + 1;
            while k < len && is_ws(input[k]) {
                k += 1;
            }
            if k < len && input[k] == b'(' {
                let (end2, had2) = consume_balanced_group(input, k);
                end = end2;
                had_content = had_content || had2;
                continue;
            }
        }
        break;
    }
    (end, had_content)
}

// ---------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------

fn is_line_comment_start(input: &[u8], i: usize) -> bool {
    let len = input.len();
    if i + 1 >= len || input[i + 1] != b'-' {
        return false;
    }
    i + 2 >= len || is_ws(input[i + 2])
}

/// Consumes a `--`/`#` line comment through (and including) the terminating
/// newline, or through end-of-input if none exists.
fn skip_line_comment(input: &[u8], i: usize) -> usize {
    let len = input.len();
    let mut j = i;
    while j < len && input[j] != b'\n' {
        j += 1;
    }
    if j < len {
        j += 1; // consume the newline itself
    }
    j
}

fn close_line_comment(output: &mut Vec<u8>, state: &mut RewriteState, input: &[u8], after: usize) {
    state.last_word = None;
    if after < input.len()
        && is_ident_continue(input[after])
        && is_ident_continue(state.last_significant_byte)
    {
        emit_space_unconditionally(output);
    }
}

fn skip_block_comment(input: &[u8], i: usize) -> usize {
    let len = input.len();
    let mut j = i + 2;
    while j + 1 < len && !(input[j] == b'*' && input[j + 1] == b'/') {
        j += 1;
    }
    if j + 1 < len {
        j + 2
    } else {
        len
    }
}

/// Echoes a `/*! ... */` optimizer hint verbatim except for ASCII
/// lowercasing — the authoritative test corpus lowercases hint bodies even
/// though they're otherwise treated as "preserve formatting" regions.
fn echo_hint_comment(output: &mut Vec<u8>, state: &mut RewriteState, raw: &[u8]) {
    for &b in raw {
        output.push(b.to_ascii_lowercase());
    }
    state.last_word = None;
    if let Some(&last) = output.last() {
        state.last_significant_byte = last;
    }
}

// ---------------------------------------------------------------------
// Quoted regions
// ---------------------------------------------------------------------

/// `start` points just past the opening delimiter. Returns the index just
/// past the matching unescaped closing delimiter, or end-of-input if the
/// literal is never closed (tolerated — see spec §7).
fn scan_quoted(input: &[u8], start: usize, delim: u8) -> usize {
    let len = input.len();
    let mut i = start;
    while i < len {
        if input[i] == b'\\' && i + 1 < len {
            i += 2;
            continue;
        }
        if input[i] == delim {
            if i + 1 < len && input[i + 1] == delim {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    len
}

/// `start` points just past the opening backtick.
fn scan_backtick(input: &[u8], start: usize) -> usize {
    let len = input.len();
    let mut i = start;
    while i < len {
        if input[i] == b'`' {
            if i + 1 < len && input[i + 1] == b'`' {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    len
}

// ---------------------------------------------------------------------
// Number recognition
// ---------------------------------------------------------------------

fn sign_starts_number(input: &[u8], i: usize, state: &RewriteState) -> bool {
    let len = input.len();
    let next_is_digit_like = i + 1 < len
        && (input[i + 1].is_ascii_digit() || (input[i + 1] == b'.' && i + 2 < len && input[i + 2].is_ascii_digit()));
    if !next_is_digit_like {
        return false;
    }
    let output_is_empty = state.last_significant_byte == 0;
    output_is_empty || is_sign_context_byte(state.last_significant_byte)
}

fn is_sign_context_byte(b: u8) -> bool {
    matches!(
        b,
        b'=' | b'<' | b'>' | b'!' | b'*' | b'/' | b'%' | b'&' | b'|' | b'^' | b'~' | b'(' | b','
    )
}

/// Assumes `start` is the first byte of a numeric token (a digit, a sign,
/// or a `.` already known to be followed by a digit). Returns the index
/// just past the matched numeric span.
fn scan_number(input: &[u8], start: usize) -> usize {
    let len = input.len();
    let mut i = start;
    if i < len && (input[i] == b'+' || input[i] == b'-') {
        i += 1;
    }

    if i + 1 < len && input[i] == b'0' && (input[i + 1] == b'x' || input[i + 1] == b'X') {
        let mut j = i + 2;
        while j < len && input[j].is_ascii_hexdigit() {
            j += 1;
        }
        return j;
    }
    if i + 1 < len && input[i] == b'0' && (input[i + 1] == b'b' || input[i + 1] == b'B') {
        let mut j = i + 2;
        while j < len && (input[j] == b'0' || input[j] == b'1') {
            j += 1;
        }
        return j;
    }

    let mut j = i;
    while j < len && input[j].is_ascii_digit() {
        j += 1;
    }
    if j < len && input[j] == b'.' {
        j += 1;
        while j < len && input[j].is_ascii_digit() {
            j += 1;
        }
    }
    if j + 1 < len && (input[j] == b'e' || input[j] == b'E') {
        let mut k = j + 1;
        if k < len && (input[k] == b'+' || input[k] == b'-') {
            k += 1;
        }
        if k < len && input[k].is_ascii_digit() {
            while k < len && input[k].is_ascii_digit() {
                k += 1;
            }
            j = k;
        }
    }
    j
}

fn scan_word(input: &[u8], start: usize) -> usize {
    let len = input.len();
    let mut i = start;
    while i < len && is_ident_continue(input[i]) {
        i += 1;
    }
    i
}

// ---------------------------------------------------------------------
// Byte classification
// ---------------------------------------------------------------------

fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn emit_space(output: &mut Vec<u8>) {
    if !output.is_empty() && output.last() != Some(&b' ') {
        output.push(b' ');
    }
}

fn emit_space_unconditionally(output: &mut Vec<u8>) {
    output.push(b' ');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(s: &str) -> String {
        String::from_utf8(scan(s.as_bytes(), FingerprintOptions::default())).unwrap()
    }

    #[test]
    fn basic_literal_elision() {
        assert_eq!(fp("SELECT c FROM t WHERE id=1"), "select c from t where id=?");
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(fp("select   foo"), "select foo");
        assert_eq!(fp(" select  * from\nfoo where a = 5"), "select * from foo where a = ?");
    }

    #[test]
    fn in_list_collapses() {
        assert_eq!(
            fp("select * from foo where a in (5) and b in (5, 8,9 ,9 , 10)"),
            "select * from foo where a in(?+) and b in(?+)"
        );
    }

    #[test]
    fn values_list_chains_tuples() {
        assert_eq!(
            fp("insert into foo(a, b, c) values(2, 4, 5) , (2,4,5)"),
            "insert into foo(a, b, c) values(?+)"
        );
    }

    #[test]
    fn values_after_on_duplicate_key_update_preserved() {
        assert_eq!(
            fp("insert into t values (1) on duplicate key update query_count=COALESCE(query_count, 0) + VALUES(query_count)"),
            "insert into t values(?+) on duplicate key update query_count=coalesce(query_count, ?) + values(query_count)"
        );
    }

    #[test]
    fn order_by_strips_asc_only() {
        assert_eq!(
            fp("select * from t where i=1 order by a, b ASC, d DESC, e asc"),
            "select * from t where i=? order by a, b, d desc, e"
        );
    }

    #[test]
    fn semicolon_exits_order_by_mode() {
        assert_eq!(
            fp("select a from t order by a, b asc; select c asc from u"),
            "select a from t order by a, b; select c asc from u"
        );
    }

    #[test]
    fn trailing_line_comment_leaves_no_trailing_space() {
        assert_eq!(fp("select foo -- bar\n"), "select foo");
    }

    #[test]
    fn digit_leading_identifiers_preserved() {
        assert_eq!(fp("select 123foo from 123foo"), "select 123foo from 123foo");
        assert_eq!(fp("select foo_1 from foo_2_3"), "select foo_1 from foo_2_3");
    }

    #[test]
    fn null_is_elided_like_a_literal() {
        assert_eq!(fp("select null, 5.001, 5001. from foo"), "select ?, ?, ? from foo");
    }

    #[test]
    fn hex_and_bit_literals() {
        assert_eq!(
            fp("select 0x0, x'123', 0b1010, b'10101' from foo"),
            "select ?, ?, ?, ? from foo"
        );
    }

    #[test]
    fn empty_lists_preserved() {
        assert_eq!(fp("INSERT INTO t () VALUES ()"), "insert into t () values()");
    }

    #[test]
    fn hint_comment_echoed_and_lowercased() {
        assert_eq!(
            fp("SELECT /*!40001 SQL_NO_CACHE */ * FROM `film`"),
            "select /*!40001 sql_no_cache */ * from `film`"
        );
    }

    #[test]
    fn line_comment_without_mushing_tokens() {
        assert_eq!(fp("select foo-- bar\n,foo"), "select foo,foo");
    }

    #[test]
    fn backtick_identifiers_preserve_case_and_content() {
        assert_eq!(
            fp("select `col` from `table-1` where `id` = 5"),
            "select `col` from `table-1` where `id` = ?"
        );
    }
}
