//! Knuth-Morris-Pratt substring matching.
//!
//! Used in two places: matching an executable name against each running
//! process's reported image name, and the degenerate equal-length case of
//! matching a module's short name against a caller-supplied name, which
//! collapses to exact equality. Case-blind comparisons fold ASCII letters
//! only; anything outside `a..z` is compared verbatim. That limitation is
//! deliberate and matches the loader's own expectations for module names.

/// Uppercases a single byte, ASCII letters only.
#[inline]
fn fold(byte: u8, case_blind: bool) -> u8 {
    if case_blind && byte.is_ascii_lowercase() {
        byte - 32
    } else {
        byte
    }
}

/// Builds the KMP failure table for `pattern`.
///
/// The table has `pattern.len() + 1` entries and `table[0]` is always -1.
/// Each entry extends the longest proper prefix of the pattern that is
/// also a suffix, backing off through the table itself on mismatch, so
/// construction is O(|pattern|).
pub fn failure_table(pattern: &[u8]) -> Vec<i64> {
    let mut table = vec![0i64; pattern.len() + 1];
    table[0] = -1;

    for i in 0..pattern.len() {
        table[i + 1] = table[i] + 1;

        while table[i + 1] > 0 && pattern[i] != pattern[(table[i + 1] - 1) as usize] {
            table[i + 1] = table[(table[i + 1] - 1) as usize] + 1;
        }
    }

    table
}

/// Searches `haystack` for `pattern` using a precomputed failure table.
///
/// Returns the index of the first full match, or `None`. The haystack
/// cursor only moves forward; on mismatch the pattern cursor backs off
/// through the table, so the search is O(|haystack| + |pattern|). An empty
/// pattern matches at index 0.
///
/// When `case_blind` is set the table must have been built from a pattern
/// folded the same way (see [`find`]), or the back-off distances will not
/// agree with the comparison.
pub fn search(haystack: &[u8], pattern: &[u8], table: &[i64], case_blind: bool) -> Option<usize> {
    if pattern.is_empty() {
        return Some(0);
    }

    let mut h_idx: usize = 0;
    let mut p_idx: i64 = 0;

    while h_idx < haystack.len() {
        if p_idx < 0 {
            h_idx += 1;
            p_idx += 1;
        } else if fold(haystack[h_idx], case_blind) == fold(pattern[p_idx as usize], case_blind) {
            h_idx += 1;
            p_idx += 1;

            if p_idx as usize == pattern.len() {
                return Some(h_idx - pattern.len());
            }
        } else {
            p_idx = table[p_idx as usize];
        }
    }

    None
}

/// One-shot search that builds the table on the fly.
///
/// For a case-blind search the table is built over the folded pattern so
/// that back-off and comparison use the same alphabet.
pub fn find(haystack: &[u8], pattern: &[u8], case_blind: bool) -> Option<usize> {
    if case_blind {
        let folded: Vec<u8> = pattern.iter().map(|&b| fold(b, true)).collect();
        let table = failure_table(&folded);
        search(haystack, &folded, &table, true)
    } else {
        let table = failure_table(pattern);
        search(haystack, pattern, &table, false)
    }
}

/// Case-blind exact equality over bytes (ASCII fold only).
pub fn eq_case_blind(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(&x, &y)| fold(x, true) == fold(y, true))
}

/// Case-blind exact equality over UTF-16 code units.
///
/// Only units in `a..z` are folded; everything else is compared verbatim.
pub fn eq_utf16_case_blind(a: &[u16], b: &[u16]) -> bool {
    fn fold16(unit: u16) -> u16 {
        if (b'a' as u16..=b'z' as u16).contains(&unit) {
            unit - 32
        } else {
            unit
        }
    }

    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(&x, &y)| fold16(x) == fold16(y))
}
