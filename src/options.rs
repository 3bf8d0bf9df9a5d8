use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Process-wide default for [`FingerprintOptions::replace_numbers_in_words`].
///
/// Exists only so [`crate::fingerprint`] can stay call-compatible with code
/// that flips a global switch instead of threading an options value through
/// every call site. New call sites should prefer
/// [`crate::fingerprint_with_options`] with an explicit [`FingerprintOptions`].
static REPLACE_NUMBERS_IN_WORDS: AtomicBool = AtomicBool::new(false);

/// Overrides the process-wide default read by [`crate::fingerprint`].
///
/// Not mutated concurrently with fingerprinting calls that rely on it — see
/// the concurrency notes on [`crate::fingerprint`].
pub fn set_replace_numbers_in_words(enabled: bool) {
    REPLACE_NUMBERS_IN_WORDS.store(enabled, Ordering::Relaxed);
}

pub(crate) fn global_replace_numbers_in_words() -> bool {
    REPLACE_NUMBERS_IN_WORDS.load(Ordering::Relaxed)
}

/// Configuration read once per [`crate::fingerprint_with_options`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FingerprintOptions {
    /// When set, maximal digit runs embedded inside an identifier are
    /// replaced by a single `?` (`org235` -> `org?`, `rt_5min` -> `rt_?min`).
    ///
    /// Identifiers whose *first* character is a digit are never rewritten,
    /// even with this flag set — an acknowledged limitation inherited from
    /// the original implementation, not a bug (`123foo` stays `123foo`).
    pub replace_numbers_in_words: bool,
}

impl FingerprintOptions {
    /// Options matching the current value of the process-wide legacy flag.
    pub fn from_global() -> Self {
        FingerprintOptions {
            replace_numbers_in_words: global_replace_numbers_in_words(),
        }
    }
}
