//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Scripts rely on them, so treat them as part of the shell contract.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | io               | Grid and reference file IO               |
//! | 10-19   | ai               | AI provider, keychain and model codes    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// IO (3-9)
// =============================================================================

/// Cannot read or write a file.
pub const EXIT_IO: u8 = 3;

/// Grid CSV could not be parsed, or has no header row.
pub const EXIT_GRID_PARSE: u8 = 4;

// =============================================================================
// AI (10-19)
// =============================================================================

/// AI disabled (provider=none). Informational, not a failure of the run.
pub const EXIT_AI_DISABLED: u8 = 10;

/// AI provider configured but API key missing.
pub const EXIT_AI_MISSING_KEY: u8 = 11;

/// AI configuration unusable (no models, zero timeout, bad endpoint).
pub const EXIT_AI_CONFIG: u8 = 12;

/// Every model in the fallback list failed.
pub const EXIT_AI_EXHAUSTED: u8 = 13;

/// A model answered, but the answer could not be used.
pub const EXIT_AI_MALFORMED: u8 = 14;

/// Batch finished, but at least one reference file failed.
/// The grid is still written with every successful merge applied.
pub const EXIT_AI_PARTIAL: u8 = 15;

/// Keychain error (cannot read/write credentials).
pub const EXIT_AI_KEYCHAIN: u8 = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_IO,
            EXIT_GRID_PARSE,
            EXIT_AI_DISABLED,
            EXIT_AI_MISSING_KEY,
            EXIT_AI_CONFIG,
            EXIT_AI_EXHAUSTED,
            EXIT_AI_MALFORMED,
            EXIT_AI_PARTIAL,
            EXIT_AI_KEYCHAIN,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn ai_codes_in_range() {
        for code in [
            EXIT_AI_DISABLED,
            EXIT_AI_MISSING_KEY,
            EXIT_AI_CONFIG,
            EXIT_AI_EXHAUSTED,
            EXIT_AI_MALFORMED,
            EXIT_AI_PARTIAL,
            EXIT_AI_KEYCHAIN,
        ] {
            assert!((10..=19).contains(&code));
        }
    }
}
