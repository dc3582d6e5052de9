//! Output comparison
//!
//! Tolerates whitespace at the edges of the whole text and at the end of
//! each line. Everything else, line count included, must match exactly.

/// Normalize program output for comparison
pub fn normalize_output(text: &str) -> String {
    text.trim()
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check whether actual output matches the expected output
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize_output(actual) == normalize_output(expected)
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn reflexive(text in ".*") {
            prop_assert!(outputs_match(&text, &text));
        }

        #[test]
        fn normalize_is_idempotent(text in "[a-z0-9 \t\r\n]{0,64}") {
            let once = normalize_output(&text);
            prop_assert_eq!(normalize_output(&once), once);
        }

        #[test]
        fn trailing_whitespace_is_ignored(
            lines in prop::collection::vec("[a-z0-9]{1,8}", 1..6),
            pad in "[ \t]{0,3}",
        ) {
            let expected = lines.join("\n");
            let padded = lines
                .iter()
                .map(|line| format!("{line}{pad}"))
                .collect::<Vec<_>>()
                .join("\n")
                + "\n";
            prop_assert!(outputs_match(&padded, &expected));
        }
    }
}
