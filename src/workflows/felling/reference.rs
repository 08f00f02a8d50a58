//! Application reference helpers. References take the form
//! `{prefix}/{sequence}/{year}`; renumbering preserves the prefix and
//! rebuilds the rest.

/// The area prefix of a reference: everything before the first `/`, or the
/// whole string when there is no separator.
pub fn reference_prefix(reference: &str) -> &str {
    reference.split('/').next().unwrap_or(reference)
}

/// Rebuild a reference from its parts.
pub fn build_reference(prefix: &str, sequence: u64, year: i32) -> String {
    format!("{prefix}/{sequence:03}/{year}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_text_before_first_separator() {
        assert_eq!(reference_prefix("017/123/2026"), "017");
        assert_eq!(reference_prefix("CNF"), "CNF");
    }

    #[test]
    fn rebuild_pads_sequence() {
        assert_eq!(build_reference("017", 9, 2026), "017/009/2026");
        assert_eq!(build_reference("017", 1234, 2026), "017/1234/2026");
    }
}
