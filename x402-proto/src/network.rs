//! CAIP-2 chain identifier normalization.
//!
//! Internally the gateway tracks networks by their full CAIP-2 identifier
//! (e.g. `"stacks:2147483648"`) so it can disambiguate mainnet from
//! testnet, but discovery documents advertise the short token form
//! (`"stacks"`) that payment clients key their wallet selection on.

/// Returns the short token form of a CAIP-2 chain identifier.
///
/// Given `"stacks:2147483648"` returns `"stacks"`. Given an identifier with
/// no `:` separator, returns the input unchanged.
#[must_use]
pub fn short_token(chain_id: &str) -> &str {
    chain_id.split(':').next().unwrap_or(chain_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_namespace_from_reference() {
        assert_eq!(short_token("stacks:2147483648"), "stacks");
    }

    #[test]
    fn passes_through_bare_tokens() {
        assert_eq!(short_token("stacks"), "stacks");
    }

    #[test]
    fn empty_input_is_itself() {
        assert_eq!(short_token(""), "");
    }
}
