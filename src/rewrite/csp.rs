//! Content-Security-Policy nonce extraction.

/// Nonce from the `script-src` directive of a CSP header value, if any.
pub fn script_nonce(csp: &str) -> Option<&str> {
    csp.split(';').find_map(|directive| {
        let mut tokens = directive.split_whitespace();
        let name = tokens.next()?;
        if !name.eq_ignore_ascii_case("script-src") {
            return None;
        }
        tokens.find_map(|token| {
            token
                .trim_matches('\'')
                .strip_prefix("nonce-")
                .filter(|nonce| !nonce.is_empty())
        })
    })
}
