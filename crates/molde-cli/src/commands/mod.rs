// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Subcommand implementations.

/// `molde generate`: run an archetype.
pub mod generate;
/// `molde inspect`: print a parsed script tree.
pub mod inspect;

/// Parses repeatable `path=value` CLI arguments.
pub fn parse_pairs(pairs: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("expected path=value, got '{pair}'"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_parse_and_reject() {
        let pairs = parse_pairs(&["a=1".to_string(), "b.c=x=y".to_string()]).unwrap();
        assert_eq!(pairs[0], ("a".to_string(), "1".to_string()));
        // Only the first '=' splits
        assert_eq!(pairs[1], ("b.c".to_string(), "x=y".to_string()));
        assert!(parse_pairs(&["oops".to_string()]).is_err());
    }
}
