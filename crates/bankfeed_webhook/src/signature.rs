//! Signature-header parsing.

use crate::error::{WebhookError, WebhookResult};

/// A parsed `t=<unix-seconds>,v1=<hex>[,v1=<hex>,...]` header.
///
/// Multiple `v1` values appear while the aggregator rotates signing
/// secrets; a delivery verifies if any of them matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Signed unix timestamp.
    pub timestamp: i64,
    /// Hex HMAC-SHA256 signatures, lower-cased.
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    /// Parses the header. Requires exactly one `t` and at least one `v1`
    /// entry; unknown scheme tags are skipped for forward compatibility.
    /// Anything else is an invalid signature.
    pub fn parse(header: &str) -> WebhookResult<Self> {
        let mut timestamp: Option<i64> = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                return Err(WebhookError::InvalidSignature);
            };
            match key {
                "t" => {
                    let parsed = value.parse().map_err(|_| WebhookError::InvalidSignature)?;
                    if timestamp.replace(parsed).is_some() {
                        return Err(WebhookError::InvalidSignature);
                    }
                }
                "v1" => {
                    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
                        return Err(WebhookError::InvalidSignature);
                    }
                    signatures.push(value.to_ascii_lowercase());
                }
                _ => {}
            }
        }

        match (timestamp, signatures.is_empty()) {
            (Some(timestamp), false) => Ok(Self {
                timestamp,
                signatures,
            }),
            _ => Err(WebhookError::InvalidSignature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_signature() {
        let header = SignatureHeader::parse("t=1700000000,v1=deadbeef").unwrap();
        assert_eq!(header.timestamp, 1_700_000_000);
        assert_eq!(header.signatures, vec!["deadbeef"]);
    }

    #[test]
    fn parses_rotated_signatures() {
        let header = SignatureHeader::parse("t=1700000000,v1=aa11,v1=BB22").unwrap();
        assert_eq!(header.signatures, vec!["aa11", "bb22"]);
    }

    #[test]
    fn skips_unknown_scheme_tags() {
        let header = SignatureHeader::parse("t=1700000000,v0=ignored,v1=aa11").unwrap();
        assert_eq!(header.signatures, vec!["aa11"]);
    }

    #[test]
    fn rejects_malformed_headers() {
        for bad in [
            "",
            "v1=aa11",
            "t=1700000000",
            "t=notanumber,v1=aa11",
            "t=1,t=2,v1=aa11",
            "t=1700000000,v1=nothex!",
            "t=1700000000,v1=",
            "t=1700000000,garbage",
        ] {
            assert_eq!(
                SignatureHeader::parse(bad).unwrap_err(),
                WebhookError::InvalidSignature,
                "accepted {bad:?}"
            );
        }
    }
}
