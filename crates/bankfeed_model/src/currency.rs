//! ISO-4217 currency allow-list.

/// Currency codes accepted from the aggregator.
///
/// Records carrying any other code abort the sync that fetched them; the
/// list errs on the side of the currencies the aggregator actually serves
/// rather than the full ISO table.
const SUPPORTED: &[&str] = &[
    "AED", "AUD", "BGN", "BRL", "CAD", "CHF", "CLP", "CNY", "COP", "CZK",
    "DKK", "EUR", "GBP", "HKD", "HUF", "IDR", "ILS", "INR", "ISK", "JPY",
    "KRW", "MXN", "MYR", "NOK", "NZD", "PEN", "PHP", "PLN", "RON", "SAR",
    "SEK", "SGD", "THB", "TRY", "TWD", "USD", "VND", "ZAR",
];

/// Returns true if `code` is on the allow-list. Codes are matched exactly
/// (ISO-4217 codes are upper-case on the wire).
pub fn is_supported_currency(code: &str) -> bool {
    SUPPORTED.binary_search(&code).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_is_sorted_for_binary_search() {
        let mut sorted = SUPPORTED.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, SUPPORTED);
    }

    #[test]
    fn common_codes_supported() {
        assert!(is_supported_currency("USD"));
        assert!(is_supported_currency("EUR"));
        assert!(is_supported_currency("JPY"));
    }

    #[test]
    fn unknown_and_lowercase_rejected() {
        assert!(!is_supported_currency("XXX"));
        assert!(!is_supported_currency("usd"));
        assert!(!is_supported_currency(""));
    }
}
