/// Stored in place of a missing land-lot or road-name address.
pub const EMPTY_ADDRESS: &str = "empty";

/// Stored in place of a missing or blank `x`/`y` coordinate.
pub const MISSING_COORDINATE: f64 = -1.0;

// Tokens a data-frame CSV reader treats as "no value" by default.
const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub(crate) fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed)
}

pub(crate) fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|raw| !is_missing(raw))
}

pub(crate) fn address_or_sentinel(value: Option<&str>) -> String {
    present(value)
        .map(str::to_string)
        .unwrap_or_else(|| EMPTY_ADDRESS.to_string())
}

/// `None` means the value was present but not a finite number.
pub(crate) fn coordinate_or_sentinel(value: Option<&str>) -> Option<f64> {
    match present(value) {
        None => Some(MISSING_COORDINATE),
        Some(raw) => raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

pub(crate) fn clean_header(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_marker_values_are_missing() {
        assert!(is_missing(""));
        assert!(is_missing("   "));
        assert!(is_missing("NaN"));
        assert!(is_missing(" null "));
        assert!(!is_missing("123 Main"));
        assert!(!is_missing("0"));
    }

    #[test]
    fn addresses_fall_back_to_sentinel() {
        assert_eq!(address_or_sentinel(None), EMPTY_ADDRESS);
        assert_eq!(address_or_sentinel(Some("")), EMPTY_ADDRESS);
        assert_eq!(address_or_sentinel(Some("123 Main")), "123 Main");
    }

    #[test]
    fn coordinates_fall_back_to_sentinel_but_reject_garbage() {
        assert_eq!(coordinate_or_sentinel(None), Some(MISSING_COORDINATE));
        assert_eq!(coordinate_or_sentinel(Some(" ")), Some(MISSING_COORDINATE));
        assert_eq!(coordinate_or_sentinel(Some("37.5")), Some(37.5));
        assert_eq!(coordinate_or_sentinel(Some(" 126.97 ")), Some(126.97));
        assert_eq!(coordinate_or_sentinel(Some("north")), None);
        assert_eq!(coordinate_or_sentinel(Some("inf")), None);
    }

    #[test]
    fn clean_header_strips_byte_order_marks() {
        assert_eq!(clean_header("\u{feff}landlot_address"), "landlot_address");
        assert_eq!(clean_header(" x "), "x");
    }
}
