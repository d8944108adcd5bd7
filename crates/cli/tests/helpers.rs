use slot_sentinel::{
    canonicalize_or_current, normalize_fiscal_code, normalize_health_insurance_number,
};

#[test]
fn canonicalize_or_current_returns_cwd_for_dot() {
    let result = canonicalize_or_current(".").expect("canonicalize");
    let expected = std::env::current_dir().expect("cwd");
    assert_eq!(result, expected);
}

#[test]
fn canonicalize_or_current_joins_missing_paths_to_cwd() {
    let result = canonicalize_or_current("does-not-exist-yet").expect("canonicalize");
    let expected = std::env::current_dir().expect("cwd").join("does-not-exist-yet");
    assert_eq!(result, expected);
}

#[test]
fn fiscal_codes_are_cleaned_and_uppercased() {
    assert_eq!(
        normalize_fiscal_code(" rss mra80a01 f205x "),
        Some("RSSMRA80A01F205X".to_string())
    );
    assert_eq!(
        normalize_fiscal_code("RSSMRA80A01F205X"),
        Some("RSSMRA80A01F205X".to_string())
    );
}

#[test]
fn malformed_fiscal_codes_are_rejected() {
    assert_eq!(normalize_fiscal_code("SHORT"), None);
    assert_eq!(normalize_fiscal_code("RSSMRA80A01F205XX"), None);
    assert_eq!(normalize_fiscal_code("RSSMRA80A01F205-"), None);
    assert_eq!(normalize_fiscal_code(""), None);
}

#[test]
fn insurance_numbers_accept_stray_spacing() {
    assert_eq!(
        normalize_health_insurance_number("123 456"),
        Some("123456".to_string())
    );
    assert_eq!(
        normalize_health_insurance_number("123456"),
        Some("123456".to_string())
    );
}

#[test]
fn malformed_insurance_numbers_are_rejected() {
    assert_eq!(normalize_health_insurance_number("12345"), None);
    assert_eq!(normalize_health_insurance_number("1234567"), None);
    assert_eq!(normalize_health_insurance_number("12345a"), None);
}
