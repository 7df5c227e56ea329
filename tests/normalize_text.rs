use adgm_check::{config::Config, normalize::normalize_text};

#[test]
fn strips_page_furniture_and_crlf() {
    let cfg = Config::default();
    let raw = "ARTICLES OF ASSOCIATION\r\nPage 3 of 10\r\n1. Jurisdiction   \r\n2 / 10\r\nBody";
    let out = normalize_text(&cfg, raw).unwrap();

    assert!(!out.contains('\r'));
    assert!(!out.contains("Page 3 of 10"));
    assert!(!out.contains("2 / 10"));
    assert!(out.contains("1. Jurisdiction\nBody"));
}

#[test]
fn sanitizes_control_chars_but_keeps_tabs() {
    let cfg = Config::default();
    let out = normalize_text(&cfg, "Alpha\u{0002}Beta\nCol\tValue").unwrap();

    assert!(out.contains("AlphaBeta"));
    assert!(out.contains('\t'));
}

#[test]
fn collapses_long_blank_runs() {
    let cfg = Config::default();
    let out = normalize_text(&cfg, "a\n\n\n\n\n\nb").unwrap();
    assert_eq!(out, "a\n\n\nb");
}

#[test]
fn applies_nfkc() {
    let cfg = Config::default();
    // U+FB01 LATIN SMALL LIGATURE FI
    let out = normalize_text(&cfg, "\u{FB01}ling").unwrap();
    assert_eq!(out, "filing");
}
