//! JSON forms of the framing and symbology settings
#![cfg(feature = "serde")]

use scan_protocol::{FramingMode, Symbology, SymbologyStrategy};
use serde_json::json;

#[test]
fn test_framing_mode_json() {
    let delimited = FramingMode::Delimited {
        terminator: b'\n',
        max_frame_len: 64,
    };
    assert_eq!(
        serde_json::to_value(delimited).unwrap(),
        json!({"type": "delimited", "terminator": 10, "max_frame_len": 64})
    );
    assert_eq!(
        serde_json::to_value(FramingMode::PerNotification).unwrap(),
        json!({"type": "per_notification"})
    );

    let parsed: FramingMode = serde_json::from_str(r#"{"type": "per_notification"}"#).unwrap();
    assert_eq!(parsed, FramingMode::PerNotification);
}

#[test]
fn test_symbology_strategy_json() {
    assert_eq!(
        serde_json::to_value(SymbologyStrategy::Fixed(Symbology::Upca)).unwrap(),
        json!({"type": "fixed", "value": "Upca"})
    );
    assert_eq!(
        serde_json::to_value(SymbologyStrategy::TrailingCode).unwrap(),
        json!({"type": "trailing_code"})
    );

    let parsed: SymbologyStrategy =
        serde_json::from_str(r#"{"type": "fixed", "value": "Code128"}"#).unwrap();
    assert_eq!(parsed, SymbologyStrategy::Fixed(Symbology::Code128));
    let parsed: SymbologyStrategy = serde_json::from_str(r#"{"type": "trailing_code"}"#).unwrap();
    assert_eq!(parsed, SymbologyStrategy::TrailingCode);
}

#[test]
fn test_unknown_framing_rejected() {
    assert!(serde_json::from_str::<FramingMode>(r#"{"type": "length_prefixed"}"#).is_err());
}
