use super::*;
use crate::foundation::error::ErrorKind;

#[test]
fn defaults_validate_to_default_config() {
    let cfg = RenderConfigDef::default().validate().unwrap();
    assert_eq!(cfg, RenderConfig::default());
}

#[test]
fn partial_document_fills_defaults() {
    let cfg = RenderConfig::from_json_str(r#"{"duration": 2, "topN": 3}"#).unwrap();
    assert_eq!(cfg.duration(), Duration::from_secs(2));
    assert_eq!(cfg.top_n(), 3);
    assert_eq!(cfg.bar_height(), 50.0);
    assert!(cfg.show_icons());
}

#[test]
fn rejects_non_positive_numbers() {
    for doc in [
        r#"{"durationSeconds": 0}"#,
        r#"{"durationSeconds": -1}"#,
        r#"{"topN": 0}"#,
        r#"{"barHeight": 0}"#,
        r#"{"gap": -0.5}"#,
    ] {
        let err = RenderConfig::from_json_str(doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{doc}");
    }
}

#[test]
fn zero_gap_is_allowed() {
    let cfg = RenderConfig::from_json_str(r#"{"gap": 0}"#).unwrap();
    assert_eq!(cfg.gap(), 0.0);
}

#[test]
fn colors_are_validated_at_the_boundary() {
    let err = RenderConfig::from_json_str(r##"{"backgroundColor": "navy"}"##).unwrap_err();
    assert!(err.to_string().contains("backgroundColor"));

    let cfg = RenderConfig::from_json_str(r##"{"textColor": "#000"}"##).unwrap();
    assert_eq!(cfg.text(), Color::BLACK);
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(RenderConfig::from_json_str(r#"{"fps": 30}"#).is_err());
}

#[test]
fn to_def_round_trips() {
    let cfg =
        RenderConfig::from_json_str(r##"{"topN": 4, "backgroundColor": "#102030"}"##).unwrap();
    assert_eq!(cfg.to_def().validate().unwrap(), cfg);
}

#[test]
fn huge_duration_is_rejected_not_panicking() {
    let def = RenderConfigDef {
        duration_seconds: 1e20,
        ..RenderConfigDef::default()
    };
    let err = def.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("durationSeconds is out of range"));

    let err = RenderConfig::from_json_str(r#"{"durationSeconds": 1e300}"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
