use super::*;

#[test]
fn test_mode_default_is_auto() {
    assert_eq!(Mode::default(), Mode::Auto);
}

#[test]
fn test_mode_from_toml() {
    #[derive(serde::Deserialize)]
    struct Wrap {
        mode: Mode,
    }
    let w: Wrap = toml::from_str(r#"mode = "manual""#).unwrap();
    assert_eq!(w.mode, Mode::Manual);
    let w: Wrap = toml::from_str(r#"mode = "auto""#).unwrap();
    assert_eq!(w.mode, Mode::Auto);
}

#[test]
fn test_behavior_defaults_when_section_missing() {
    let cfg: Config = toml::from_str("[maitre]\nname = \"test\"").unwrap();
    assert_eq!(cfg.behavior.mode, Mode::Auto);
    assert!(!cfg.behavior.activation_words.is_empty());
    assert!(!cfg.behavior.terminal_markers.is_empty());
}

#[test]
fn test_activation_only_in_auto_mode() {
    let mut behavior = BehaviorConfig {
        activation_words: vec!["appointment".into()],
        ..Default::default()
    };
    assert!(behavior.is_activation("I'd like an APPOINTMENT please"));

    behavior.mode = Mode::Manual;
    assert!(!behavior.is_activation("I'd like an appointment please"));
}

#[test]
fn test_user_exit_only_in_auto_mode() {
    let mut behavior = BehaviorConfig {
        user_exit_words: vec!["stop".into()],
        ..Default::default()
    };
    assert!(behavior.is_user_exit("please STOP"));

    behavior.mode = Mode::Manual;
    assert!(!behavior.is_user_exit("please stop"));
}

#[test]
fn test_operator_exit_works_in_both_modes() {
    let mut behavior = BehaviorConfig {
        operator_exit_words: vec!["#takeover".into()],
        ..Default::default()
    };
    assert!(behavior.is_operator_exit("I'll handle this #takeover"));

    behavior.mode = Mode::Manual;
    assert!(behavior.is_operator_exit("#takeover"));
}

#[test]
fn test_activation_words_match_hebrew() {
    let behavior = BehaviorConfig {
        activation_words: vec!["לקבוע תור".into()],
        ..Default::default()
    };
    assert!(behavior.is_activation("היי אני רוצה לקבוע תור"));
    assert!(!behavior.is_activation("סתם הודעה"));
}

#[test]
fn test_empty_words_never_match() {
    let behavior = BehaviorConfig {
        activation_words: vec!["".into(), "  ".into()],
        ..Default::default()
    };
    assert!(!behavior.is_activation("anything at all"));
}

#[test]
fn test_load_behavior_section_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[maitre]
name = "test"

[behavior]
mode = "manual"
activation_words = ["tor"]
"#,
    )
    .unwrap();

    let behavior = load_behavior(path.to_str().unwrap()).unwrap();
    assert_eq!(behavior.mode, Mode::Manual);
    assert_eq!(behavior.activation_words, vec!["tor".to_string()]);
    // Unspecified lists keep their defaults.
    assert!(!behavior.operator_exit_words.is_empty());
}

#[test]
fn test_load_behavior_missing_file_defaults() {
    let behavior = load_behavior("/nonexistent/config.toml").unwrap();
    assert_eq!(behavior.mode, Mode::Auto);
}

#[test]
fn test_reply_texts_fill() {
    let out = ReplyTexts::fill("Booked {date} at {time} (#{id})", "2026-03-12", "10:30", "a1");
    assert_eq!(out, "Booked 2026-03-12 at 10:30 (#a1)");
}

#[test]
fn test_shellexpand_home() {
    std::env::set_var("HOME", "/home/tester");
    assert_eq!(shellexpand("~/x/y"), "/home/tester/x/y");
    assert_eq!(shellexpand("/abs/path"), "/abs/path");
}

#[test]
fn test_booking_config_defaults() {
    let cfg = BookingConfig::default();
    assert_eq!(cfg.open_time, "09:00");
    assert_eq!(cfg.close_time, "18:00");
    assert_eq!(cfg.slot_minutes, 30);
}
