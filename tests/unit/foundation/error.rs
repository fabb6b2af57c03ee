use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        SignreelError::not_found("x")
            .to_string()
            .contains("not found:")
    );
    assert!(
        SignreelError::download("x")
            .to_string()
            .contains("download error:")
    );
    assert!(
        SignreelError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        SignreelError::composition("x")
            .to_string()
            .contains("composition error:")
    );
    assert!(
        SignreelError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn only_composition_is_fatal() {
    assert!(SignreelError::composition("x").is_fatal());
    assert!(!SignreelError::not_found("x").is_fatal());
    assert!(!SignreelError::download("x").is_fatal());
    assert!(!SignreelError::validation("x").is_fatal());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = SignreelError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn json_errors_become_serde() {
    let err: SignreelError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert!(matches!(err, SignreelError::Serde(_)));
}
