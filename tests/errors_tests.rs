use std::error::Error;
use discord_relay::errors::RelayError;

#[test]
fn test_relay_error_implements_error_trait() {
    fn assert_error<T: Error + Send + Sync + 'static>(_: &T) {}

    let error = RelayError::ParseError("test error".to_string());
    assert_error(&error);
}

#[test]
fn test_relay_error_display() {
    let error = RelayError::ApiError("unexpected status 500".to_string());
    assert_eq!(
        format!("{error}"),
        "Remote API returned an error: unexpected status 500"
    );

    let error = RelayError::PlatformError("Missing Access".to_string());
    assert_eq!(
        format!("{error}"),
        "Failed to access Discord API: Missing Access"
    );

    let error = RelayError::HttpError("Connection error".to_string());
    assert_eq!(
        format!("{error}"),
        "Failed to send HTTP request: Connection error"
    );

    assert_eq!(
        RelayError::EmptyResponse.to_string(),
        "Remote API returned an empty response"
    );
}

#[test]
fn test_remote_api_errors_are_distinguished_from_platform_errors() {
    assert!(RelayError::StreamError("reset".into()).is_remote_api_error());
    assert!(RelayError::EmptyResponse.is_remote_api_error());
    assert!(!RelayError::PlatformError("denied".into()).is_remote_api_error());
    assert!(!RelayError::ConfigError("missing".into()).is_remote_api_error());
}

#[test]
fn test_relay_error_from_conversions() {
    let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let relay_err: RelayError = json_err.into();
    assert!(matches!(relay_err, RelayError::ParseError(_)));

    // compile-time check that the transport and gateway conversions exist
    #[allow(unused)]
    #[allow(clippy::items_after_statements)]
    fn _check_reqwest_conversion(err: reqwest::Error) -> RelayError {
        RelayError::from(err)
    }

    #[allow(unused)]
    #[allow(clippy::items_after_statements)]
    fn _check_serenity_conversion(err: serenity::Error) -> RelayError {
        RelayError::from(err)
    }
}
