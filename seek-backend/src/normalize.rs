//! Field-name fallback chains for upstream bodies.
//!
//! The User Service has shipped several shapes for the same record over
//! time; these helpers pick the first populated variant.

use serde_json::Value;

/// Walk a dotted path (`"user.address"`) into a JSON value.
fn at<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}

/// First non-empty string among `paths`.
fn first_string(value: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .filter_map(|p| at(value, p))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// First non-null value among `paths`. Zero and empty strings count as present.
fn first_present(value: &Value, paths: &[&str]) -> Option<Value> {
    paths
        .iter()
        .filter_map(|p| at(value, p))
        .find(|v| !v.is_null())
        .cloned()
}

pub fn extract_username(value: &Value) -> Option<String> {
    first_string(value, &["username", "user.username", "profile.username"])
}

pub fn extract_referral_count(value: &Value) -> Option<Value> {
    first_present(value, &["referralCount", "referrals.count"])
}

pub fn extract_player_points(value: &Value) -> Option<Value> {
    first_present(value, &["playerPoints", "totalPoints", "points.total"])
}

pub fn extract_address(value: &Value) -> Option<String> {
    first_string(
        value,
        &[
            "userAddress",
            "address",
            "walletAddress",
            "wallet_address",
            "user.address",
            "user.walletAddress",
            "user.wallet_address",
        ],
    )
}

pub fn extract_x_handle(value: &Value) -> Option<String> {
    first_string(value, &["xHandle", "x-handle", "raw.all.xHandle"])
}

pub fn extract_email(value: &Value) -> Option<String> {
    first_string(value, &["email", "user.email"])
}

pub fn extract_discord_handle(value: &Value) -> Option<String> {
    first_string(value, &["discordHandle", "discord-handle", "user.discordHandle"])
}

/// Lift a nested username to the top level, leaving everything else intact.
pub fn with_username(mut value: Value) -> Value {
    if let Some(username) = extract_username(&value) {
        if let Value::Object(map) = &mut value {
            map.insert("username".to_string(), Value::String(username));
        }
    }
    value
}

const DYNAMODB_FILTER_ERROR: &str = "Filter Expression can only contain non-primary key attributes";

/// The upstream completed-task query sometimes fails with a DynamoDB
/// filter-expression error on `completionKey`. It means "nothing to report".
pub fn is_dynamodb_filter_error(body: &Value, text: &str) -> bool {
    let message = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or(text);
    message.contains(DYNAMODB_FILTER_ERROR) && message.contains("completionKey")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_username_chain() {
        assert_eq!(extract_username(&json!({"username": "a"})), Some("a".into()));
        assert_eq!(extract_username(&json!({"user": {"username": "b"}})), Some("b".into()));
        assert_eq!(
            extract_username(&json!({"username": "", "profile": {"username": "c"}})),
            Some("c".into())
        );
        assert_eq!(extract_username(&json!({})), None);
    }

    #[test]
    fn test_points_chain_keeps_zero() {
        assert_eq!(extract_player_points(&json!({"totalPoints": 10})), Some(json!(10)));
        assert_eq!(
            extract_player_points(&json!({"playerPoints": 0, "totalPoints": 10})),
            Some(json!(0))
        );
        assert_eq!(extract_player_points(&json!({"points": {"total": 7}})), Some(json!(7)));
        assert_eq!(extract_player_points(&json!({"playerPoints": null})), None);
    }

    #[test]
    fn test_address_chain() {
        assert_eq!(
            extract_address(&json!({"user": {"wallet_address": "0xDEF"}})),
            Some("0xDEF".into())
        );
        assert_eq!(
            extract_address(&json!({"userAddress": "A", "address": "B"})),
            Some("A".into())
        );
        assert_eq!(extract_address(&json!({"raw": "nope"})), None);
    }

    #[test]
    fn test_with_username_lifts_nested() {
        let v = with_username(json!({"profile": {"username": "foo"}, "x": 1}));
        assert_eq!(v["username"], "foo");
        assert_eq!(v["x"], 1);
    }

    #[test]
    fn test_dynamodb_filter_error_detection() {
        let msg = "ValidationException: Filter Expression can only contain non-primary key attributes: Primary key attribute: completionKey";
        assert!(is_dynamodb_filter_error(&json!({"error": msg}), ""));
        assert!(is_dynamodb_filter_error(&json!({"raw": msg}), msg));
        assert!(!is_dynamodb_filter_error(&json!({"error": "Throttled"}), ""));
    }
}
