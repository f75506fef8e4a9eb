use reqwest::header::{AUTHORIZATION, HeaderName};
use serde_json::{Map, Value};

#[test]
fn builds_bearer_auth_header() {
	let headers =
		mindmate_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn merges_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-goog-api-client".to_string(), Value::String("mindmate".to_string()));

	let headers =
		mindmate_providers::auth_headers("secret", &defaults).expect("Failed to build headers.");

	assert_eq!(
		headers.get(HeaderName::from_static("x-goog-api-client")).expect("Missing default header."),
		"mindmate"
	);
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-retries".to_string(), Value::from(3));

	assert!(mindmate_providers::auth_headers("secret", &defaults).is_err());
}

#[test]
fn prompt_messages_skip_blank_system_prompt() {
	let messages = mindmate_providers::prompt_messages("", "hello");

	assert_eq!(messages.len(), 1);
	assert_eq!(messages[0]["role"], "user");

	let messages = mindmate_providers::prompt_messages("Be kind.", "hello");

	assert_eq!(messages[0]["role"], "system");
	assert_eq!(messages[1]["content"], "hello");
}
