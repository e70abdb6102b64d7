use serde_json::Value;

/// Turns a failed response into one human-readable message.
///
/// Checked in order: a problem-details payload (title plus flattened field
/// errors, else title, else detail), a `messages` list, a bare `message`,
/// the transport message, and finally `default_message`.
pub fn api_error_message(body: &str, transport_message: &str, default_message: &str) -> String {
    if let Ok(Value::Object(payload)) = serde_json::from_str::<Value>(body) {
        let title = non_empty_str(payload.get("title"));

        if let (Some(title), Some(Value::Object(errors))) = (title, payload.get("errors")) {
            let field_messages = errors
                .values()
                .flat_map(|messages| match messages {
                    Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                    Value::String(message) => vec![message.as_str()],
                    _ => Vec::new(),
                })
                .collect::<Vec<_>>();
            return format!("{title}: {}", field_messages.join(" "));
        }
        if let Some(title) = title {
            return title.to_string();
        }
        if let Some(detail) = non_empty_str(payload.get("detail")) {
            return detail.to_string();
        }

        if let Some(Value::Array(messages)) = payload.get("messages") {
            let messages = messages
                .iter()
                .filter_map(Value::as_str)
                .filter(|message| !message.trim().is_empty())
                .collect::<Vec<_>>();
            if !messages.is_empty() {
                return messages.join(" ");
            }
        }

        if let Some(message) = non_empty_str(payload.get("message")) {
            return message.to_string();
        }
    }

    if !transport_message.trim().is_empty() {
        return transport_message.to_string();
    }
    default_message.to_string()
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}
