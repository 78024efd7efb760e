//! Event and server-list formatting for terminal display.

use hiroba_shared::sse::SseFrame;
use serde_json::Value;

use crate::domain::TaggedServer;

/// Formatter for the CLI output
pub struct EventFormatter;

impl EventFormatter {
    /// Format one event received from the stream
    ///
    /// Known event types get a dedicated line; everything else is printed
    /// as `<event>: <data>`.
    pub fn format_frame(frame: &SseFrame) -> String {
        let payload: Option<Value> = serde_json::from_str(&frame.data).ok();
        match (frame.event.as_str(), payload) {
            ("connected", Some(Value::String(connection_id))) => {
                format!("* connected (connection {})\n", connection_id)
            }
            ("ping", Some(Value::String(timestamp))) => format!("· ping {}\n", timestamp),
            ("ai-response", Some(payload)) => format!(
                "\n@{}: {}\n",
                payload["display_name"].as_str().unwrap_or("?"),
                payload["content"].as_str().unwrap_or("")
            ),
            ("ai-audio", Some(payload)) => format!(
                "\n@{} sent audio ({} bytes, {})\n",
                payload["member_id"].as_str().unwrap_or("?"),
                payload["size"].as_u64().unwrap_or(0),
                payload["content_type"].as_str().unwrap_or("unknown")
            ),
            ("ai-error", Some(payload)) => format!(
                "\n! {} could not reply: {}\n",
                payload["display_name"].as_str().unwrap_or("?"),
                payload["error"].as_str().unwrap_or("unknown error")
            ),
            _ => format!("← {}: {}\n", frame.event, frame.data),
        }
    }

    /// Format the merged server list, one line per server
    pub fn format_servers(servers: &[TaggedServer]) -> String {
        let mut output = String::new();
        output.push_str("============================================================\n");
        if servers.is_empty() {
            output.push_str("(No servers)\n");
        } else {
            for tagged in servers {
                output.push_str(&format!(
                    "{} [{}] via {} ({})\n",
                    tagged.server.name,
                    tagged.server.id,
                    tagged.origin.user_id,
                    tagged.origin.api_base_url
                ));
            }
        }
        output.push_str("============================================================\n");
        output
    }
}
