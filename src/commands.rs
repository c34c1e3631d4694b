//! Command execution.

use crate::Commands;
use colored::Colorize;
use kwire_client::{Client, Deadline, DeleteTopicsRequest, DeleteTopicsResponse};
use kwire_protocol::{ApiKey, VersionRange};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Settings shared by every command.
pub struct Context {
    pub broker: String,
    pub deadline: Deadline,
    pub json: bool,
}

/// Formatted command result. `ok` is false when the call went through but
/// reported failures.
pub struct Output {
    pub text: String,
    pub ok: bool,
}

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &Client,
    ctx: &Context,
    cmd: Commands,
) -> Result<Output, Box<dyn std::error::Error>> {
    match cmd {
        Commands::DeleteTopics {
            topics,
            wait_ms,
            no_wait,
        } => {
            let mut request = DeleteTopicsRequest::new(&ctx.broker, topics);
            if no_wait {
                request = request.with_timeout(Duration::ZERO);
            } else if let Some(ms) = wait_ms {
                request = request.with_timeout(Duration::from_millis(ms));
            }

            let response = client.delete_topics(&request, ctx.deadline).await?;
            let ok = response.failed().is_empty();
            let text = if ctx.json {
                format_json(&delete_topics_json(&response))
            } else {
                format_delete_topics(&response)
            };
            Ok(Output { text, ok })
        }

        Commands::ApiVersions => {
            let ranges = client.api_versions(&ctx.broker, ctx.deadline).await?;
            let text = if ctx.json {
                format_json(&api_versions_json(&ranges))
            } else {
                format_api_versions(&ranges)
            };
            Ok(Output { text, ok: true })
        }
    }
}

fn format_delete_topics(response: &DeleteTopicsResponse) -> String {
    let mut topics: Vec<_> = response.errors.iter().collect();
    topics.sort_by(|a, b| a.0.cmp(b.0));

    let mut output = String::new();
    for (topic, code) in topics {
        match code {
            None => output.push_str(&format!("{} {}\n", "Deleted".green(), topic.cyan())),
            Some(code) => output.push_str(&format!(
                "{} {}: {} ({})\n",
                "Failed".red(),
                topic.cyan(),
                code.name(),
                code.description()
            )),
        }
    }

    if response.throttle > Duration::ZERO {
        output.push_str(&format!(
            "{} {}ms\n",
            "Throttled".yellow(),
            response.throttle.as_millis()
        ));
    }

    output.trim_end().to_string()
}

fn delete_topics_json(response: &DeleteTopicsResponse) -> Value {
    let topics: Map<String, Value> = response
        .errors
        .iter()
        .map(|(topic, code)| {
            let value = match code {
                None => Value::Null,
                Some(code) => json!({
                    "code": code.code(),
                    "name": code.name(),
                    "retriable": code.is_retriable(),
                }),
            };
            (topic.clone(), value)
        })
        .collect();

    json!({
        "throttle_ms": response.throttle.as_millis() as u64,
        "topics": topics,
    })
}

fn api_name(key: i16) -> String {
    ApiKey::from_key(key)
        .map(|api| api.name().to_string())
        .unwrap_or_else(|| format!("Unknown({})", key))
}

fn format_api_versions(ranges: &BTreeMap<i16, VersionRange>) -> String {
    if ranges.is_empty() {
        return "Broker advertised no APIs".yellow().to_string();
    }

    ranges
        .iter()
        .map(|(key, range)| format!("{:>3} {:<30} {}", key, api_name(*key).cyan(), range))
        .collect::<Vec<_>>()
        .join("\n")
}

fn api_versions_json(ranges: &BTreeMap<i16, VersionRange>) -> Value {
    Value::Array(
        ranges
            .iter()
            .map(|(key, range)| {
                json!({
                    "api_key": key,
                    "name": api_name(*key),
                    "min_version": range.min,
                    "max_version": range.max,
                })
            })
            .collect(),
    )
}

fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kwire_protocol::ErrorCode;
    use std::collections::HashMap;

    fn response() -> DeleteTopicsResponse {
        let mut errors = HashMap::new();
        errors.insert("t1".to_string(), None);
        errors.insert("t2".to_string(), Some(ErrorCode::UnknownTopicOrPartition));
        DeleteTopicsResponse {
            throttle: Duration::from_millis(20),
            errors,
        }
    }

    #[test]
    fn test_delete_topics_json() {
        let value = delete_topics_json(&response());
        assert_eq!(value["throttle_ms"], 20);
        assert_eq!(value["topics"]["t1"], Value::Null);
        assert_eq!(value["topics"]["t2"]["code"], 3);
        assert_eq!(value["topics"]["t2"]["name"], "UNKNOWN_TOPIC_OR_PARTITION");
    }

    #[test]
    fn test_format_delete_topics_lists_every_topic() {
        colored::control::set_override(false);
        let text = format_delete_topics(&response());
        assert_eq!(
            text,
            "Deleted t1\nFailed t2: UNKNOWN_TOPIC_OR_PARTITION (This server does not host this topic-partition.)\nThrottled 20ms"
        );
    }

    #[test]
    fn test_api_versions_json_names_keys() {
        let mut ranges = BTreeMap::new();
        ranges.insert(20, VersionRange::new(0, 6));
        ranges.insert(999, VersionRange::new(0, 0));
        let value = api_versions_json(&ranges);
        assert_eq!(value[0]["name"], "DeleteTopics");
        assert_eq!(value[0]["max_version"], 6);
        assert_eq!(value[1]["name"], "Unknown(999)");
    }
}
