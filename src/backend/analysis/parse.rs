/**
 * Oracle Prompt and Reply Handling
 *
 * The oracle is asked for a strict JSON object but is free to wrap it in a
 * markdown code fence, add prose around it, or get the types wrong. Replies
 * are therefore sanitized (fence stripped, trimmed, sliced to the outermost
 * `{...}` span) and then validated field by field.
 *
 * # Accepted Reply
 *
 * ```json
 * {
 *   "quality": 72,
 *   "sentiment": "Positive",
 *   "topics": ["rust", "async"],
 *   "response": "",
 *   "spamLikelihood": 3
 * }
 * ```
 *
 * - `quality` and `spamLikelihood` must be numbers in [0, 100]
 * - `sentiment` must be positive, neutral or negative (any case)
 * - `topics` may be a list of strings or one comma-separated string
 * - `response` is optional and must be a string when present
 */
use crate::backend::analysis::AnalysisError;
use crate::shared::analysis::AnalysisResult;
use crate::shared::message::Sentiment;
use serde_json::{Map, Value};

const QUALITY_KEYS: &[&str] = &["quality", "Quality"];
const SENTIMENT_KEYS: &[&str] = &["sentiment", "Sentiment"];
const TOPICS_KEYS: &[&str] = &["topics", "Topics"];
const RESPONSE_KEYS: &[&str] = &["response", "Response"];
const SPAM_KEYS: &[&str] = &["spamLikelihood", "SpamLikelihood", "spam_likelihood"];

/// Build the analysis prompt for one message
pub fn build_prompt(message: &str) -> String {
    // Debug formatting quotes and escapes the message so it cannot break out of the prompt
    format!(
        r#"Analyze this chat message and respond with a single JSON object and nothing else.
The object must have exactly these fields:
- "quality": number from 0 to 100 rating substance, clarity and value
- "sentiment": one of "positive", "neutral", "negative"
- "topics": array of short keyword strings
- "response": string answering the message directly if it asks a question, otherwise ""
- "spamLikelihood": number from 0 to 100

Message: {:?}"#,
        message
    )
}

/// Strip code-fence markup and slice the reply to its outermost `{...}` span
pub fn sanitize_reply(raw: &str) -> Result<&str, AnalysisError> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string ("json", "JSON", ...) up to the end of the fence line
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest,
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    let text = text.trim();

    let start = text.find('{').ok_or(AnalysisError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(AnalysisError::NoJsonObject)?;
    if end < start {
        return Err(AnalysisError::NoJsonObject);
    }
    Ok(&text[start..=end])
}

/// Sanitize, parse and validate a raw oracle reply
pub fn parse_reply(raw: &str) -> Result<AnalysisResult, AnalysisError> {
    let json = sanitize_reply(raw)?;
    let value: Value = serde_json::from_str(json)?;
    let object = value
        .as_object()
        .ok_or_else(|| AnalysisError::invalid("reply", "top-level value is not an object"))?;

    let quality = score(object, QUALITY_KEYS, "quality")?;
    let spam_score = score(object, SPAM_KEYS, "spamLikelihood")?;

    let sentiment = match field(object, SENTIMENT_KEYS) {
        Some(Value::String(label)) => label
            .parse::<Sentiment>()
            .map_err(|e| AnalysisError::invalid("sentiment", e.to_string()))?,
        Some(other) => {
            return Err(AnalysisError::invalid(
                "sentiment",
                format!("expected string, got {}", other),
            ))
        }
        None => return Err(AnalysisError::MissingField("sentiment")),
    };

    let topics = match field(object, TOPICS_KEYS) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(topic) => Ok(topic.trim().to_string()),
                other => Err(AnalysisError::invalid(
                    "topics",
                    format!("non-string topic {}", other),
                )),
            })
            .filter(|topic| !matches!(topic, Ok(t) if t.is_empty()))
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|topic| !topic.is_empty())
            .map(str::to_string)
            .collect(),
        Some(other) => {
            return Err(AnalysisError::invalid(
                "topics",
                format!("expected list or string, got {}", other),
            ))
        }
        None => return Err(AnalysisError::MissingField("topics")),
    };

    let response = match field(object, RESPONSE_KEYS) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(answer)) => answer.clone(),
        Some(other) => {
            return Err(AnalysisError::invalid(
                "response",
                format!("expected string, got {}", other),
            ))
        }
    };

    Ok(AnalysisResult {
        quality,
        sentiment,
        topics,
        response,
        spam_score,
    })
}

fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

fn score(
    object: &Map<String, Value>,
    keys: &[&str],
    name: &'static str,
) -> Result<f64, AnalysisError> {
    let value = field(object, keys).ok_or(AnalysisError::MissingField(name))?;
    let number = value
        .as_f64()
        .ok_or_else(|| AnalysisError::invalid(name, format!("expected number, got {}", value)))?;
    if !(0.0..=100.0).contains(&number) {
        return Err(AnalysisError::invalid(name, format!("{} is outside [0, 100]", number)));
    }
    Ok(number)
}
