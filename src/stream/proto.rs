use serde::Deserialize;
use serde_json::Value;

/// One classified record from the stream body.
///
/// Classification is structural: a record with a `user` object and a `text`
/// string is a tweet; a record carrying `limit.track` is a server-side drop
/// total; anything else is kept raw.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamRecord {
    /// A delivered status.
    Tweet(Tweet),
    /// Running total of statuses dropped by the filter.
    TrackLimit {
        /// Total matching statuses dropped so far.
        track: u64,
    },
    /// Valid JSON that matched neither known shape.
    Unclassified(Value),
}

impl StreamRecord {
    /// Classifies a parsed record body.
    pub fn classify(value: Value) -> Self {
        let is_tweet = value.get("user").map(Value::is_object).unwrap_or(false)
            && value.get("text").map(Value::is_string).unwrap_or(false);
        if is_tweet {
            let author = value
                .get("user")
                .cloned()
                .and_then(|user| serde_json::from_value(user).ok())
                .unwrap_or_default();
            let text = value
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return StreamRecord::Tweet(Tweet {
                author,
                text,
                raw: value,
            });
        }

        if let Some(track) = value.pointer("/limit/track").and_then(Value::as_u64) {
            return StreamRecord::TrackLimit { track };
        }

        StreamRecord::Unclassified(value)
    }
}

/// A delivered status with its author and full payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Tweet {
    /// Author fields lifted from the `user` object.
    pub author: TweetAuthor,
    /// Status text.
    pub text: String,
    /// Complete record payload as received.
    pub raw: Value,
}

/// Author fields commonly needed by consumers; the full object stays
/// available on [`Tweet::raw`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TweetAuthor {
    /// Numeric account id.
    pub id: Option<u64>,
    /// String form of the account id.
    pub id_str: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Handle without the leading `@`.
    pub screen_name: Option<String>,
}
