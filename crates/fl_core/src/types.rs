use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Free-form extra fields attached to an article. Forwarded to the model
/// untouched, never interpreted.
pub type Metadata = Map<String, Value>;

/// A submitted news article after normalization.
///
/// The only way to build one is [`Article::normalize`], so a constructed
/// article always has a non-empty, trimmed body.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    title: String,
    body: String,
    metadata: Metadata,
}

impl Article {
    pub fn normalize(title: &str, body: &str, metadata: Metadata) -> Result<Self> {
        let body = body.trim();
        if body.is_empty() {
            return Err(Error::EmptyBody);
        }
        Ok(Self {
            title: title.trim().to_string(),
            body: body.to_string(),
            metadata,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The JSON object sent to the model: `title`, `body`, then every
    /// metadata entry whose key does not shadow those two.
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("title".to_string(), Value::String(self.title.clone()));
        payload.insert("body".to_string(), Value::String(self.body.clone()));
        for (key, value) in &self.metadata {
            payload.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(payload)
    }
}

impl Serialize for Article {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_payload().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "Low"),
            Confidence::Medium => write!(f, "Medium"),
            Confidence::High => write!(f, "High"),
        }
    }
}

impl FromStr for Confidence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            other => Err(Error::Validation(format!("unknown confidence level: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiteResult {
    #[serde(deserialize_with = "text")]
    pub short_title: String,
    #[serde(deserialize_with = "text")]
    pub summary_easy: String,
    #[serde(deserialize_with = "text_list")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlternativeHeadlines {
    #[serde(deserialize_with = "optional_text")]
    pub neutral: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub sensational: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub calm: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Claim {
    #[serde(deserialize_with = "text")]
    pub text: String,
    #[serde(deserialize_with = "optional_score")]
    pub credibility_score: Option<i64>,
    #[serde(deserialize_with = "confidence")]
    pub confidence: Option<Confidence>,
    #[serde(deserialize_with = "optional_text")]
    pub reason: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub historical_context: Option<String>,
    #[serde(deserialize_with = "text_list")]
    pub sources: Vec<String>,
    #[serde(deserialize_with = "text_list")]
    pub fact_check_sites: Vec<String>,
}

/// Output of the tool-augmented assessment pass. Never carries `tags`;
/// any such key in model output is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepResult {
    #[serde(deserialize_with = "score")]
    pub credibility_score: i64,
    #[serde(deserialize_with = "text")]
    pub bias: String,
    #[serde(deserialize_with = "text")]
    pub sentiment: String,
    #[serde(deserialize_with = "text")]
    pub risk_type: String,
    #[serde(deserialize_with = "text_list")]
    pub red_flags: Vec<String>,
    #[serde(deserialize_with = "text_list")]
    pub trust_signals: Vec<String>,
    #[serde(deserialize_with = "claim_list")]
    pub claims: Vec<Claim>,
    #[serde(deserialize_with = "headlines")]
    pub alternative_headlines: AlternativeHeadlines,
    #[serde(deserialize_with = "coordinate")]
    pub latitude: Option<f64>,
    #[serde(deserialize_with = "coordinate")]
    pub longitude: Option<f64>,
}

/// Flat record combining both passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    pub short_title: String,
    pub summary_easy: String,
    pub tags: Vec<String>,
    pub credibility_score: i64,
    pub bias: String,
    pub sentiment: String,
    pub risk_type: String,
    pub red_flags: Vec<String>,
    pub trust_signals: Vec<String>,
    pub claims: Vec<Claim>,
    pub alternative_headlines: AlternativeHeadlines,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl AnalysisResult {
    /// Deep fields win on overlap; tags only ever come from the lite pass.
    pub fn merge(lite: LiteResult, deep: DeepResult) -> Self {
        Self {
            short_title: lite.short_title,
            summary_easy: lite.summary_easy,
            tags: lite.tags,
            credibility_score: deep.credibility_score,
            bias: deep.bias,
            sentiment: deep.sentiment,
            risk_type: deep.risk_type,
            red_flags: deep.red_flags,
            trust_signals: deep.trust_signals,
            claims: deep.claims,
            alternative_headlines: deep.alternative_headlines,
            latitude: deep.latitude,
            longitude: deep.longitude,
        }
    }
}

// Model output is loosely typed. These decoders absorb wrong-but-harmless
// shapes (null, numbers as strings, stray objects in lists) so a single odd
// field does not throw away the whole structure.

fn scalar_score(value: &Value) -> Option<i64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as i64)
}

fn score<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(scalar_score).unwrap_or(0))
}

fn optional_score<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(scalar_score))
}

fn text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(optional_text(d)?.unwrap_or_default())
}

fn optional_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn text_list<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    })
}

fn confidence<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<Confidence>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

fn claim_list<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<Claim>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(Claim {
                    text,
                    ..Claim::default()
                }),
                other => serde_json::from_value::<Claim>(other).ok(),
            })
            .filter(|claim| !claim.text.trim().is_empty())
            .collect(),
        _ => Vec::new(),
    })
}

fn headlines<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<AlternativeHeadlines, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

fn coordinate<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite()))
}
