use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A structured request from the model to run a named capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// Integer argument, accepting numbers and numeric strings.
    pub fn int_arg(&self, key: &str) -> Option<i64> {
        match self.arguments.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// A capability advertised to the model, with a JSON-schema parameter block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationTurn {
    User {
        parts: Vec<String>,
    },
    Model {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        name: String,
        payload: Value,
    },
}

impl ConversationTurn {
    pub fn user<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConversationTurn::User {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, ConversationTurn::ToolResult { .. })
    }
}

/// Append-only turn history for one deep-analysis call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Records an executed call together with its result. The two turns are
    /// always appended as a pair.
    pub fn push_tool_exchange(&mut self, call: ToolCall, payload: Value) {
        let name = call.name.clone();
        self.turns.push(ConversationTurn::Model {
            text: None,
            tool_calls: vec![call],
        });
        self.turns.push(ConversationTurn::ToolResult { name, payload });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
