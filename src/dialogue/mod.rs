pub mod profile;

use serde_json::Value;

pub use profile::VoiceProfile;

/// One turn as sent by the client. Missing fields read as empty strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialogueTurn {
    pub role: Option<String>,
    pub text: Option<String>,
}

impl DialogueTurn {
    /// Read a turn field by field. Non-objects and non-string fields count as
    /// absent, so one malformed turn is dropped instead of voiding the request.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            role: field("role"),
            text: field("text"),
        }
    }
}

#[cfg(test)]
impl DialogueTurn {
    pub fn new(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            text: Some(text.to_string()),
        }
    }
}

/// A turn that survived filtering, ready for synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueSegment {
    /// Position among the surviving segments, not among the original turns.
    pub index: usize,
    pub role: String,
    pub text: String,
    pub profile: VoiceProfile,
}

/// Normalize roles, trim text, and drop empty turns, keeping order.
pub fn segment(turns: &[DialogueTurn]) -> Vec<DialogueSegment> {
    turns
        .iter()
        .filter_map(|turn| {
            let text = turn.text.as_deref().unwrap_or_default().trim();
            if text.is_empty() {
                return None;
            }
            let role = turn.role.as_deref().unwrap_or_default().trim().to_lowercase();
            Some((role, text.to_string()))
        })
        .enumerate()
        .map(|(index, (role, text))| DialogueSegment {
            index,
            profile: VoiceProfile::for_role(&role),
            role,
            text,
        })
        .collect()
}
