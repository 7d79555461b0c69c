//! Inbound commands to the application core.
//!
//! The broker delivers shared-attribute updates as free-form JSON.  A payload
//! becomes a [`RelayCommand`] only when it carries a recognisable `state`;
//! everything else is reported as [`MalformedCommand`] and ignored by the
//! caller.
//!
//! Accepted shapes:
//!
//! ```text
//! {"state": true}
//! {"shared": {"state": "off"}}      attribute-request response envelope
//! {"state": 1}
//! ```

use serde_json::Value;

use crate::error::MalformedCommand;

/// Desired relay level requested by the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayCommand {
    pub state: bool,
}

impl RelayCommand {
    pub const fn new(state: bool) -> Self {
        Self { state }
    }

    /// Interpret a raw inbound payload.
    pub fn parse(payload: &[u8]) -> Result<Self, MalformedCommand> {
        let doc: Value = serde_json::from_slice(payload).map_err(|_| MalformedCommand::NotJson)?;
        let obj = doc.as_object().ok_or(MalformedCommand::NotJson)?;

        let raw = obj
            .get("state")
            .or_else(|| obj.get("shared").and_then(|s| s.get("state")))
            .ok_or(MalformedCommand::MissingState)?;

        state_from_value(raw)
            .map(Self::new)
            .ok_or(MalformedCommand::InvalidState)
    }
}

fn state_from_value(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|x| x != 0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("on") || s == "1" {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("off") || s == "0"
            {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}
