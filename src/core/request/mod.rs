use self::parameters::{Action, ActionDescription, SessionId};
use super::object::UntypedObject;

pub mod parameters;

/// Protocol revision written into every outbound request.
pub const PROTOCOL_VERSION: &str = "4.0";

/// What a proof is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestScope {
    /// One nullifier per user and action.
    Action {
        action: String,
        description: Option<String>,
    },
    /// Action-less flow; the wallet binds the proof to a session identifier. `session_id` is
    /// set when an existing session is being resumed.
    Session { session_id: Option<String> },
}

impl RequestScope {
    pub fn action(action: impl Into<String>) -> Self {
        Self::Action {
            action: action.into(),
            description: None,
        }
    }

    pub(crate) fn write_into(&self, object: &mut UntypedObject) -> anyhow::Result<()> {
        match self {
            RequestScope::Action {
                action,
                description,
            } => {
                object.insert(Action(action.clone()))?;
                if let Some(description) = description {
                    object.insert(ActionDescription(description.clone()))?;
                }
            }
            RequestScope::Session { session_id } => {
                if let Some(session_id) = session_id {
                    object.insert(SessionId(session_id.clone()))?;
                }
            }
        }
        Ok(())
    }
}
