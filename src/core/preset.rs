use serde::{Deserialize, Serialize};

use super::{
    constraints::ConstraintNode,
    credential::{CredentialRequest, Signal, VerificationLevel},
};
use crate::utils::NonEmptyVec;

/// Requests expressed the way verifiers without constraint support understand them.
///
/// A preset expands to an `any` over the credential types its verification level accepts, in
/// the level's priority order, each carrying the preset's signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Preset {
    OrbLegacy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal: Option<Signal>,
    },
    SecureDocumentLegacy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal: Option<Signal>,
    },
    DocumentLegacy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal: Option<Signal>,
    },
    SelfieCheckLegacy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal: Option<Signal>,
    },
    DeviceLegacy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal: Option<Signal>,
    },
}

impl Preset {
    pub fn verification_level(&self) -> VerificationLevel {
        match self {
            Preset::OrbLegacy { .. } => VerificationLevel::Orb,
            Preset::SecureDocumentLegacy { .. } => VerificationLevel::SecureDocument,
            Preset::DocumentLegacy { .. } => VerificationLevel::Document,
            Preset::SelfieCheckLegacy { .. } => VerificationLevel::Face,
            Preset::DeviceLegacy { .. } => VerificationLevel::Device,
        }
    }

    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Preset::OrbLegacy { signal }
            | Preset::SecureDocumentLegacy { signal }
            | Preset::DocumentLegacy { signal }
            | Preset::SelfieCheckLegacy { signal }
            | Preset::DeviceLegacy { signal } => signal.as_ref(),
        }
    }

    /// The constraint tree equivalent to this preset.
    pub fn to_constraints(&self) -> ConstraintNode {
        let mut leaves = self
            .verification_level()
            .accepted_credentials()
            .iter()
            .map(|credential_type| {
                let request = CredentialRequest::new(*credential_type);
                ConstraintNode::Leaf(match self.signal() {
                    Some(signal) => request.with_signal(signal.clone()),
                    None => request,
                })
            });

        // Every level accepts at least one credential type.
        let mut children = match leaves.next() {
            Some(first) => NonEmptyVec::new(first),
            None => unreachable!("verification levels accept at least one credential"),
        };
        leaves.for_each(|leaf| children.push(leaf));
        ConstraintNode::Any { any: children }
    }
}
