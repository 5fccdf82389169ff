use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    error::{IdKitError, Result},
    utils::NonEmptyVec,
};

use super::credential::{CredentialRequest, CredentialType};

/// Credential requirement tree.
///
/// On the wire a leaf is a [CredentialRequest] object and a composite node is an object with a
/// single `all`, `any` or `enumerate` key holding a non-empty array of nodes:
///
/// ```json
/// {"all": [{"any": [{"type": "orb"}, {"type": "face"}]}, {"type": "document"}]}
/// ```
///
/// Children of `any` and `enumerate` are listed in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, deny_unknown_fields)]
pub enum ConstraintNode {
    Leaf(CredentialRequest),
    /// Satisfied if every child is satisfied.
    All { all: NonEmptyVec<ConstraintNode> },
    /// Satisfied if at least one child is satisfied.
    Any { any: NonEmptyVec<ConstraintNode> },
    /// Satisfied if at least one child is satisfied; every satisfiable child is reported.
    Enumerate { enumerate: NonEmptyVec<ConstraintNode> },
}

impl ConstraintNode {
    pub fn leaf(request: impl Into<CredentialRequest>) -> Self {
        Self::Leaf(request.into())
    }

    /// # Errors
    /// [IdKitError::EmptyConstraint](crate::error::IdKitError::EmptyConstraint) if `children`
    /// is empty.
    pub fn all(children: Vec<ConstraintNode>) -> Result<Self> {
        Ok(Self::All {
            all: children.try_into()?,
        })
    }

    /// # Errors
    /// [IdKitError::EmptyConstraint](crate::error::IdKitError::EmptyConstraint) if `children`
    /// is empty.
    pub fn any(children: Vec<ConstraintNode>) -> Result<Self> {
        Ok(Self::Any {
            any: children.try_into()?,
        })
    }

    /// # Errors
    /// [IdKitError::EmptyConstraint](crate::error::IdKitError::EmptyConstraint) if `children`
    /// is empty.
    pub fn enumerate(children: Vec<ConstraintNode>) -> Result<Self> {
        Ok(Self::Enumerate {
            enumerate: children.try_into()?,
        })
    }

    /// Whether the credentials in `available` satisfy this tree.
    pub fn evaluate(&self, available: &HashSet<CredentialType>) -> bool {
        self.evaluate_with(&|t| available.contains(&t))
    }

    /// Evaluate against a predicate that reports whether a credential type can be presented.
    pub fn evaluate_with<F>(&self, has_type: &F) -> bool
    where
        F: Fn(CredentialType) -> bool,
    {
        match self {
            ConstraintNode::Leaf(request) => has_type(request.credential_type()),
            ConstraintNode::All { all } => all.iter().all(|n| n.evaluate_with(has_type)),
            ConstraintNode::Any { any } => any.iter().any(|n| n.evaluate_with(has_type)),
            ConstraintNode::Enumerate { enumerate } => {
                enumerate.iter().any(|n| n.evaluate_with(has_type))
            }
        }
    }

    /// The credential to lead with: the first satisfied child of an `any`/`enumerate` root, in
    /// declaration order, or the leaf itself.
    ///
    /// Returns `None` when nothing is satisfied, or when the satisfied subtree is an `all` that
    /// does not reduce to a single credential type.
    pub fn first_satisfying(&self, available: &HashSet<CredentialType>) -> Option<CredentialType> {
        match self {
            ConstraintNode::Leaf(request) => available
                .contains(&request.credential_type())
                .then_some(request.credential_type()),
            ConstraintNode::Any { any: children }
            | ConstraintNode::Enumerate {
                enumerate: children,
            } => children
                .iter()
                .find(|child| child.evaluate(available))
                .and_then(|child| child.first_satisfying(available)),
            ConstraintNode::All { .. } => None,
        }
    }

    /// Credential types to present so that the tree is satisfied, in selection order without
    /// duplicates. `None` if the tree cannot be satisfied.
    pub fn satisfiable_types(
        &self,
        available: &HashSet<CredentialType>,
    ) -> Option<Vec<CredentialType>> {
        fn merge(acc: &mut Vec<CredentialType>, selection: Vec<CredentialType>) {
            for t in selection {
                if !acc.contains(&t) {
                    acc.push(t);
                }
            }
        }

        match self {
            ConstraintNode::Leaf(request) => available
                .contains(&request.credential_type())
                .then(|| vec![request.credential_type()]),
            ConstraintNode::All { all } => {
                let mut acc = Vec::new();
                for child in all.iter() {
                    merge(&mut acc, child.satisfiable_types(available)?);
                }
                Some(acc)
            }
            ConstraintNode::Any { any } => any
                .iter()
                .find_map(|child| child.satisfiable_types(available)),
            ConstraintNode::Enumerate { enumerate } => {
                let mut acc = Vec::new();
                for selection in enumerate
                    .iter()
                    .filter_map(|child| child.satisfiable_types(available))
                {
                    merge(&mut acc, selection);
                }
                (!acc.is_empty()).then_some(acc)
            }
        }
    }

    /// All leaves in declaration order.
    pub fn credential_requests(&self) -> Vec<&CredentialRequest> {
        fn collect<'a>(node: &'a ConstraintNode, out: &mut Vec<&'a CredentialRequest>) {
            match node {
                ConstraintNode::Leaf(request) => out.push(request),
                ConstraintNode::All { all: children }
                | ConstraintNode::Any { any: children }
                | ConstraintNode::Enumerate {
                    enumerate: children,
                } => children.iter().for_each(|child| collect(child, out)),
            }
        }

        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }

    /// Distinct credential types mentioned by the tree, in first-mention order.
    pub fn credential_types(&self) -> Vec<CredentialType> {
        let mut types = Vec::new();
        for request in self.credential_requests() {
            if !types.contains(&request.credential_type()) {
                types.push(request.credential_type());
            }
        }
        types
    }

    /// Validate the maximum nesting depth. Depth counts composite nodes on the deepest path, so a
    /// leaf has depth 0 and a flat list has depth 1.
    pub fn validate_max_depth(&self, max_depth: usize) -> Result<()> {
        let depth = self.depth();
        if depth > max_depth {
            return Err(IdKitError::ConstraintLimit(format!(
                "depth {depth} exceeds {max_depth}"
            )));
        }
        Ok(())
    }

    fn depth(&self) -> usize {
        match self {
            ConstraintNode::Leaf(_) => 0,
            ConstraintNode::All { all: children }
            | ConstraintNode::Any { any: children }
            | ConstraintNode::Enumerate {
                enumerate: children,
            } => 1 + children.iter().map(Self::depth).max().unwrap_or(0),
        }
    }

    /// Validate the maximum total number of nodes, composites and leaves alike. Short-circuits
    /// once the running total exceeds `max_nodes`.
    pub fn validate_max_nodes(&self, max_nodes: usize) -> Result<()> {
        fn count(node: &ConstraintNode, total: &mut usize, max_nodes: usize) -> bool {
            *total += 1;
            if *total > max_nodes {
                return false;
            }
            match node {
                ConstraintNode::Leaf(_) => true,
                ConstraintNode::All { all: children }
                | ConstraintNode::Any { any: children }
                | ConstraintNode::Enumerate {
                    enumerate: children,
                } => children.iter().all(|child| count(child, total, max_nodes)),
            }
        }

        let mut total = 0;
        if !count(self, &mut total, max_nodes) {
            return Err(IdKitError::ConstraintLimit(format!(
                "more than {max_nodes} nodes"
            )));
        }
        Ok(())
    }
}

impl From<CredentialType> for ConstraintNode {
    fn from(value: CredentialType) -> Self {
        Self::leaf(value)
    }
}

impl From<CredentialRequest> for ConstraintNode {
    fn from(value: CredentialRequest) -> Self {
        Self::Leaf(value)
    }
}
