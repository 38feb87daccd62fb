use crate::types::{ConstraintId, ConstraintKind, EntityId, EntityKind};

/// Errors from building or editing a sketch.
///
/// Every variant is fatal to the call that produced it and leaves the
/// session unchanged. Failing to converge is not an error; see `SolveReport`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SketchError {
    #[error("entity {id} does not exist")]
    MissingEntity { id: EntityId },

    #[error("entity {id} is a {kind:?}, expected a point")]
    NotAPoint { id: EntityId, kind: EntityKind },

    #[error("entity id {id} is already in use")]
    DuplicateEntity { id: EntityId },

    #[error("entity {id} is still referenced by {by}")]
    EntityInUse { id: EntityId, by: String },

    #[error("unknown constraint type: {0}")]
    UnknownConstraintKind(String),

    #[error("{kind} takes {expected} entities, got {got}")]
    WrongEntityCount {
        kind: ConstraintKind,
        expected: usize,
        got: usize,
    },

    #[error("constraint weight must be finite and positive, got {weight}")]
    InvalidWeight { weight: f64 },

    #[error("{kind} requires a value")]
    MissingValue { kind: ConstraintKind },

    #[error("constraint {id} does not exist")]
    ConstraintNotFound { id: ConstraintId },

    #[error("unknown parameter: {name}")]
    UnknownParameter { name: String },

    #[error("invalid solver config: {0}")]
    InvalidConfig(String),
}
