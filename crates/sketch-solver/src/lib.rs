pub mod constraint;
pub mod entity;
pub mod error;
pub mod evaluate;
pub mod parametric;
pub mod session;
pub mod solver;
pub mod status;
pub mod types;
pub mod variables;

pub use entity::{PinState, PositionSnapshot};
pub use error::SketchError;
pub use parametric::ParameterTable;
pub use session::SketchSession;
pub use solver::{SolveMethod, SolveReport, SolveState, SolverConfig};
pub use status::{ConstraintBalance, ConstraintStatus, SketchStatus};
pub use types::*;
