//! Expression-tree trigger encoding for genetic programming.

pub mod candidate;
pub mod generate;
pub mod operators;
pub mod tree;

pub use candidate::{
    DEFAULT_MAX_HEIGHT, ExprEvaluator, ExprTrigger, GpTarget, Invalid, TriggerPair, check_validity,
};
pub use generate::{DepthRange, Method};
pub use tree::{BoolExpr, Env, NumExpr, Var};
