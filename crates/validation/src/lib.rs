//! Consistency validation for Kickoff.
//!
//! Detects answers that assert entities the executor never retrieved.
//! See [`ConsistencyValidator`].

pub mod extract;
pub mod shapes;
pub mod validator;
pub mod vocabulary;

pub use extract::{Extractor, Listing};
pub use shapes::{SELF_REFERENCE, SHAPES, ShapeMatcher};
pub use validator::ConsistencyValidator;
pub use vocabulary::Vocabulary;
