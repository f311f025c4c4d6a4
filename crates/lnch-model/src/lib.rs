mod error;
pub use error::ModelError;

pub mod kind;
pub use kind::Role;

mod domain;
pub use domain::*;

mod event;
pub use event::{EventKind, SessionEvent, Subscribe};
