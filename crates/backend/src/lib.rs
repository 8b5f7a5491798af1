pub mod backend;
pub mod error;

pub use crate::backend::{Backend, EventStream, ValidationAck};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn Backend + Send + Sync>;
