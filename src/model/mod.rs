//! Pretrained model download, session construction, and shared handles.

mod loader;
mod session;

pub use loader::{ModelCache, ModelType};
pub use session::{Device, LazySession, SessionFactory};
