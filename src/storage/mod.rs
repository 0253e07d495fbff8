//! Persistence seams for work units and stored objects
//!
//! The orchestrator and dispatcher depend only on these traits; an in-memory
//! map and a durable store are equally valid implementations.

pub mod objects;
pub mod sessions;
pub mod templates;

pub use objects::{InMemoryObjectStore, ObjectAcl, ObjectStore, StoredObject};
pub use sessions::{
    EditRecord, InMemorySessionStore, NewEditRecord, NewWorkUnit, SessionStore, WorkUnitPatch,
};
pub use templates::{InMemoryTemplateStore, NewTemplate, Template, TemplateStore};
