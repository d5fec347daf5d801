pub mod autosave;
pub mod cli;
pub mod config;
pub mod errors;
pub mod filter;
pub mod logging;
pub mod models;
pub mod schema;
pub mod selection;
pub mod session;
pub mod sort;
pub mod store;
pub mod theme;
pub mod tracker;

pub use crate::errors::{AppError, AppResult};
pub use crate::models::{
    Advisory, Facet, FacetSelection, FacetValues, Field, QueryField, Record, SessionState, Status, WindowGeometry,
};
pub use crate::schema::{DatasetKind, DatasetRegistry, DatasetSchema};
pub use crate::session::{SessionStore, TomlSessionStore};
pub use crate::store::{JsonFileStore, RecordStore};
pub use crate::tracker::{RecordEdit, Tracker};
