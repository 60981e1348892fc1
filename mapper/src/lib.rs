pub mod api;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod filters;
pub mod geolocation;
pub mod gpx_export;
pub mod models;
pub mod normalize;
pub mod notice;
pub mod orchestrator;
pub mod overlay;
pub mod replay;
pub mod resolver;
pub mod selection;
pub mod surface;
pub mod trimmer;

pub use crate::api::ProfileApi;
pub use crate::config::MapperConfig;
pub use crate::controller::{MapController, SearchStatus, SearchTicket};
pub use crate::error::MapperError;
pub use crate::notice::Notice;
