//! Project board: projects, tasks and issues kept in a PostgREST-style store,
//! with a per-collection query cache in front of it.

#[macro_use]
mod macros;

pub mod metadata {
    include!(concat!(env!("OUT_DIR"), "/pkg_info.rs"));
}

pub mod board;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod data;
pub mod error;
pub mod mapper;
pub mod render;
pub mod sections;
pub mod shell;
pub mod store;
pub mod types;

pub use data::ProjectData;
pub use error::{ServiceError, ServiceResult};
