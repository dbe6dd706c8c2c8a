//! Read/write repositories for projects, tags and profiles.

pub mod profiles;
pub mod projects;
pub mod tags;

pub use profiles::ProfileStore;
pub use projects::{NewProject, ProjectFilter, ProjectStore, ProjectUpdate};
pub use tags::{TagQuery, TagSort, TagStore};
