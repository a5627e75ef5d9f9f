//! Embassy tasks

pub mod controller;
pub mod target;
