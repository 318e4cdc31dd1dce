//! # LMS Common Library
//!
//! Shared code for the LMS catalog service including:
//! - Database initialization and entity models
//! - Course aggregate repository (courses, modules, lessons)
//! - Categories, enrollments, quizzes, certificates
//! - Denormalized count reconciler (repair routines)
//! - Configuration loading

pub mod catalog;
pub mod categories;
pub mod certificates;
pub mod config;
pub mod counts;
pub mod courses;
pub mod dashboard;
pub mod db;
pub mod enrollments;
pub mod error;
pub mod pagination;
pub mod quizzes;
pub mod reconcile;
pub mod time;

pub use error::{Error, Result};
