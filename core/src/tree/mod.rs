//! Generic tree views over structural entity classes.

pub mod builder;
pub mod cache;
pub mod generator;
pub mod node;
pub mod repository;
