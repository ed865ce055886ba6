pub mod authz;
pub mod conf;
pub mod crud;
pub mod error;
pub mod model;
pub mod schema;
pub mod tree;
