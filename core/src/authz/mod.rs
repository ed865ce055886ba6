//! Permission resolution and entity voters.
//!
//! A request asks [voter::VoterRegistry::is_allowed] whether an [Actor][crate::model::user::Actor]
//! may apply an attribute to a subject. The registry picks the voter for the subject's
//! [EntityClass][crate::model::structural::EntityClass], which maps the attribute into the
//! class namespace and hands it to the [resolver::PermissionResolver].

pub mod attribute;
pub mod resolver;
pub mod voter;
