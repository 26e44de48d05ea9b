// src/models/mod.rs

pub mod exam;
pub mod question;
pub mod result;
pub mod subject;
pub mod user;
