//! Request handlers

pub mod debt;
pub mod documents;
pub mod gateway;
pub mod health;
pub mod methods;
pub mod payments;
