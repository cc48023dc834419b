//! HTTP handlers, one module per resource

pub mod auth;
pub mod bills;
pub mod case_categories;
pub mod cases;
pub mod common;
pub mod doctors;
pub mod expenses;
pub mod health;
pub mod images;
pub mod notes;
pub mod notifications;
pub mod patients;
pub mod public_patients;
pub mod recipes;
pub mod reports;
pub mod reservations;
pub mod secretaries;
pub mod settings;
pub mod tenants;
