//! Query functions, one module per table.

pub mod budget_items;
pub mod plans;
pub mod users;
