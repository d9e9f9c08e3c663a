pub mod costs;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod store;
