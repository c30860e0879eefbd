pub mod api;
pub mod common;
pub mod db;
pub mod ledger;
pub mod mongodb;
pub mod photo;
