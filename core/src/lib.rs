pub mod coach;
pub mod db;
pub mod food_table;
pub mod models;
pub mod nutrients;
pub mod search;
pub mod service;
pub mod targets;
