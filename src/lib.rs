pub mod admin;
pub mod balance;
pub mod book;
pub mod calculator;
pub mod config;
pub mod market;
pub mod observability;
pub mod order;
pub mod persistence;
pub mod session;
pub mod strategy;
pub mod types;
