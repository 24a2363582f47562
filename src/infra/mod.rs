pub mod api;
pub mod db;
pub mod parser;
pub mod retry;
