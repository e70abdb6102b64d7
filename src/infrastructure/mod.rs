pub mod api_error;
pub mod auth_client;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod storage;
pub mod todo_api_client;
pub mod token_decoder;
