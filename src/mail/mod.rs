pub mod decoders;
pub mod extract;
pub mod gmail_client;
pub mod inspect;
pub mod lister;
pub mod query;
pub mod service;
