pub mod config;
pub mod logger;
pub mod error;
pub mod storage;
pub mod post;
pub mod post_parser;
pub mod markdown;
pub mod post_index;
pub mod content_store;
pub mod sitemap;
pub mod view;
pub mod server;
mod text_utils;
mod test_data;
