pub mod abbrev;
pub mod config;
pub mod entities;
pub mod error;
pub mod feed;
pub mod goods;
pub mod html;
pub mod image_proxy;
pub mod links;
pub mod markdown;
pub mod render;
pub mod routes;
pub mod server;
pub mod summary;
pub mod theme;
pub mod upstream;
pub mod viewer;

pub use error::{Error, Result};
