pub mod app;
pub mod cache;
pub mod config;
pub mod demo_seeder;
pub mod error;
pub mod state;
pub mod api {
    pub mod admin;
    pub mod ads;
    pub mod errors;
    pub mod listings;
    pub mod pagination;
    pub mod search;
    pub mod upload;
}
pub mod auth {
    pub mod handlers;
    pub mod models;
    pub mod password;
    pub mod session;
}
pub mod db {
    pub mod ad_repository;
    pub mod memory;
    pub mod models;
    pub mod repository;
    pub mod user_repository;
}
pub mod storage {
    pub mod client;
}
pub mod util {
    pub mod text;
}
