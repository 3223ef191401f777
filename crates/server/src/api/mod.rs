pub mod handlers;
pub mod middleware;
pub mod records;
pub mod routes;
pub mod runs;
pub mod scrape;
pub mod ws;

pub use routes::create_router;
