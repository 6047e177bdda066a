// seerr-api: Async HTTP/JSON client for Jellyseerr-style media request servers

pub mod client;
pub mod dry_run;
pub mod error;
pub mod transport;

pub use client::{ApiRequest, SeerrClient};
pub use error::{Error, extract_error_message};
pub use transport::{TlsMode, TransportConfig};

pub use reqwest::{Method, StatusCode};
