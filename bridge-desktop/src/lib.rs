//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts
//! (macOS, Windows, Linux).
//!
//! - `HttpClient` using `reqwest`, with streamed response bodies
//! - `CredentialSupplier` reading the site's credential file
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileTokenSupplier, ReqwestHttpClient};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let credentials = FileTokenSupplier::new(&site.credentials_path);
//! ```

mod credentials;
mod http;

pub use credentials::FileTokenSupplier;
pub use http::ReqwestHttpClient;
