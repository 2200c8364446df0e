//! Network retrieval: the single-request transport and the retry/failover
//! policy built on top of it.

mod charset;
mod policy;
mod transport;

pub use charset::{charset_from_content_type, decode_body};
pub use policy::{FetchPolicy, Retrieved};
pub use transport::{select_proxy, Transport, TransportError, TransportResponse};
