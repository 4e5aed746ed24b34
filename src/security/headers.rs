//! Header manipulation for forwarded requests.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers
//! - Substitute the Host header with the backend authority
//! - Drop the caller's Accept-Encoding; the upstream client negotiates its own
//!
//! # Design Decisions
//! - The caller's map is never mutated; a filtered copy is built
//! - Repeated headers keep their relative order

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

const HOP_BY_HOP: [HeaderName; 5] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || name == "keep-alive" || name == "proxy-connection"
}

/// Build the header map sent upstream for an inbound request.
pub fn forwardable_headers(inbound: &HeaderMap, backend_authority: Option<&HeaderValue>) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound.iter() {
        if is_hop_by_hop(name) || name == header::HOST || name == header::ACCEPT_ENCODING {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }
    if let Some(authority) = backend_authority {
        outbound.insert(header::HOST, authority.clone());
    }
    outbound
}
