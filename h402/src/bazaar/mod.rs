//! The bazaar discovery extension.
//!
//! A resource server may attach, under extension key [`BAZAAR`], a
//! declaration describing how its paid resource is invoked (query
//! parameters for GET-like methods, a request body for POST-like ones).
//! The server-side hook enriches the declaration with the effective HTTP
//! method at request time; after a verified payment the facilitator side
//! extracts a [`DiscoveredResource`] suitable for cataloging.

mod facilitator;
mod server;
mod types;

pub use facilitator::{
    DiscoveredResource, ValidationResult, extract_discovery_info,
    extract_discovery_info_from_extension, validate_and_extract, validate_discovery_extension,
};
pub use server::BazaarServerExtension;
pub use types::{
    BAZAAR, BodyDiscoveryInfo, BodyInput, DiscoveryExtension, DiscoveryInfo, OutputInfo,
    QueryDiscoveryInfo, QueryInput, declare_discovery_extension, is_body_method, is_query_method,
    parse_discovery_extension, parse_discovery_info,
};
