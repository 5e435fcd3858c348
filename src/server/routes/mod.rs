//! Route handlers, grouped by audience: `stream` is fetched by the cast
//! device, everything else is the control API.

pub mod devices;
pub mod events;
pub mod library;
pub mod session;
pub mod stream;

use std::str::FromStr;

use castit_core::Error;

/// Parse a path segment into a typed id.
pub(crate) fn parse_id<T: FromStr>(raw: &str, entity: &str) -> Result<T, Error> {
    raw.parse()
        .map_err(|_| Error::Validation(format!("invalid {entity} id: {raw}")))
}
