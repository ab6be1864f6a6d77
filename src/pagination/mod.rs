//! Pagination module
//!
//! Supports: Link Header, Next URL, Cursor, Offset
//!
//! # Overview
//!
//! Each strategy looks at one successfully decoded page and decides what
//! the next request is, or that the listing is complete. Throttled and
//! failed requests never reach a strategy, so a cursor only ever advances
//! past data that was actually received.

mod strategies;
mod types;

pub use strategies::{
    parse_link_header, CursorPaginator, LinkHeaderPaginator, NextUrlPaginator, OffsetPaginator,
};
pub use types::{extract_jsonpath, NextPage, PaginationState, Paginator};
