//! Boot-time address translation.

pub mod paging;
