//! Devices the bring-up path talks to directly.

pub mod serial;
