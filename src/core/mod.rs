// Range engine: key resolution, paging, limits, rendering, and errors.
pub mod error;
pub mod fetch;
pub mod keys;
pub mod page;
pub mod render;
