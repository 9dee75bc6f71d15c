pub(crate) mod store;
pub(crate) mod memory_store;
pub(crate) mod shelf_store;
