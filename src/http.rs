pub(crate) mod controller;
pub(crate) mod error;
pub(crate) mod handlers;
pub(crate) mod probe_request;
