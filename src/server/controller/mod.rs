pub(crate) mod error;
pub(crate) mod orders;
pub(crate) mod rooms;
