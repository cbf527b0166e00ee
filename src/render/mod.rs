/// Rendering: declarative chart requests and the sinks that draw them.
pub mod plot;
pub mod request;
