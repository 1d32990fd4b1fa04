/// +----------------------------------------------------------+
/// | MODULES                                                  |
/// +----------+-------+-------+------------------------------+
/// | Exports:                                                 |
/// |   - api_error                                            |
/// |   - consumer                                             |
/// |   - dtos                                                 |
/// |   - handlers                                             |
/// +----------------------------------------------------------+

/// Error types for the inbound API layer.
pub mod api_error;

/// The notifications queue consumer loop.
pub mod consumer;

/// Data transfer objects for API requests and responses.
pub mod dtos;

/// Request handlers for inbound messages.
pub mod handlers;
