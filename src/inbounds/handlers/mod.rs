/// +----------------------------------------------------------+
/// | MODULES                                                  |
/// +----------+-------+-------+------------------------------+
/// | Exports:                                                 |
/// |   - agreement_handler                                    |
/// |   - notification_handler                                 |
/// +----------------------------------------------------------+

/// Handlers for agreement lifecycle requests
pub mod agreement_handler;

/// Handlers for notification read-side requests
pub mod notification_handler;
