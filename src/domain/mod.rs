/// +----------------------------------------------------------+
/// | MODULES                                                  |
/// +----------+-------+-------+------------------------------+
/// | Exports:                                                 |
/// |   - models                                               |
/// |   - events                                               |
/// |   - ports                                                |
/// |   - services                                             |
/// +----------------------------------------------------------+
pub mod events;
pub mod models;
pub mod ports;
pub mod services;
