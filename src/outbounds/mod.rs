/// +----------------------------------------------------------+
/// | MODULES                                                  |
/// +----------+-------+-------+------------------------------+
/// | Exports:                                                 |
/// |   - amqp (AmqpTransport, AmqpDeliverySource)             |
/// |   - contract_generator (TextContractGenerator)           |
/// |   - memory_broker (InMemoryBroker, InMemoryDeliveries)   |
/// |   - memory_store (InMemoryStore)                         |
/// +----------------------------------------------------------+
pub mod amqp;
pub mod contract_generator;
pub mod memory_broker;
pub mod memory_store;

pub use amqp::{AmqpDeliverySource, AmqpTransport};
pub use contract_generator::TextContractGenerator;
pub use memory_broker::{DeadLetter, InMemoryBroker, InMemoryDeliveries};
pub use memory_store::InMemoryStore;
