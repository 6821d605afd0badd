//! Transport adapters.

pub mod memory;
#[cfg(feature = "zmq-transport")]
pub mod zmq;

pub use memory::{BrokerReply, MemoryConnector, MemoryContext};
#[cfg(feature = "zmq-transport")]
pub use self::zmq::{ZmqClient, ZmqConnector, ZmqContext, ZmqPool};
