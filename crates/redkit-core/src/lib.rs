//! # Redkit Core
//!
//! Shared types for the redkit Redis façade: the error taxonomy, command
//! options, expiry and paging helpers, lifecycle events and the serializer
//! contract.

pub mod connection;
pub mod entry;
pub mod error;
pub mod events;
pub mod expiry;
pub mod options;
pub mod paging;
pub mod serialization;

pub use connection::RoutedConnection;
pub use entry::SortedSetEntry;
pub use error::{RedkitError, RedkitResult, require_key};
pub use events::{
    ConnectionEvent, ConnectionFailure, ConnectionType, EventObserver, FailureType, HashSlotMove,
    InternalError,
};
pub use expiry::Expiry;
pub use options::{
    Aggregate, CommandFlags, Exclude, KeyType, ListSide, Order, ScoreRange, SetOperation, When,
};
pub use paging::PageRange;
pub use serialization::{JsonSerializer, Serializer};
