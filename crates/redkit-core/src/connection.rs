//! Connection seam between the façade and the `redis` crate

use redis::aio::ConnectionLike;

use crate::options::CommandFlags;

/// A shareable connection that can be pointed at a node class per command
///
/// Clones share the same underlying multiplexed connection. `routed` returns a
/// clone whose commands go to the primary or to a replica according to the
/// placement flag; connections with a single node ignore the flag.
pub trait RoutedConnection: ConnectionLike + Clone + Send + Sync + 'static {
    fn routed(&self, flags: CommandFlags) -> Self;
}
