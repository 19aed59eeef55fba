//! Observer hook for visualization and tooling.

use crate::Node;
use ricart_core::Topology;
use ricart_types::VirtualTime;

/// Receives the simulation state after every mutating operation.
///
/// This is the only coupling point between the engine and whatever renders
/// it. The observer gets shared borrows only and cannot change the
/// simulation. Node positions and any other presentation state belong to the
/// observer.
///
/// Closures of the right shape implement this trait:
///
/// ```ignore
/// let sim = Simulation::builder(config)
///     .with_observer(|_topology: &Topology, nodes: &[Node], now: VirtualTime| {
///         println!("T={now}: {} nodes", nodes.len());
///     })
///     .build()?;
/// ```
pub trait Observer {
    /// Called with the topology, the node table (indexed by node id) and the
    /// current virtual time.
    fn on_update(&mut self, topology: &Topology, nodes: &[Node], now: VirtualTime);
}

impl<F> Observer for F
where
    F: FnMut(&Topology, &[Node], VirtualTime),
{
    fn on_update(&mut self, topology: &Topology, nodes: &[Node], now: VirtualTime) {
        self(topology, nodes, now)
    }
}
