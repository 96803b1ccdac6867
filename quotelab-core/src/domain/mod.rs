//! Domain types for the quoting engine.

pub mod fill;
pub mod ids;
pub mod instrument;
pub mod order;
pub mod tick;

pub use fill::{Fill, SimSnapshot};
pub use ids::OrderTag;
pub use instrument::{Instrument, InstrumentError};
pub use order::{
    DesiredOrder, DesiredOrders, LiveOrder, LiveOrders, OrderStatus, Side, TimeInForce,
};
pub use tick::Tick;
