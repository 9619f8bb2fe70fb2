//! Software network devices that the lab's interfaces get plugged into.

use crate::priv_prelude::*;

mod channel;
mod switch;

pub use self::{
    channel::EtherChannel,
    switch::EtherSwitch,
};

/// Anything that can be plugged into a switch port: a `Stream` of the frames it transmits and a
/// `Sink` for the frames delivered to it.
pub trait EtherSinkStream:
    Stream<Item = io::Result<EtherFrame>>
    + Sink<EtherFrame, Error = io::Error>
    + Send
    + 'static
{
}

impl<T> EtherSinkStream for T
where
    T: Stream<Item = io::Result<EtherFrame>>,
    T: Sink<EtherFrame, Error = io::Error>,
    T: Send + 'static,
{
}
