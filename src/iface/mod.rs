//! Contains utilities for creating and configuring virtual (TAP) network interfaces.

mod create;
pub(crate) mod configure;
mod stream;

pub use self::create::EtherIfaceBuilder;
pub use self::stream::EtherIface;
