//! Channels: typed animation parameters and their connections

#[allow(clippy::module_inception)]
mod channel;
mod channels;

pub use channel::{Channel, ChannelSource, ChannelTarget, ChannelType, Connection};
pub use channels::{Channels, SharedChannels};
