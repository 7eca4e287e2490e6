//! Observability hooks
//!
//! The adaptation layer reports every frame it hands to the link (`on_tx`), every frame it gets
//! from the link (`on_rx`) and every packet it discards on purpose (`on_drop`).

use core::fmt;

/// Why a packet was discarded
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DropReason {
    /// A reassembly didn't complete before its expiration timeout
    FragmentTimeout,
    /// A reassembly was evicted to make room for a new one
    FragmentBufferFull,
    /// The frame uses a dispatch this layer doesn't process (e.g. MESH, BC0)
    UnknownExtension,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            DropReason::FragmentTimeout => "fragment timeout",
            DropReason::FragmentBufferFull => "fragment buffer full",
            DropReason::UnknownExtension => "unknown extension",
        })
    }
}

/// Receives the events of the adaptation layer; all hooks default to doing nothing
pub trait Observer {
    /// A frame is about to be handed to the link
    fn on_tx(&mut self, _frame: &[u8]) {}

    /// A frame has been received from the link
    fn on_rx(&mut self, _frame: &[u8]) {}

    /// A packet (or fragment) has been discarded
    fn on_drop(&mut self, _reason: DropReason, _packet: &[u8]) {}
}

/// Ignores all events
impl Observer for () {}

impl<'a, O> Observer for &'a mut O
where
    O: Observer + ?Sized,
{
    fn on_tx(&mut self, frame: &[u8]) {
        (**self).on_tx(frame)
    }

    fn on_rx(&mut self, frame: &[u8]) {
        (**self).on_rx(frame)
    }

    fn on_drop(&mut self, reason: DropReason, packet: &[u8]) {
        (**self).on_drop(reason, packet)
    }
}

/// An event, as stored by `Recorder`
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// See `Observer::on_tx`
    Tx(Vec<u8>),
    /// See `Observer::on_rx`
    Rx(Vec<u8>),
    /// See `Observer::on_drop`
    Drop(DropReason, Vec<u8>),
}

/// Stores all the events it observes
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    /// Events in the order they were observed
    pub events: Vec<Event>,
}

impl Recorder {
    /// Creates an empty recorder
    pub fn new() -> Self {
        Recorder::default()
    }

    /// Drop reasons, in order
    pub fn drops(&self) -> Vec<DropReason> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Drop(reason, _) => Some(*reason),
                _ => None,
            })
            .collect()
    }

    /// Frames that were handed to the link, in order
    pub fn transmitted(&self) -> Vec<&[u8]> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Tx(frame) => Some(&frame[..]),
                _ => None,
            })
            .collect()
    }
}

impl Observer for Recorder {
    fn on_tx(&mut self, frame: &[u8]) {
        self.events.push(Event::Tx(frame.to_vec()));
    }

    fn on_rx(&mut self, frame: &[u8]) {
        self.events.push(Event::Rx(frame.to_vec()));
    }

    fn on_drop(&mut self, reason: DropReason, packet: &[u8]) {
        self.events.push(Event::Drop(reason, packet.to_vec()));
    }
}
