//! Market event types
//!
//! The closed set of dxfeed event kinds, their static schemas and the typed
//! records decoded from data frames.

mod records;
pub mod schema;

pub use records::{
    Candle, FieldValue, Greeks, Profile, Quote, Summary, TheoPrice, TimeAndSale, TimeAndSaleKind,
    Trade, Underlying,
};
pub use schema::{EventSchema, FieldSpec, ValueKind};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StreamerError;

/// Transactional update spanning several events is in progress
pub const TX_PENDING: i64 = 0x1;
/// The event with this index has to be removed
pub const REMOVE_EVENT: i64 = 0x2;
/// First event of a snapshot
pub const SNAPSHOT_BEGIN: i64 = 0x4;
/// Last event of a complete snapshot
pub const SNAPSHOT_END: i64 = 0x8;
/// Last event of a snapshot truncated by a data limit
pub const SNAPSHOT_SNIP: i64 = 0x10;
/// Switches snapshot mode on without starting synchronization
pub const SNAPSHOT_MODE: i64 = 0x40;

/// Event kinds carried by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    Quote,
    Trade,
    Summary,
    Greeks,
    TheoPrice,
    TimeAndSale,
    Profile,
    Underlying,
    Candle,
}

impl EventType {
    /// All event types
    pub fn all() -> &'static [EventType] {
        &[
            EventType::Quote,
            EventType::Trade,
            EventType::Summary,
            EventType::Greeks,
            EventType::TheoPrice,
            EventType::TimeAndSale,
            EventType::Profile,
            EventType::Underlying,
            EventType::Candle,
        ]
    }

    /// Wire name used in subscription commands and data frames
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Quote => "Quote",
            EventType::Trade => "Trade",
            EventType::Summary => "Summary",
            EventType::Greeks => "Greeks",
            EventType::TheoPrice => "TheoPrice",
            EventType::TimeAndSale => "TimeAndSale",
            EventType::Profile => "Profile",
            EventType::Underlying => "Underlying",
            EventType::Candle => "Candle",
        }
    }

    /// Look up a wire name, `None` for types outside the schema table
    pub fn from_wire(name: &str) -> Option<EventType> {
        EventType::all().iter().copied().find(|t| t.as_str() == name)
    }

    /// Static schema for this event type
    pub fn schema(&self) -> &'static EventSchema {
        match self {
            EventType::Quote => &schema::QUOTE,
            EventType::Trade => &schema::TRADE,
            EventType::Summary => &schema::SUMMARY,
            EventType::Greeks => &schema::GREEKS,
            EventType::TheoPrice => &schema::THEO_PRICE,
            EventType::TimeAndSale => &schema::TIME_AND_SALE,
            EventType::Profile => &schema::PROFILE,
            EventType::Underlying => &schema::UNDERLYING,
            EventType::Candle => &schema::CANDLE,
        }
    }

    /// Whether events of this type carry a per-symbol index and sequence
    pub fn is_indexed(&self) -> bool {
        matches!(
            self,
            EventType::Candle
                | EventType::Greeks
                | EventType::TheoPrice
                | EventType::TimeAndSale
                | EventType::Underlying
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = StreamerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::from_wire(s).ok_or_else(|| StreamerError::UnknownEventType(s.to_string()))
    }
}

/// Indexed events can be corrected or cancelled after delivery
pub trait IndexedEvent {
    fn event_flags(&self) -> i64;
    fn index(&self) -> i64;
    fn sequence(&self) -> i64;

    fn pending(&self) -> bool {
        self.event_flags() & TX_PENDING != 0
    }

    fn remove(&self) -> bool {
        self.event_flags() & REMOVE_EVENT != 0
    }

    fn snapshot_begin(&self) -> bool {
        self.event_flags() & SNAPSHOT_BEGIN != 0
    }

    fn snapshot_end(&self) -> bool {
        self.event_flags() & SNAPSHOT_END != 0
    }

    fn snapshot_snip(&self) -> bool {
        self.event_flags() & SNAPSHOT_SNIP != 0
    }

    fn snapshot_mode(&self) -> bool {
        self.event_flags() & SNAPSHOT_MODE != 0
    }
}

/// A decoded event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    Quote(Quote),
    Trade(Trade),
    Summary(Summary),
    Greeks(Greeks),
    TheoPrice(TheoPrice),
    TimeAndSale(TimeAndSale),
    Profile(Profile),
    Underlying(Underlying),
    Candle(Candle),
}

impl MarketEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            MarketEvent::Quote(_) => EventType::Quote,
            MarketEvent::Trade(_) => EventType::Trade,
            MarketEvent::Summary(_) => EventType::Summary,
            MarketEvent::Greeks(_) => EventType::Greeks,
            MarketEvent::TheoPrice(_) => EventType::TheoPrice,
            MarketEvent::TimeAndSale(_) => EventType::TimeAndSale,
            MarketEvent::Profile(_) => EventType::Profile,
            MarketEvent::Underlying(_) => EventType::Underlying,
            MarketEvent::Candle(_) => EventType::Candle,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            MarketEvent::Quote(e) => &e.event_symbol,
            MarketEvent::Trade(e) => &e.event_symbol,
            MarketEvent::Summary(e) => &e.event_symbol,
            MarketEvent::Greeks(e) => &e.event_symbol,
            MarketEvent::TheoPrice(e) => &e.event_symbol,
            MarketEvent::TimeAndSale(e) => &e.event_symbol,
            MarketEvent::Profile(e) => &e.event_symbol,
            MarketEvent::Underlying(e) => &e.event_symbol,
            MarketEvent::Candle(e) => &e.event_symbol,
        }
    }

    pub fn event_time(&self) -> i64 {
        match self {
            MarketEvent::Quote(e) => e.event_time,
            MarketEvent::Trade(e) => e.event_time,
            MarketEvent::Summary(e) => e.event_time,
            MarketEvent::Greeks(e) => e.event_time,
            MarketEvent::TheoPrice(e) => e.event_time,
            MarketEvent::TimeAndSale(e) => e.event_time,
            MarketEvent::Profile(e) => e.event_time,
            MarketEvent::Underlying(e) => e.event_time,
            MarketEvent::Candle(e) => e.event_time,
        }
    }

    /// Index view for indexed event types
    pub fn as_indexed(&self) -> Option<&dyn IndexedEvent> {
        match self {
            MarketEvent::Greeks(e) => Some(e),
            MarketEvent::TheoPrice(e) => Some(e),
            MarketEvent::TimeAndSale(e) => Some(e),
            MarketEvent::Underlying(e) => Some(e),
            MarketEvent::Candle(e) => Some(e),
            _ => None,
        }
    }
}
