//! Typed event records
//!
//! Each record is built positionally from values already coerced against its
//! schema, so field order here follows `schema.rs`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{EventSchema, EventType, IndexedEvent, MarketEvent};
use crate::error::{Result, StreamerError};

/// A single coerced frame value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Absent,
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Boolean(bool),
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

/// Sequential reader over one record's coerced values
struct FieldReader<'a> {
    schema: &'static EventSchema,
    values: &'a [FieldValue],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(schema: &'static EventSchema, values: &'a [FieldValue]) -> Self {
        Self {
            schema,
            values,
            pos: 0,
        }
    }

    fn next(&mut self) -> Result<&'a FieldValue> {
        let value = self.values.get(self.pos).ok_or_else(|| {
            StreamerError::ParseError(format!(
                "{} record ended after {} fields",
                self.schema.event_type, self.pos
            ))
        })?;
        self.pos += 1;
        Ok(value)
    }

    fn mismatch(&self, expected: &str, got: &FieldValue) -> StreamerError {
        let name = self
            .schema
            .fields
            .get(self.pos.saturating_sub(1))
            .map(|f| f.name)
            .unwrap_or("?");
        StreamerError::ParseError(format!(
            "{}.{name}: expected {expected}, got {got:?}",
            self.schema.event_type
        ))
    }

    fn opt_text(&mut self) -> Result<Option<String>> {
        match self.next()? {
            FieldValue::Text(s) => Ok(Some(s.clone())),
            FieldValue::Absent => Ok(None),
            other => Err(self.mismatch("string", other)),
        }
    }

    fn text(&mut self) -> Result<String> {
        match self.next()? {
            FieldValue::Text(s) => Ok(s.clone()),
            other => Err(self.mismatch("string", other)),
        }
    }

    fn opt_int(&mut self) -> Result<Option<i64>> {
        match self.next()? {
            FieldValue::Integer(v) => Ok(Some(*v)),
            FieldValue::Absent => Ok(None),
            other => Err(self.mismatch("integer", other)),
        }
    }

    fn int(&mut self) -> Result<i64> {
        match self.next()? {
            FieldValue::Integer(v) => Ok(*v),
            other => Err(self.mismatch("integer", other)),
        }
    }

    fn opt_decimal(&mut self) -> Result<Option<Decimal>> {
        match self.next()? {
            FieldValue::Decimal(v) => Ok(Some(*v)),
            FieldValue::Absent => Ok(None),
            other => Err(self.mismatch("decimal", other)),
        }
    }

    fn boolean(&mut self) -> Result<bool> {
        match self.next()? {
            FieldValue::Boolean(v) => Ok(*v),
            other => Err(self.mismatch("boolean", other)),
        }
    }
}

/// Best bid and ask snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub event_symbol: String,
    pub event_time: i64,
    pub sequence: i64,
    pub time_nano_part: i64,
    pub bid_time: i64,
    pub bid_exchange_code: String,
    pub ask_time: i64,
    pub ask_exchange_code: String,
    pub bid_price: Option<Decimal>,
    pub ask_price: Option<Decimal>,
    pub bid_size: Option<i64>,
    pub ask_size: Option<i64>,
}

impl Quote {
    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            event_symbol: r.text()?,
            event_time: r.int()?,
            sequence: r.int()?,
            time_nano_part: r.int()?,
            bid_time: r.int()?,
            bid_exchange_code: r.text()?,
            ask_time: r.int()?,
            ask_exchange_code: r.text()?,
            bid_price: r.opt_decimal()?,
            ask_price: r.opt_decimal()?,
            bid_size: r.opt_int()?,
            ask_size: r.opt_int()?,
        })
    }
}

/// Last trade in regular hours plus day totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub event_symbol: String,
    pub event_time: i64,
    /// Trade time, epoch milliseconds
    pub time: i64,
    pub time_nano_part: i64,
    pub sequence: i64,
    pub exchange_code: String,
    pub day_id: i64,
    /// DOWN | UNDEFINED | UP | ZERO | ZERO_DOWN | ZERO_UP
    pub tick_direction: String,
    pub extended_trading_hours: bool,
    pub price: Option<Decimal>,
    pub change: Option<Decimal>,
    pub size: Option<i64>,
    pub day_volume: Option<i64>,
    pub day_turnover: Option<Decimal>,
}

impl Trade {
    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            event_symbol: r.text()?,
            event_time: r.int()?,
            time: r.int()?,
            time_nano_part: r.int()?,
            sequence: r.int()?,
            exchange_code: r.text()?,
            day_id: r.int()?,
            tick_direction: r.text()?,
            extended_trading_hours: r.boolean()?,
            price: r.opt_decimal()?,
            change: r.opt_decimal()?,
            size: r.opt_int()?,
            day_volume: r.opt_int()?,
            day_turnover: r.opt_decimal()?,
        })
    }
}

/// Session snapshot: day OHLC and previous close
///
/// Price fields are reset to absent before the session opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub event_symbol: String,
    pub event_time: i64,
    pub day_id: i64,
    /// FINAL | INDICATIVE | PRELIMINARY | REGULAR
    pub day_close_price_type: String,
    pub prev_day_id: i64,
    pub prev_day_close_price_type: String,
    pub open_interest: i64,
    pub day_open_price: Option<Decimal>,
    pub day_high_price: Option<Decimal>,
    pub day_low_price: Option<Decimal>,
    pub day_close_price: Option<Decimal>,
    pub prev_day_close_price: Option<Decimal>,
    pub prev_day_volume: Option<Decimal>,
}

impl Summary {
    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            event_symbol: r.text()?,
            event_time: r.int()?,
            day_id: r.int()?,
            day_close_price_type: r.text()?,
            prev_day_id: r.int()?,
            prev_day_close_price_type: r.text()?,
            open_interest: r.int()?,
            day_open_price: r.opt_decimal()?,
            day_high_price: r.opt_decimal()?,
            day_low_price: r.opt_decimal()?,
            day_close_price: r.opt_decimal()?,
            prev_day_close_price: r.opt_decimal()?,
            prev_day_volume: r.opt_decimal()?,
        })
    }
}

/// Instrument description and trading status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub event_symbol: String,
    pub event_time: i64,
    pub description: String,
    /// ACTIVE | INACTIVE | UNDEFINED
    pub short_sale_restriction: String,
    /// ACTIVE | HALTED | UNDEFINED
    pub trading_status: String,
    pub status_reason: String,
    pub halt_start_time: i64,
    pub halt_end_time: i64,
    pub high_limit_price: Option<Decimal>,
    pub low_limit_price: Option<Decimal>,
    #[serde(rename = "high52WeekPrice")]
    pub high_52_week_price: Option<Decimal>,
    #[serde(rename = "low52WeekPrice")]
    pub low_52_week_price: Option<Decimal>,
}

impl Profile {
    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            event_symbol: r.text()?,
            event_time: r.int()?,
            description: r.text()?,
            short_sale_restriction: r.text()?,
            trading_status: r.text()?,
            status_reason: r.text()?,
            halt_start_time: r.int()?,
            halt_end_time: r.int()?,
            high_limit_price: r.opt_decimal()?,
            low_limit_price: r.opt_decimal()?,
            high_52_week_price: r.opt_decimal()?,
            low_52_week_price: r.opt_decimal()?,
        })
    }
}

/// Option sensitivities computed from the market price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Greeks {
    pub event_symbol: String,
    pub event_time: i64,
    pub event_flags: i64,
    pub index: i64,
    pub time: i64,
    pub sequence: i64,
    pub price: Option<Decimal>,
    pub volatility: Option<Decimal>,
    pub delta: Option<Decimal>,
    pub gamma: Option<Decimal>,
    pub theta: Option<Decimal>,
    pub rho: Option<Decimal>,
    pub vega: Option<Decimal>,
}

impl Greeks {
    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            event_symbol: r.text()?,
            event_time: r.int()?,
            event_flags: r.int()?,
            index: r.int()?,
            time: r.int()?,
            sequence: r.int()?,
            price: r.opt_decimal()?,
            volatility: r.opt_decimal()?,
            delta: r.opt_decimal()?,
            gamma: r.opt_decimal()?,
            theta: r.opt_decimal()?,
            rho: r.opt_decimal()?,
            vega: r.opt_decimal()?,
        })
    }
}

/// Theoretical option price snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TheoPrice {
    pub event_symbol: String,
    pub event_time: i64,
    pub event_flags: i64,
    pub index: i64,
    pub time: i64,
    pub sequence: i64,
    pub price: Option<Decimal>,
    pub underlying_price: Option<Decimal>,
    pub delta: Option<Decimal>,
    pub gamma: Option<Decimal>,
    pub dividend: Option<Decimal>,
    pub interest: Option<Decimal>,
}

impl TheoPrice {
    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            event_symbol: r.text()?,
            event_time: r.int()?,
            event_flags: r.int()?,
            index: r.int()?,
            time: r.int()?,
            sequence: r.int()?,
            price: r.opt_decimal()?,
            underlying_price: r.opt_decimal()?,
            delta: r.opt_decimal()?,
            gamma: r.opt_decimal()?,
            dividend: r.opt_decimal()?,
            interest: r.opt_decimal()?,
        })
    }
}

/// Whether a time and sale record is new or amends an earlier index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAndSaleKind {
    New,
    Correction,
    Cancel,
}

/// A single trade print
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeAndSale {
    pub event_symbol: String,
    pub event_time: i64,
    pub event_flags: i64,
    pub index: i64,
    pub time: i64,
    pub time_nano_part: i64,
    pub sequence: i64,
    pub exchange_code: String,
    pub price: Option<Decimal>,
    pub size: Option<i64>,
    pub bid_price: Option<Decimal>,
    pub ask_price: Option<Decimal>,
    pub exchange_sale_conditions: String,
    pub trade_through_exempt: String,
    pub aggressor_side: String,
    pub spread_leg: bool,
    pub extended_trading_hours: bool,
    pub valid_tick: bool,
    #[serde(rename = "type")]
    pub kind_code: String,
    pub buyer: Option<String>,
    pub seller: Option<String>,
}

impl TimeAndSale {
    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            event_symbol: r.text()?,
            event_time: r.int()?,
            event_flags: r.int()?,
            index: r.int()?,
            time: r.int()?,
            time_nano_part: r.int()?,
            sequence: r.int()?,
            exchange_code: r.text()?,
            price: r.opt_decimal()?,
            size: r.opt_int()?,
            bid_price: r.opt_decimal()?,
            ask_price: r.opt_decimal()?,
            exchange_sale_conditions: r.text()?,
            trade_through_exempt: r.text()?,
            aggressor_side: r.text()?,
            spread_leg: r.boolean()?,
            extended_trading_hours: r.boolean()?,
            valid_tick: r.boolean()?,
            kind_code: r.text()?,
            buyer: r.opt_text()?,
            seller: r.opt_text()?,
        })
    }

    /// New print, correction or cancellation of the print at `index`
    pub fn kind(&self) -> Option<TimeAndSaleKind> {
        match self.kind_code.as_str() {
            "NEW" | "0" => Some(TimeAndSaleKind::New),
            "CORRECTION" | "1" => Some(TimeAndSaleKind::Correction),
            "CANCEL" | "CANCELLATION" | "2" => Some(TimeAndSaleKind::Cancel),
            _ => None,
        }
    }
}

/// Implied volatility and option volume for an underlying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Underlying {
    pub event_symbol: String,
    pub event_time: i64,
    pub event_flags: i64,
    pub index: i64,
    pub time: i64,
    pub sequence: i64,
    pub volatility: Option<Decimal>,
    pub front_volatility: Option<Decimal>,
    pub back_volatility: Option<Decimal>,
    pub call_volume: Option<i64>,
    pub put_volume: Option<i64>,
    pub option_volume: Option<i64>,
    pub put_call_ratio: Option<Decimal>,
}

impl Underlying {
    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            event_symbol: r.text()?,
            event_time: r.int()?,
            event_flags: r.int()?,
            index: r.int()?,
            time: r.int()?,
            sequence: r.int()?,
            volatility: r.opt_decimal()?,
            front_volatility: r.opt_decimal()?,
            back_volatility: r.opt_decimal()?,
            call_volume: r.opt_int()?,
            put_volume: r.opt_int()?,
            option_volume: r.opt_int()?,
            put_call_ratio: r.opt_decimal()?,
        })
    }
}

/// Feed-built OHLCV candle for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub event_symbol: String,
    pub event_time: i64,
    pub event_flags: i64,
    pub index: i64,
    pub time: i64,
    pub sequence: i64,
    pub count: i64,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub volume: Option<i64>,
    pub vwap: Option<Decimal>,
    pub bid_volume: Option<i64>,
    pub ask_volume: Option<i64>,
    pub imp_volatility: Option<Decimal>,
    pub open_interest: Option<i64>,
}

impl Candle {
    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            event_symbol: r.text()?,
            event_time: r.int()?,
            event_flags: r.int()?,
            index: r.int()?,
            time: r.int()?,
            sequence: r.int()?,
            count: r.int()?,
            open: r.opt_decimal()?,
            high: r.opt_decimal()?,
            low: r.opt_decimal()?,
            close: r.opt_decimal()?,
            volume: r.opt_int()?,
            vwap: r.opt_decimal()?,
            bid_volume: r.opt_int()?,
            ask_volume: r.opt_int()?,
            imp_volatility: r.opt_decimal()?,
            open_interest: r.opt_int()?,
        })
    }
}

macro_rules! impl_indexed {
    ($($ty:ty),*) => {
        $(impl IndexedEvent for $ty {
            fn event_flags(&self) -> i64 {
                self.event_flags
            }

            fn index(&self) -> i64 {
                self.index
            }

            fn sequence(&self) -> i64 {
                self.sequence
            }
        })*
    };
}

impl_indexed!(Greeks, TheoPrice, TimeAndSale, Underlying, Candle);

impl MarketEvent {
    /// Build a record from values coerced against `event_type`'s schema
    pub fn from_fields(event_type: EventType, values: &[FieldValue]) -> Result<MarketEvent> {
        let schema = event_type.schema();
        if values.len() != schema.field_count() {
            return Err(StreamerError::ParseError(format!(
                "{event_type} record has {} values, schema has {}",
                values.len(),
                schema.field_count()
            )));
        }
        let mut r = FieldReader::new(schema, values);
        let event = match event_type {
            EventType::Quote => MarketEvent::Quote(Quote::read(&mut r)?),
            EventType::Trade => MarketEvent::Trade(Trade::read(&mut r)?),
            EventType::Summary => MarketEvent::Summary(Summary::read(&mut r)?),
            EventType::Greeks => MarketEvent::Greeks(Greeks::read(&mut r)?),
            EventType::TheoPrice => MarketEvent::TheoPrice(TheoPrice::read(&mut r)?),
            EventType::TimeAndSale => MarketEvent::TimeAndSale(TimeAndSale::read(&mut r)?),
            EventType::Profile => MarketEvent::Profile(Profile::read(&mut r)?),
            EventType::Underlying => MarketEvent::Underlying(Underlying::read(&mut r)?),
            EventType::Candle => MarketEvent::Candle(Candle::read(&mut r)?),
        };
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{SNAPSHOT_END, TX_PENDING};
    use rust_decimal_macros::dec;

    const TX_FLAGS: i64 = TX_PENDING | SNAPSHOT_END;

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    #[test]
    fn test_time_and_sale_kind() {
        let mut values = vec![
            text("SPY"),
            FieldValue::Integer(1),
            FieldValue::Integer(TX_FLAGS),
            FieldValue::Integer(42),
            FieldValue::Integer(1000),
            FieldValue::Integer(0),
            FieldValue::Integer(7),
            text("Q"),
            FieldValue::Decimal(dec!(450.25)),
            FieldValue::Integer(100),
            FieldValue::Absent,
            FieldValue::Absent,
            text(""),
            text("N"),
            text("BUY"),
            FieldValue::Boolean(false),
            FieldValue::Boolean(false),
            FieldValue::Boolean(true),
            text("CORRECTION"),
            FieldValue::Absent,
            FieldValue::Absent,
        ];
        let event = MarketEvent::from_fields(EventType::TimeAndSale, &values).unwrap();
        let MarketEvent::TimeAndSale(sale) = &event else {
            panic!("Expected TimeAndSale");
        };
        assert_eq!(sale.kind(), Some(TimeAndSaleKind::Correction));
        assert_eq!(sale.price, Some(dec!(450.25)));

        let indexed = event.as_indexed().unwrap();
        assert_eq!(indexed.index(), 42);
        assert_eq!(indexed.sequence(), 7);
        assert!(indexed.pending());
        assert!(indexed.snapshot_end());
        assert!(!indexed.remove());

        values[18] = text("2");
        let MarketEvent::TimeAndSale(sale) =
            MarketEvent::from_fields(EventType::TimeAndSale, &values).unwrap()
        else {
            panic!("Expected TimeAndSale");
        };
        assert_eq!(sale.kind(), Some(TimeAndSaleKind::Cancel));
    }

    #[test]
    fn test_kind_mismatch_names_the_field() {
        let mut values = vec![FieldValue::Absent; EventType::Quote.schema().field_count()];
        values[0] = text("SPY");
        let err = MarketEvent::from_fields(EventType::Quote, &values).unwrap_err();
        assert!(err.to_string().contains("Quote.eventTime"), "{err}");
    }

    #[test]
    fn test_plain_events_are_not_indexed() {
        let mut values = vec![FieldValue::Integer(0); 12];
        values[0] = text("AAPL");
        values[5] = text("Q");
        values[7] = text("Q");
        values[8] = FieldValue::Absent;
        values[9] = FieldValue::Decimal(dec!(1.5));
        let event = MarketEvent::from_fields(EventType::Quote, &values).unwrap();
        assert!(event.as_indexed().is_none());
        assert_eq!(event.symbol(), "AAPL");
        assert_eq!(event.event_type(), EventType::Quote);
    }
}
