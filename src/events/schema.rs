//! Static field tables for every dxfeed event type
//!
//! Frames carry no field names, only values in the order listed here, so
//! these tables must match the upstream feed exactly. Required fields come
//! first, optional measurements last.

use super::EventType;

/// Scalar kind a raw frame value is coerced into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Decimal,
    String,
    Boolean,
}

/// One positional field of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: ValueKind,
    pub nullable: bool,
}

/// Ordered field list for one event type
#[derive(Debug)]
pub struct EventSchema {
    pub event_type: EventType,
    pub fields: &'static [FieldSpec],
}

impl EventSchema {
    /// Number of values making up one record
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Ordered field names, as advertised to the feed
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Position of a field by name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

const fn req(name: &'static str, kind: ValueKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        nullable: false,
    }
}

const fn opt(name: &'static str, kind: ValueKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        nullable: true,
    }
}

use ValueKind::{Boolean as B, Decimal as D, Integer as I, String as S};

const QUOTE_FIELDS: &[FieldSpec] = &[
    req("eventSymbol", S),
    req("eventTime", I),
    req("sequence", I),
    req("timeNanoPart", I),
    req("bidTime", I),
    req("bidExchangeCode", S),
    req("askTime", I),
    req("askExchangeCode", S),
    opt("bidPrice", D),
    opt("askPrice", D),
    opt("bidSize", I),
    opt("askSize", I),
];

const TRADE_FIELDS: &[FieldSpec] = &[
    req("eventSymbol", S),
    req("eventTime", I),
    req("time", I),
    req("timeNanoPart", I),
    req("sequence", I),
    req("exchangeCode", S),
    req("dayId", I),
    req("tickDirection", S),
    req("extendedTradingHours", B),
    opt("price", D),
    opt("change", D),
    opt("size", I),
    opt("dayVolume", I),
    opt("dayTurnover", D),
];

const SUMMARY_FIELDS: &[FieldSpec] = &[
    req("eventSymbol", S),
    req("eventTime", I),
    req("dayId", I),
    req("dayClosePriceType", S),
    req("prevDayId", I),
    req("prevDayClosePriceType", S),
    req("openInterest", I),
    opt("dayOpenPrice", D),
    opt("dayHighPrice", D),
    opt("dayLowPrice", D),
    opt("dayClosePrice", D),
    opt("prevDayClosePrice", D),
    opt("prevDayVolume", D),
];

const PROFILE_FIELDS: &[FieldSpec] = &[
    req("eventSymbol", S),
    req("eventTime", I),
    req("description", S),
    req("shortSaleRestriction", S),
    req("tradingStatus", S),
    req("statusReason", S),
    req("haltStartTime", I),
    req("haltEndTime", I),
    opt("highLimitPrice", D),
    opt("lowLimitPrice", D),
    opt("high52WeekPrice", D),
    opt("low52WeekPrice", D),
];

const GREEKS_FIELDS: &[FieldSpec] = &[
    req("eventSymbol", S),
    req("eventTime", I),
    req("eventFlags", I),
    req("index", I),
    req("time", I),
    req("sequence", I),
    opt("price", D),
    opt("volatility", D),
    opt("delta", D),
    opt("gamma", D),
    opt("theta", D),
    opt("rho", D),
    opt("vega", D),
];

const THEO_PRICE_FIELDS: &[FieldSpec] = &[
    req("eventSymbol", S),
    req("eventTime", I),
    req("eventFlags", I),
    req("index", I),
    req("time", I),
    req("sequence", I),
    opt("price", D),
    opt("underlyingPrice", D),
    opt("delta", D),
    opt("gamma", D),
    opt("dividend", D),
    opt("interest", D),
];

const TIME_AND_SALE_FIELDS: &[FieldSpec] = &[
    req("eventSymbol", S),
    req("eventTime", I),
    req("eventFlags", I),
    req("index", I),
    req("time", I),
    req("timeNanoPart", I),
    req("sequence", I),
    req("exchangeCode", S),
    opt("price", D),
    opt("size", I),
    opt("bidPrice", D),
    opt("askPrice", D),
    req("exchangeSaleConditions", S),
    req("tradeThroughExempt", S),
    req("aggressorSide", S),
    req("spreadLeg", B),
    req("extendedTradingHours", B),
    req("validTick", B),
    req("type", S),
    opt("buyer", S),
    opt("seller", S),
];

const UNDERLYING_FIELDS: &[FieldSpec] = &[
    req("eventSymbol", S),
    req("eventTime", I),
    req("eventFlags", I),
    req("index", I),
    req("time", I),
    req("sequence", I),
    opt("volatility", D),
    opt("frontVolatility", D),
    opt("backVolatility", D),
    opt("callVolume", I),
    opt("putVolume", I),
    opt("optionVolume", I),
    opt("putCallRatio", D),
];

const CANDLE_FIELDS: &[FieldSpec] = &[
    req("eventSymbol", S),
    req("eventTime", I),
    req("eventFlags", I),
    req("index", I),
    req("time", I),
    req("sequence", I),
    req("count", I),
    opt("open", D),
    opt("high", D),
    opt("low", D),
    opt("close", D),
    opt("volume", I),
    opt("vwap", D),
    opt("bidVolume", I),
    opt("askVolume", I),
    opt("impVolatility", D),
    opt("openInterest", I),
];

pub static QUOTE: EventSchema = EventSchema {
    event_type: EventType::Quote,
    fields: QUOTE_FIELDS,
};
pub static TRADE: EventSchema = EventSchema {
    event_type: EventType::Trade,
    fields: TRADE_FIELDS,
};
pub static SUMMARY: EventSchema = EventSchema {
    event_type: EventType::Summary,
    fields: SUMMARY_FIELDS,
};
pub static PROFILE: EventSchema = EventSchema {
    event_type: EventType::Profile,
    fields: PROFILE_FIELDS,
};
pub static GREEKS: EventSchema = EventSchema {
    event_type: EventType::Greeks,
    fields: GREEKS_FIELDS,
};
pub static THEO_PRICE: EventSchema = EventSchema {
    event_type: EventType::TheoPrice,
    fields: THEO_PRICE_FIELDS,
};
pub static TIME_AND_SALE: EventSchema = EventSchema {
    event_type: EventType::TimeAndSale,
    fields: TIME_AND_SALE_FIELDS,
};
pub static UNDERLYING: EventSchema = EventSchema {
    event_type: EventType::Underlying,
    fields: UNDERLYING_FIELDS,
};
pub static CANDLE: EventSchema = EventSchema {
    event_type: EventType::Candle,
    fields: CANDLE_FIELDS,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_counts() {
        let expected = [
            (EventType::Quote, 12),
            (EventType::Trade, 14),
            (EventType::Summary, 13),
            (EventType::Profile, 12),
            (EventType::Greeks, 13),
            (EventType::TheoPrice, 12),
            (EventType::TimeAndSale, 21),
            (EventType::Underlying, 13),
            (EventType::Candle, 17),
        ];
        for (event_type, count) in expected {
            assert_eq!(event_type.schema().field_count(), count, "{event_type}");
            assert_eq!(event_type.schema().event_type, event_type);
        }
    }

    #[test]
    fn test_every_schema_starts_with_symbol_and_time() {
        for event_type in EventType::all() {
            let schema = event_type.schema();
            assert_eq!(schema.fields[0].name, "eventSymbol");
            assert_eq!(schema.fields[1].name, "eventTime");
            assert!(!schema.fields[0].nullable);
        }
    }

    #[test]
    fn test_field_names_are_unique() {
        for event_type in EventType::all() {
            let schema = event_type.schema();
            let mut names: Vec<_> = schema.field_names().collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), schema.field_count(), "{event_type}");
        }
    }

    #[test]
    fn test_indexed_schemas_carry_index_and_sequence() {
        for event_type in EventType::all() {
            let schema = event_type.schema();
            let indexed = schema.position("index").is_some()
                && schema.position("eventFlags").is_some();
            assert_eq!(indexed, event_type.is_indexed(), "{event_type}");
        }
    }
}
