//! Snapshot fixtures shared by the integration tests.
#![allow(dead_code)]

use serde_json::{Value, json};

pub const T0: i64 = 1_700_000_000_000;
pub const MINUTE: i64 = 60_000;
pub const HOUR: i64 = 3_600_000;

/// Quiet market: tiny moves, balanced flow, average volume.
pub fn quiet(timestamp: i64) -> Value {
    json!({
        "symbol": "BTCUSDT",
        "price": 65000.0,
        "price_change_1h": 0.1,
        "price_change_6h": 0.05,
        "volume_1h": 10.0,
        "volume_24h": 240.0,
        "buy_sell_imbalance": 0.05,
        "funding_rate": 0.00001,
        "oi_change_1h": 0.1,
        "oi_change_6h": 0.2,
        "timestamp": timestamp
    })
}

/// Liquidation cascade: sharp drop with open interest collapsing.
pub fn cascade(timestamp: i64) -> Value {
    json!({
        "symbol": "BTCUSDT",
        "price": 61000.0,
        "price_change_1h": -5.0,
        "price_change_6h": -6.0,
        "volume_1h": 1000.0,
        "volume_24h": 24000.0,
        "buy_sell_imbalance": -0.75,
        "funding_rate": 0.0001,
        "oi_change_1h": -15.0,
        "oi_change_6h": -20.0,
        "timestamp": timestamp
    })
}

/// Sustained uptrend where all five sub-signals agree.
pub fn uptrend(timestamp: i64) -> Value {
    json!({
        "symbol": "BTCUSDT",
        "price": 66000.0,
        "price_change_1h": 1.8,
        "price_change_6h": 4.0,
        "volume_1h": 1500.0,
        "volume_24h": 24000.0,
        "buy_sell_imbalance": 0.45,
        "funding_rate": 0.0001,
        "oi_change_1h": 2.5,
        "oi_change_6h": 6.0,
        "timestamp": timestamp
    })
}

/// Mirror image of `uptrend`: every directional sub-signal votes SHORT.
pub fn downtrend(timestamp: i64) -> Value {
    json!({
        "symbol": "BTCUSDT",
        "price": 64000.0,
        "price_change_1h": -1.8,
        "price_change_6h": -4.0,
        "volume_1h": 1500.0,
        "volume_24h": 24000.0,
        "buy_sell_imbalance": -0.45,
        "funding_rate": 0.0001,
        "oi_change_1h": 2.5,
        "oi_change_6h": 6.0,
        "timestamp": timestamp
    })
}

pub fn with_symbol(mut snapshot: Value, symbol: &str) -> Value {
    snapshot["symbol"] = json!(symbol);
    snapshot
}
