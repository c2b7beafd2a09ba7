//! Metrics definitions for the credential cache.

use shared::metrics_defs::{MetricDef, MetricType};

pub const TOKEN_CACHE_HIT: MetricDef = MetricDef {
    name: "token_cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of token requests served from the cache",
};

pub const TOKEN_CACHE_MISS: MetricDef = MetricDef {
    name: "token_cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of token requests that required an exchange",
};

pub const TOKEN_EXCHANGE: MetricDef = MetricDef {
    name: "token_exchange.count",
    metric_type: MetricType::Counter,
    description: "Number of client-credentials exchanges. Tagged with result.",
};

pub const TOKEN_EXCHANGE_DURATION: MetricDef = MetricDef {
    name: "token_exchange.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a client-credentials exchange in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    TOKEN_CACHE_HIT,
    TOKEN_CACHE_MISS,
    TOKEN_EXCHANGE,
    TOKEN_EXCHANGE_DURATION,
];
