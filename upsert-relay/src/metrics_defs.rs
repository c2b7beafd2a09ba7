use shared::metrics_defs::{MetricDef, MetricType};

pub const SAVE_REQUESTS: MetricDef = MetricDef {
    name: "save.requests",
    metric_type: MetricType::Counter,
    description: "Number of save attempts. Tagged with result and failed phase.",
};

pub const SAVE_DURATION: MetricDef = MetricDef {
    name: "save.duration",
    metric_type: MetricType::Histogram,
    description: "Save duration in seconds, from validation to upstream response",
};

pub const ROWS_SUBMITTED: MetricDef = MetricDef {
    name: "save.rows_submitted",
    metric_type: MetricType::Histogram,
    description: "Number of rows sent in one rowset upsert",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const ALL_METRICS: &[MetricDef] = &[
    SAVE_REQUESTS,
    SAVE_DURATION,
    ROWS_SUBMITTED,
    REQUESTS_INFLIGHT,
];
