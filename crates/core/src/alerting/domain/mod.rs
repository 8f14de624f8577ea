pub mod alert_debouncer;
pub mod alert_sink;
