pub mod async_alert_sink;
pub mod command_sink;
pub mod sink_factory;
pub mod terminal_bell_sink;
