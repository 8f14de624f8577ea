use serde::{Deserialize, Serialize};

use crate::alerting::domain::alert_sink::{AlertSink, NullAlertSink};

use super::async_alert_sink::AsyncAlertSink;
use super::command_sink::CommandSink;
use super::terminal_bell_sink::TerminalBellSink;

/// Alert output preference.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// First available platform player, else the terminal bell.
    #[default]
    Auto,
    Bell,
    /// A specific program and its arguments.
    Command { program: String, args: Vec<String> },
    None,
}

/// Creates the alert sink for this session.
///
/// Probes `PATH` for the platform's sound players at startup and logs which
/// one is selected. Everything except `None` is wrapped in an
/// [`AsyncAlertSink`], so firing never blocks the caller.
pub fn create_alert_sink(kind: &SinkKind) -> Box<dyn AlertSink> {
    let inner: Box<dyn AlertSink> = match kind {
        SinkKind::None => {
            log::info!("Audible alerts disabled");
            return Box::new(NullAlertSink);
        }
        SinkKind::Bell => Box::new(TerminalBellSink::stderr()),
        SinkKind::Command { program, args } => {
            let sink = CommandSink::new(program.clone(), args.clone());
            if !sink.is_available() {
                log::warn!("Alert program '{program}' not found on PATH; alerts may fail");
            }
            Box::new(sink)
        }
        SinkKind::Auto => match detect_platform_player() {
            Some(sink) => Box::new(sink),
            None => {
                log::warn!("No sound player found, falling back to terminal bell");
                Box::new(TerminalBellSink::stderr())
            }
        },
    };
    log::info!("Using '{}' for audible alerts", inner.name());
    Box::new(AsyncAlertSink::new(inner))
}

fn detect_platform_player() -> Option<CommandSink> {
    CommandSink::platform_candidates()
        .into_iter()
        .find(CommandSink::is_available)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_silent_and_synchronous() {
        let sink = create_alert_sink(&SinkKind::None);
        assert_eq!(sink.name(), "none");
        assert!(sink.fire().is_ok());
    }

    #[test]
    fn test_bell_is_wrapped_async() {
        let sink = create_alert_sink(&SinkKind::Bell);
        assert_eq!(sink.name(), "async(bell)");
    }

    #[test]
    fn test_missing_command_still_creates_sink() {
        let sink = create_alert_sink(&SinkKind::Command {
            program: "roiwatch-no-such-player".into(),
            args: vec![],
        });
        assert_eq!(sink.name(), "async(roiwatch-no-such-player)");
        // Failure surfaces on the worker thread only.
        assert!(sink.fire().is_ok());
    }

    #[test]
    fn test_sink_kind_deserializes() {
        let kind: SinkKind = serde_json::from_str(r#""bell""#).unwrap();
        assert_eq!(kind, SinkKind::Bell);
        let kind: SinkKind =
            serde_json::from_str(r#"{"command": {"program": "beep", "args": ["-f", "800"]}}"#)
                .unwrap();
        assert_eq!(
            kind,
            SinkKind::Command {
                program: "beep".into(),
                args: vec!["-f".into(), "800".into()]
            }
        );
    }
}
