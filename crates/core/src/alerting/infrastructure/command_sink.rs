use std::process::{Command, Stdio};

use crate::alerting::domain::alert_sink::{AlertSink, SinkError};

/// Plays an alert by running an external program to completion.
///
/// Blocks for the duration of playback; wrap it in
/// [`AsyncAlertSink`](super::async_alert_sink::AsyncAlertSink) before handing
/// it to the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSink {
    program: String,
    args: Vec<String>,
}

impl CommandSink {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Player candidates for this platform, most preferred first.
    ///
    /// Each plays a short tone close to a 1 kHz, 500 ms beep.
    pub fn platform_candidates() -> Vec<CommandSink> {
        let own = |args: &[&str]| args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        #[cfg(target_os = "macos")]
        {
            vec![CommandSink::new(
                "afplay",
                own(&["/System/Library/Sounds/Ping.aiff"]),
            )]
        }
        #[cfg(target_os = "windows")]
        {
            vec![CommandSink::new(
                "powershell",
                own(&["-NoProfile", "-Command", "[console]::beep(1000,500)"]),
            )]
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            vec![
                CommandSink::new("beep", own(&["-f", "1000", "-l", "500"])),
                CommandSink::new(
                    "paplay",
                    own(&["/usr/share/sounds/freedesktop/stereo/bell.oga"]),
                ),
                CommandSink::new(
                    "aplay",
                    own(&["-q", "/usr/share/sounds/alsa/Front_Center.wav"]),
                ),
            ]
        }
    }

    /// True if the program can be found on `PATH`.
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }
}

impl AlertSink for CommandSink {
    fn name(&self) -> &str {
        &self.program
    }

    fn fire(&self) -> Result<(), SinkError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| SinkError::Unavailable(format!("cannot run {}: {e}", self.program)))?;
        if !status.success() {
            return Err(SinkError::Unavailable(format!(
                "{} exited with {status}",
                self.program
            )));
        }
        Ok(())
    }
}
