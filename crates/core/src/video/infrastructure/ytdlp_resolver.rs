use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::video::domain::frame_source::SourceError;
use crate::video::domain::stream_resolver::StreamResolver;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Resolves share links (YouTube and friends) to a playable media URL by
/// running `yt-dlp -g`.
pub struct YtDlpResolver {
    program: String,
    format: String,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self::with_program("yt-dlp")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            format: "best[ext=mp4]/best".to_string(),
        }
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamResolver for YtDlpResolver {
    fn resolve(&self, link: &str, timeout: Duration) -> Result<String, SourceError> {
        which::which(&self.program).map_err(|_| {
            SourceError::unavailable(link, format!("{} not found on PATH", self.program))
        })?;

        log::info!("Resolving {link} with {}", self.program);
        let mut child = Command::new(&self.program)
            .args(["-g", "--no-playlist", "-f", self.format.as_str(), link])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SourceError::unavailable(link, e))?;

        // Drained while waiting so a chatty resolver cannot fill a pipe and stall.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    // Grandchildren may still hold the pipes, so the readers are not joined.
                    return Err(SourceError::unavailable(
                        link,
                        format!("timed out after {timeout:?} resolving stream"),
                    ));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(SourceError::unavailable(link, e)),
            }
        };

        let stdout = collect(stdout).map_err(|e| SourceError::unavailable(link, e))?;
        if !status.success() {
            let stderr = collect(stderr).unwrap_or_default();
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("yt-dlp failed")
                .to_string();
            return Err(SourceError::unavailable(link, reason));
        }

        first_url(&stdout).ok_or_else(|| SourceError::unavailable(link, "no playable stream found"))
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<io::Result<String>> {
    thread::spawn(move || {
        let mut output = String::new();
        pipe.read_to_string(&mut output)?;
        Ok(output)
    })
}

fn collect(reader: Option<JoinHandle<io::Result<String>>>) -> io::Result<String> {
    match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "output reader panicked"))?,
        None => Ok(String::new()),
    }
}

/// `-g` prints one URL per selected format; the first is the video.
fn first_url(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("http"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_url_skips_noise() {
        let output = "WARNING: something\nhttps://cdn.example/v.mp4\nhttps://cdn.example/a.m4a\n";
        assert_eq!(
            first_url(output).as_deref(),
            Some("https://cdn.example/v.mp4")
        );
        assert_eq!(first_url(""), None);
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let resolver = YtDlpResolver::with_program("roiwatch-no-such-resolver");
        let err = resolver
            .resolve("https://youtu.be/abc", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_program_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-resolver");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = YtDlpResolver::with_program(script.to_string_lossy());
        let started = Instant::now();
        let err = resolver
            .resolve("https://youtu.be/abc", Duration::from_millis(200))
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(matches!(err, SourceError::Unavailable { .. }));
        assert!(err.to_string().contains("timed out after 200ms"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolved_url_is_returned() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fast-resolver");
        std::fs::write(&script, "#!/bin/sh\necho https://cdn.example/v.mp4\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = YtDlpResolver::with_program(script.to_string_lossy());
        let url = resolver
            .resolve("https://youtu.be/abc", Duration::from_secs(5))
            .unwrap();
        assert_eq!(url, "https://cdn.example/v.mp4");
    }

    #[cfg(unix)]
    #[test]
    fn test_verbose_program_does_not_stall_on_full_pipe() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("chatty-resolver");
        std::fs::write(
            &script,
            "#!/bin/sh\nhead -c 262144 /dev/zero | tr '\\0' x >&2\necho https://cdn.example/v.mp4\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = YtDlpResolver::with_program(script.to_string_lossy());
        let url = resolver
            .resolve("https://youtu.be/abc", Duration::from_secs(3))
            .unwrap();
        assert_eq!(url, "https://cdn.example/v.mp4");
    }
}
