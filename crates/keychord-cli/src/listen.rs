//! Live listener: key commands on a line stream, real time

use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result};
use keychord_core::SystemClock;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use crate::script::{parse_line, Command};
use crate::session::Session;

/// Read commands from `input` until it closes, reporting as they fire.
///
/// The sequence buffer is expired on time even while no input arrives.
/// Malformed lines are reported and skipped.
pub async fn run<R, W>(
    session: &mut Session<SystemClock>,
    input: R,
    out: &mut W,
    json: bool,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = LinesStream::new(input.lines());
    let mut line_number = 0;

    loop {
        let deadline = session.engine().sequence_deadline();

        tokio::select! {
            line = lines.next() => {
                let Some(line) = line else {
                    tracing::debug!("Input closed after {} line(s)", line_number);
                    break;
                };
                let text = line.context("Failed to read input")?;
                line_number += 1;

                let command = match parse_line(&text) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!("Skipping line {}: {:#}", line_number, e);
                        continue;
                    }
                };

                if let Command::Wait(duration) = command {
                    tokio::time::sleep(duration).await;
                }
                let report = session.apply(line_number, text.trim(), &command);
                report.write_to(out, json)?;
                out.flush()?;
            }
            _ = sleep_until(deadline) => {
                if session.poll_timers() {
                    tracing::debug!("Sequence buffer expired");
                }
            }
        }
    }

    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
