//! Loopback demo for in-memory byte-stream devices
//!
//! Creates one endpoint through the control session, pumps stdin into it
//! from a writer thread and echoes whatever a reader thread drains from it
//! to stdout. On end of input the endpoint is destroyed and the service
//! shut down.

use anyhow::Context;
use mcdev::{Config, ControlService, DeviceError, Interest, OpenMode, Session};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const READ_CHUNK: usize = 4096;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    let _guards = mcdev::infrastructure::logging::init_logging(&config.logging)
        .context("initializing logging")?;

    let service =
        ControlService::new(config.device.clone()).context("building control service")?;
    let control = service.open_control().context("opening control endpoint")?;
    let id = control.create().context("creating endpoint")?;
    tracing::info!(endpoint = %id, memory = service.memory_size(), "loopback endpoint ready");

    let writer = service.open(id, OpenMode::Blocking)?;
    let reader = service.open(id, OpenMode::NonBlocking)?;
    let input_done = AtomicBool::new(false);

    let (sent, received) = thread::scope(|scope| {
        let pump = scope.spawn(|| {
            let sent = pump_stdin(&writer);
            input_done.store(true, Ordering::Release);
            sent
        });
        let echo = scope.spawn(|| echo_stdout(&reader, &input_done));
        (pump.join(), echo.join())
    });
    let sent = sent.map_err(|_| anyhow::anyhow!("writer thread panicked"))??;
    let received = received.map_err(|_| anyhow::anyhow!("reader thread panicked"))??;

    control.destroy(id).context("destroying endpoint")?;
    control.close();
    service.shutdown();

    let metrics = service.metrics().snapshot();
    tracing::info!(
        sent,
        received,
        would_block = metrics.would_block,
        "loopback finished"
    );
    Ok(())
}

/// Copy stdin lines into the endpoint, looping over partial writes
fn pump_stdin(session: &Session) -> anyhow::Result<usize> {
    let stdin = io::stdin();
    let mut sent = 0;
    for line in stdin.lock().lines() {
        let mut line = line.context("reading stdin")?;
        line.push('\n');
        let mut remaining = line.as_bytes();
        while !remaining.is_empty() {
            let written = session.write(remaining)?;
            remaining = &remaining[written..];
            sent += written;
        }
    }
    Ok(sent)
}

/// Drain the endpoint to stdout until input is finished and nothing is left
fn echo_stdout(session: &Session, input_done: &AtomicBool) -> anyhow::Result<usize> {
    let stdout = io::stdout();
    let mut received = 0;
    loop {
        // read the flag before polling so a final write is never missed
        let done = input_done.load(Ordering::Acquire);
        let ready = session.poll(Interest::Readable, Some(POLL_INTERVAL))?;
        if ready.is_empty() {
            if done {
                return Ok(received);
            }
            continue;
        }
        match session.read(READ_CHUNK) {
            Ok(bytes) => {
                received += bytes.len();
                let mut out = stdout.lock();
                out.write_all(&bytes)?;
                out.flush()?;
            }
            Err(DeviceError::WouldBlock) => continue,
            Err(err) => return Err(err.into()),
        }
    }
}
