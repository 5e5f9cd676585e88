//! ISAPI camera protocol client
//! Per-request logging port
//!
//! The request pipeline reports what it did through [`RequestLog`] instead of
//! relying on ambient logging context. Every value a record needs (host,
//! correlation id, attempt number) is passed in explicitly.

use log::{ debug, info, warn };
use reqwest::Method;
use std::time::Duration;

/// Identity of one logical request, shared by all of its attempts
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    pub host: &'a str,
    pub method: &'a Method,
    pub path: &'a str,
    pub correlation_id: &'a str,
}

/// Outcome of one attempt
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt: u32,
    /// `None` when no response arrived
    pub status: Option<u16>,
    pub elapsed: Duration,
    pub body_len: usize,
    /// True if the answer came from the Digest-authenticated resend
    pub digest: bool,
}

/// Sink for request lifecycle records
pub trait RequestLog: Send + Sync {
    fn attempt_finished(&self, context: &RequestContext<'_>, record: &AttemptRecord);

    fn backoff_scheduled(
        &self,
        context: &RequestContext<'_>,
        attempt: u32,
        delay: Duration,
        reason: &str
    );
}

/// Forwards records to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRequestLog;

impl RequestLog for LogRequestLog {
    fn attempt_finished(&self, context: &RequestContext<'_>, record: &AttemptRecord) {
        match record.status {
            Some(status) =>
                info!(
                    "[{}] {} {} => {} in {} ms, {} bytes{} (attempt {}, corr {})",
                    context.host,
                    context.method,
                    context.path,
                    status,
                    record.elapsed.as_millis(),
                    record.body_len,
                    if record.digest {
                        " (digest)"
                    } else {
                        ""
                    },
                    record.attempt,
                    context.correlation_id
                ),
            None =>
                debug!(
                    "[{}] {} {} => no response after {} ms (attempt {}, corr {})",
                    context.host,
                    context.method,
                    context.path,
                    record.elapsed.as_millis(),
                    record.attempt,
                    context.correlation_id
                ),
        }
    }

    fn backoff_scheduled(
        &self,
        context: &RequestContext<'_>,
        attempt: u32,
        delay: Duration,
        reason: &str
    ) {
        warn!(
            "[{}] Transient failure on {} {} ({}). Retrying attempt {} in {} ms (corr {})",
            context.host,
            context.method,
            context.path,
            reason,
            attempt + 1,
            delay.as_millis(),
            context.correlation_id
        );
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRequestLog;

impl RequestLog for NoopRequestLog {
    fn attempt_finished(&self, _context: &RequestContext<'_>, _record: &AttemptRecord) {}

    fn backoff_scheduled(
        &self,
        _context: &RequestContext<'_>,
        _attempt: u32,
        _delay: Duration,
        _reason: &str
    ) {}
}

/// New 32-hex-char correlation id
pub fn new_correlation_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}
