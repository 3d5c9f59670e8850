//! Page size policies.
//!
//! A [`FrameLimiter`] decides when the page being filled should be cut. Each
//! page gets a fresh [`LimitContext`] from [`FrameLimiter::start`]; the
//! context is advanced once per appended row and queried before the next row
//! is read. Limits are checked between rows and never interrupt a row.
//!
//! # Example
//!
//! ```
//! use framestream::frame::{FrameLimiter, FrameLimiters};
//! use framestream::types::{Row, Value};
//!
//! let limiter = FrameLimiters::row_count_limited(2).unwrap();
//! let mut ctx = limiter.start();
//! ctx.add_row(&Row::Scalar(Value::Int(1)));
//! assert!(!ctx.limit_reached());
//! ctx.add_row(&Row::Scalar(Value::Int(2)));
//! assert!(ctx.limit_reached());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ConfigError;
use crate::types::Row;

/// Source of wall-clock milliseconds for time based limits.
pub trait Clock: Send + Sync + fmt::Debug {
    fn millis(&self) -> u64;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Policy bounding the size of a single result page.
pub trait FrameLimiter: Send + Sync + fmt::Debug {
    /// Begin a new page.
    fn start(&self) -> Box<dyn LimitContext>;

    /// Row bound the policy declares, if any.
    fn row_count_limit(&self) -> Option<usize>;
}

/// Per-page limiter state.
pub trait LimitContext: Send {
    /// Whether the current page is full.
    fn limit_reached(&self) -> bool;

    /// Record that `row` was appended to the current page.
    fn add_row(&mut self, row: &Row);
}

/// Constructors for the built-in limiters.
pub struct FrameLimiters;

impl FrameLimiters {
    /// Limiter that never cuts a page.
    pub fn unlimited() -> Arc<dyn FrameLimiter> {
        Arc::new(Unlimited)
    }

    /// Limiter that cuts after `max_rows` rows.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRowCountLimit` if `max_rows` is zero.
    pub fn row_count_limited(max_rows: usize) -> Result<Arc<dyn FrameLimiter>, ConfigError> {
        if max_rows == 0 {
            return Err(ConfigError::InvalidRowCountLimit(max_rows));
        }
        Ok(Arc::new(RowCountLimited { max_rows }))
    }

    /// Limiter that cuts once `max_millis` have elapsed since the page started.
    pub fn time_limited(max_millis: u64) -> Arc<dyn FrameLimiter> {
        Self::time_limited_with_clock(max_millis, Arc::new(SystemClock))
    }

    /// Time limiter reading from the given clock.
    pub fn time_limited_with_clock(max_millis: u64, clock: Arc<dyn Clock>) -> Arc<dyn FrameLimiter> {
        Arc::new(TimeLimited { max_millis, clock })
    }

    /// Limiter that cuts as soon as any member would.
    ///
    /// A single member is returned unchanged. The declared row bound is that
    /// of the first member declaring one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoFrameLimiters` if `limiters` is empty.
    pub fn combined(
        mut limiters: Vec<Arc<dyn FrameLimiter>>,
    ) -> Result<Arc<dyn FrameLimiter>, ConfigError> {
        match limiters.len() {
            0 => Err(ConfigError::NoFrameLimiters),
            1 => Ok(limiters.swap_remove(0)),
            _ => Ok(Arc::new(Combined { limiters })),
        }
    }

    /// Limiter for the given optional row and time bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRowCountLimit` if `max_rows` is `Some(0)`.
    pub fn from_config(
        max_rows: Option<usize>,
        max_millis: Option<u64>,
    ) -> Result<Arc<dyn FrameLimiter>, ConfigError> {
        let mut limiters = Vec::new();
        if let Some(rows) = max_rows {
            limiters.push(Self::row_count_limited(rows)?);
        }
        if let Some(millis) = max_millis {
            limiters.push(Self::time_limited(millis));
        }
        if limiters.is_empty() {
            return Ok(Self::unlimited());
        }
        Self::combined(limiters)
    }
}

#[derive(Debug)]
struct Unlimited;

impl FrameLimiter for Unlimited {
    fn start(&self) -> Box<dyn LimitContext> {
        Box::new(UnlimitedContext)
    }

    fn row_count_limit(&self) -> Option<usize> {
        None
    }
}

struct UnlimitedContext;

impl LimitContext for UnlimitedContext {
    fn limit_reached(&self) -> bool {
        false
    }

    fn add_row(&mut self, _row: &Row) {}
}

#[derive(Debug)]
struct RowCountLimited {
    max_rows: usize,
}

impl FrameLimiter for RowCountLimited {
    fn start(&self) -> Box<dyn LimitContext> {
        Box::new(RowCountContext {
            max_rows: self.max_rows,
            rows: 0,
        })
    }

    fn row_count_limit(&self) -> Option<usize> {
        Some(self.max_rows)
    }
}

struct RowCountContext {
    max_rows: usize,
    rows: usize,
}

impl LimitContext for RowCountContext {
    fn limit_reached(&self) -> bool {
        self.rows >= self.max_rows
    }

    fn add_row(&mut self, _row: &Row) {
        self.rows += 1;
    }
}

#[derive(Debug)]
struct TimeLimited {
    max_millis: u64,
    clock: Arc<dyn Clock>,
}

impl FrameLimiter for TimeLimited {
    fn start(&self) -> Box<dyn LimitContext> {
        Box::new(TimeContext {
            deadline: self.clock.millis().saturating_add(self.max_millis),
            clock: Arc::clone(&self.clock),
        })
    }

    fn row_count_limit(&self) -> Option<usize> {
        None
    }
}

struct TimeContext {
    deadline: u64,
    clock: Arc<dyn Clock>,
}

impl LimitContext for TimeContext {
    fn limit_reached(&self) -> bool {
        self.clock.millis() > self.deadline
    }

    fn add_row(&mut self, _row: &Row) {}
}

#[derive(Debug)]
struct Combined {
    limiters: Vec<Arc<dyn FrameLimiter>>,
}

impl FrameLimiter for Combined {
    fn start(&self) -> Box<dyn LimitContext> {
        Box::new(CombinedContext {
            contexts: self.limiters.iter().map(|l| l.start()).collect(),
        })
    }

    fn row_count_limit(&self) -> Option<usize> {
        self.limiters.iter().find_map(|l| l.row_count_limit())
    }
}

struct CombinedContext {
    contexts: Vec<Box<dyn LimitContext>>,
}

impl LimitContext for CombinedContext {
    fn limit_reached(&self) -> bool {
        self.contexts.iter().any(|c| c.limit_reached())
    }

    fn add_row(&mut self, row: &Row) {
        for ctx in &mut self.contexts {
            ctx.add_row(row);
        }
    }
}
