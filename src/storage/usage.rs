//! Per-user daily generation counter for the free tier

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::storage::clock::Clock;
use crate::storage::kv::KeyValueStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UsageRecord {
    count: u32,
    date: NaiveDate,
}

/// Usage snapshot for one user and day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
}

pub struct UsageTracker {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    daily_limit: u32,
    lock: Mutex<()>,
}

impl UsageTracker {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, daily_limit: u32) -> Self {
        Self {
            store,
            clock,
            daily_limit,
            lock: Mutex::new(()),
        }
    }

    fn key(user_id: &str) -> String {
        format!("image_usage_{}", user_id)
    }

    /// Today's count; records from an earlier day read as zero
    fn count_today(&self, user_id: &str) -> Result<u32> {
        let today = self.clock.today();
        let raw = match self.store.get(&Self::key(user_id))? {
            Some(raw) => raw,
            None => return Ok(0),
        };

        match serde_json::from_str::<UsageRecord>(&raw) {
            Ok(record) if record.date == today => Ok(record.count),
            Ok(_) => Ok(0),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Unreadable usage record, treating as zero");
                Ok(0)
            }
        }
    }

    pub fn usage(&self, user_id: &str) -> Result<DailyUsage> {
        let count = self.count_today(user_id)?;
        Ok(DailyUsage {
            date: self.clock.today(),
            count,
            limit: self.daily_limit,
            remaining: self.daily_limit.saturating_sub(count),
        })
    }

    /// Hold `requested` images against today's quota.
    ///
    /// The check and the increment happen under one lock, so concurrent
    /// batches cannot both pass a limit only one of them fits under.
    /// Dropping the reservation without committing returns every image.
    pub fn reserve(self: &Arc<Self>, user_id: &str, requested: u32) -> Result<QuotaReservation> {
        let _guard = self.lock.lock();
        let used = self.count_today(user_id)?;
        if used + requested > self.daily_limit {
            return Err(AppError::QuotaExceeded {
                limit: self.daily_limit,
                used,
            });
        }

        let date = self.clock.today();
        self.write(user_id, used + requested, date)?;
        debug!(user_id = %user_id, used, requested, "Reserved daily usage");
        Ok(QuotaReservation {
            tracker: self.clone(),
            user_id: user_id.to_string(),
            date,
            reserved: requested,
            settled: false,
        })
    }

    /// Take `returned` images back off the count for `date`. A count from a
    /// later day is left alone.
    fn release(&self, user_id: &str, date: NaiveDate, returned: u32) -> Result<u32> {
        let _guard = self.lock.lock();
        if date != self.clock.today() {
            return self.count_today(user_id);
        }
        let count = self.count_today(user_id)?.saturating_sub(returned);
        if returned > 0 {
            self.write(user_id, count, date)?;
        }
        Ok(count)
    }

    fn write(&self, user_id: &str, count: u32, date: NaiveDate) -> Result<()> {
        let record = UsageRecord { count, date };
        self.store.set(&Self::key(user_id), serde_json::to_string(&record)?)
    }
}

/// Images held against a user's quota while their batch runs
pub struct QuotaReservation {
    tracker: Arc<UsageTracker>,
    user_id: String,
    date: NaiveDate,
    reserved: u32,
    settled: bool,
}

impl QuotaReservation {
    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    /// Keep `delivered` images on the count and return the rest, giving the
    /// new total for the day
    pub fn commit(mut self, delivered: u32) -> Result<u32> {
        self.settled = true;
        let count = self
            .tracker
            .release(&self.user_id, self.date, self.reserved.saturating_sub(delivered))?;
        debug!(user_id = %self.user_id, delivered, count, "Recorded daily usage");
        Ok(count)
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(e) = self.tracker.release(&self.user_id, self.date, self.reserved) {
            warn!(user_id = %self.user_id, error = %e, "Failed to return reserved usage");
        }
    }
}
