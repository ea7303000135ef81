use crate::allocator::IdAllocator;
use crate::error::{AllocationError, Result};
use async_trait::async_trait;
use shortlink_core::{CoordinationError, CoordinationStore, Versioned};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_COUNTER_KEY: &str = "shortlink:counter";
pub const DEFAULT_RANGE_SIZE: u64 = 100_000;
pub const DEFAULT_MAX_REFILL_ATTEMPTS: u32 = 5;
pub const DEFAULT_COORDINATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Configures a [`RangeLeaseAllocator`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct LeaseSettings {
    /// Key of the shared counter node in the coordination store.
    #[builder(default = DEFAULT_COUNTER_KEY.to_string(), setter(into))]
    pub counter_key: String,
    /// Number of identifiers in one lease. Must be the same on every instance.
    #[builder(default = DEFAULT_RANGE_SIZE)]
    pub range_size: u64,
    /// Base written when the counter node is first created.
    #[builder(default = 0)]
    pub initial_base: u64,
    /// Read-modify-write attempts per refill before giving up.
    #[builder(default = DEFAULT_MAX_REFILL_ATTEMPTS)]
    pub max_refill_attempts: u32,
    /// Deadline for each individual coordination store call.
    #[builder(default = DEFAULT_COORDINATION_TIMEOUT)]
    pub coordination_timeout: Duration,
}

impl LeaseSettings {
    fn validate(&self) -> Result<()> {
        if self.range_size == 0 {
            return Err(AllocationError::InvalidSettings("range size must be positive"));
        }
        if self.max_refill_attempts == 0 {
            return Err(AllocationError::InvalidSettings(
                "at least one refill attempt is required",
            ));
        }
        Ok(())
    }
}

impl Default for LeaseSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A block of `range_size` integers this instance is exclusively entitled to.
///
/// The identifiers served are `base * range_size + offset` for
/// `offset in next_offset..range_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub base: u64,
    pub next_offset: u64,
    pub range_size: u64,
}

impl Lease {
    /// Starts a lease at offset 0, rejecting bases whose last identifier
    /// would not fit in a `u64`.
    fn new(base: u64, range_size: u64) -> Result<Self> {
        base.checked_mul(range_size)
            .and_then(|start| start.checked_add(range_size - 1))
            .ok_or(AllocationError::RangeOverflow { base })?;

        Ok(Self {
            base,
            next_offset: 0,
            range_size,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_offset >= self.range_size
    }

    /// Identifiers left before the next refill.
    pub fn remaining(&self) -> u64 {
        self.range_size.saturating_sub(self.next_offset)
    }

    /// First identifier of the lease.
    pub fn start(&self) -> u64 {
        // Overflow was ruled out in `Lease::new`.
        self.base * self.range_size
    }

    fn take_next(&mut self) -> u64 {
        let id = self.start() + self.next_offset;
        self.next_offset += 1;
        id
    }
}

/// Allocates globally unique integers by leasing ranges from a shared counter.
///
/// The local lock is held across a refill, so one process has at most one
/// refill in flight and every other caller waits for it instead of racing
/// the store. Refills use optimistic concurrency: read the counter and its
/// version, then write `base + 1` conditioned on that version.
///
/// Ranges are never handed back. A crash loses at most the unused part of
/// the current lease.
pub struct RangeLeaseAllocator<S> {
    store: S,
    settings: LeaseSettings,
    state: Mutex<Option<Lease>>,
}

impl<S: CoordinationStore> RangeLeaseAllocator<S> {
    /// Creates an allocator with no lease yet; the first call to
    /// [`next_id`](IdAllocator::next_id) acquires one.
    ///
    /// Fails with [`AllocationError::InvalidSettings`] if `range_size` or
    /// `max_refill_attempts` is zero.
    pub fn new(settings: LeaseSettings, store: S) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            store,
            settings,
            state: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &LeaseSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates the counter node with the configured initial base if no
    /// instance has done so yet.
    pub async fn ensure_counter(&self) -> Result<()> {
        let initial = self.settings.initial_base.to_string();
        let created = self
            .bounded(
                self.store
                    .create_if_absent(&self.settings.counter_key, initial.as_bytes()),
            )
            .await?;

        if created {
            info!(
                key = %self.settings.counter_key,
                initial_base = self.settings.initial_base,
                "created counter node"
            );
        } else {
            debug!(key = %self.settings.counter_key, "counter node already exists");
        }
        Ok(())
    }

    /// Acquires a lease now unless one is already active, so the first
    /// allocation does not pay for the round trip.
    pub async fn prime(&self) -> Result<Lease> {
        let mut state = self.state.lock().await;
        if let Some(lease) = *state {
            if !lease.is_exhausted() {
                return Ok(lease);
            }
        }

        let lease = self.refill().await?;
        *state = Some(lease);
        Ok(lease)
    }

    /// Snapshot of the current lease, if any.
    pub async fn lease(&self) -> Option<Lease> {
        *self.state.lock().await
    }

    async fn allocate(&self) -> Result<u64> {
        let mut state = self.state.lock().await;

        let mut lease = match state.take() {
            Some(lease) if !lease.is_exhausted() => lease,
            _ => self.refill().await?,
        };
        let id = lease.take_next();
        *state = Some(lease);

        trace!(id, remaining = lease.remaining(), "allocated id");
        Ok(id)
    }

    /// Claims the next base from the coordination store.
    async fn refill(&self) -> Result<Lease> {
        let key = self.settings.counter_key.as_str();
        let attempts = self.settings.max_refill_attempts;

        for attempt in 1..=attempts {
            let current = match self.bounded(self.store.read_versioned(key)).await {
                Ok(current) => current,
                Err(AllocationError::Coordination(CoordinationError::NotFound(_))) => {
                    warn!(key, attempt, "counter node missing, creating it");
                    self.ensure_counter().await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let base = parse_base(&current)?;
            let next = base
                .checked_add(1)
                .ok_or(AllocationError::RangeOverflow { base })?;
            let lease = Lease::new(base, self.settings.range_size)?;

            let written = self
                .bounded(self.store.write_conditional(
                    key,
                    next.to_string().as_bytes(),
                    current.version,
                ))
                .await;

            match written {
                Ok(()) => {
                    info!(
                        key,
                        base,
                        start = lease.start(),
                        range_size = lease.range_size,
                        attempt,
                        "acquired id range"
                    );
                    return Ok(lease);
                }
                Err(AllocationError::Coordination(CoordinationError::VersionConflict {
                    expected,
                })) => {
                    warn!(
                        key,
                        attempt,
                        %expected,
                        "counter changed concurrently, retrying refill"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(AllocationError::RetriesExhausted { attempts })
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = shortlink_core::coordination::Result<T>>,
    {
        match tokio::time::timeout(self.settings.coordination_timeout, call).await {
            Ok(result) => result.map_err(AllocationError::from),
            Err(_) => Err(CoordinationError::Timeout(format!(
                "no response within {:?}",
                self.settings.coordination_timeout
            ))
            .into()),
        }
    }
}

fn parse_base(node: &Versioned) -> Result<u64> {
    std::str::from_utf8(&node.value)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            AllocationError::CorruptCounter(format!(
                "expected a decimal integer at {}, got {:?}",
                node.version,
                String::from_utf8_lossy(&node.value)
            ))
        })
}

#[async_trait]
impl<S: CoordinationStore> IdAllocator for RangeLeaseAllocator<S> {
    async fn next_id(&self) -> Result<u64> {
        self.allocate().await
    }
}
