// src/app/pipeline.rs — progressive image loading. Thumbnails go to a
// small worker pool; full-resolution upgrades go through a strictly
// one-at-a-time queue so a burst of slides never saturates the link.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::app::cache::{find_cached_by_key, store_image_bytes, url_to_cache_key};
use crate::app::http::build_client;
use crate::app::types::{PipelineEvent, Tier, TierDone};

pub const THUMB_WORKERS: usize = 4;
const MAX_LOAD_ATTEMPTS: u32 = 3;
const ATTEMPT_TIMEOUTS: [Duration; 3] = [
    Duration::from_secs(7),
    Duration::from_secs(10),
    Duration::from_secs(15),
];
const RETRY_PAUSE: Duration = Duration::from_millis(500);
const SLOW_DOWNLINK_MBPS: f32 = 1.5;
const USER_SCHEDULE_SCALE: f32 = 1.5;
const METER_SAMPLES: usize = 8;

/// Per-attempt timeouts for one load. Timeouts grow across attempts,
/// double on a slow connection, and stretch further for loads the user
/// is actively waiting on.
#[derive(Clone, Copy, Debug)]
pub struct TimeoutSchedule {
    slow: bool,
    scale: f32,
}

impl TimeoutSchedule {
    pub fn background(slow: bool) -> Self {
        Self { slow, scale: 1.0 }
    }

    pub fn user_initiated(slow: bool) -> Self {
        Self {
            slow,
            scale: USER_SCHEDULE_SCALE,
        }
    }

    /// `attempt` is 1-based.
    pub fn attempt_timeout(&self, attempt: u32) -> Duration {
        let idx = (attempt.saturating_sub(1) as usize).min(ATTEMPT_TIMEOUTS.len() - 1);
        let mut t = ATTEMPT_TIMEOUTS[idx].mul_f32(self.scale);
        if self.slow {
            t *= 2;
        }
        t
    }
}

/// FIFO of asset indices with duplicate suppression.
#[derive(Default)]
pub struct LoadQueue {
    order: VecDeque<usize>,
    queued: HashSet<usize>,
}

impl LoadQueue {
    pub fn enqueue(&mut self, idx: usize) -> bool {
        if self.queued.insert(idx) {
            self.order.push_back(idx);
            true
        } else {
            false
        }
    }

    pub fn pop(&mut self) -> Option<usize> {
        let idx = self.order.pop_front()?;
        self.queued.remove(&idx);
        Some(idx)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.queued.clear();
    }
}

/// Queue that releases at most one item at a time. `next_dispatch`
/// hands out the next index only when nothing is in flight; the caller
/// reports back with `complete`.
#[derive(Default)]
pub struct UpgradeQueue {
    queue: LoadQueue,
    inflight: Option<usize>,
}

impl UpgradeQueue {
    pub fn enqueue(&mut self, idx: usize) -> bool {
        if self.inflight == Some(idx) {
            return false;
        }
        self.queue.enqueue(idx)
    }

    pub fn next_dispatch(&mut self) -> Option<usize> {
        if self.inflight.is_some() {
            return None;
        }
        let idx = self.queue.pop()?;
        self.inflight = Some(idx);
        Some(idx)
    }

    pub fn complete(&mut self, idx: usize) {
        if self.inflight == Some(idx) {
            self.inflight = None;
        }
    }

    pub fn inflight(&self) -> Option<usize> {
        self.inflight
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        // an in-flight fetch finishes on its own; its completion is
        // discarded by the caller's stale checks
        self.inflight = None;
    }
}

/// Rolling throughput estimate from recent transfers.
#[derive(Default)]
pub struct DownlinkMeter {
    samples: Mutex<VecDeque<f32>>,
}

impl DownlinkMeter {
    pub fn record(&self, bytes: usize, elapsed: Duration) {
        let secs = elapsed.as_secs_f32();
        if secs < 0.01 || bytes < 1024 {
            return;
        }
        let mbps = (bytes as f32 * 8.0) / (secs * 1_000_000.0);
        if let Ok(mut samples) = self.samples.lock() {
            samples.push_back(mbps);
            while samples.len() > METER_SAMPLES {
                samples.pop_front();
            }
        }
    }

    pub fn is_slow(&self) -> bool {
        let Ok(samples) = self.samples.lock() else {
            return false;
        };
        if samples.is_empty() {
            return false;
        }
        let avg = samples.iter().sum::<f32>() / samples.len() as f32;
        avg < SLOW_DOWNLINK_MBPS
    }
}

struct FetchJob {
    asset_idx: usize,
    tier: Tier,
    url: String,
}

pub struct Pipeline {
    thumb_tx: Sender<FetchJob>,
    full_tx: Sender<FetchJob>,
    events_tx: Sender<PipelineEvent>,
    events_rx: Receiver<PipelineEvent>,
    requested: HashSet<(usize, Tier)>,
    upgrades: UpgradeQueue,
    full_urls: Vec<Option<String>>,
    meter: Arc<DownlinkMeter>,
    assume_slow: bool,
}

impl Pipeline {
    pub fn new(assume_slow: bool) -> Self {
        let (events_tx, events_rx) = channel::<PipelineEvent>();
        let (thumb_tx, thumb_rx) = channel::<FetchJob>();
        let (full_tx, full_rx) = channel::<FetchJob>();

        let meter = Arc::new(DownlinkMeter::default());
        let client = build_client(crate::app::films::USER_AGENT);

        let shared_rx = Arc::new(Mutex::new(thumb_rx));
        for worker in 0..THUMB_WORKERS {
            let rx = Arc::clone(&shared_rx);
            let tx = events_tx.clone();
            let client = client.clone();
            let meter = Arc::clone(&meter);
            let slow = assume_slow;
            thread::Builder::new()
                .name(format!("still-fetch-{worker}"))
                .spawn(move || loop {
                    let job = {
                        let Ok(guard) = rx.lock() else { return };
                        match guard.recv() {
                            Ok(job) => job,
                            Err(_) => return,
                        }
                    };
                    run_fetch_job(&client, &meter, slow, job, &tx);
                })
                .ok();
        }

        {
            let tx = events_tx.clone();
            let client = client.clone();
            let meter = Arc::clone(&meter);
            let slow = assume_slow;
            thread::Builder::new()
                .name("still-fetch-full".into())
                .spawn(move || {
                    while let Ok(job) = full_rx.recv() {
                        run_fetch_job(&client, &meter, slow, job, &tx);
                    }
                })
                .ok();
        }

        Self {
            thumb_tx,
            full_tx,
            events_tx,
            events_rx,
            requested: HashSet::new(),
            upgrades: UpgradeQueue::default(),
            full_urls: Vec::new(),
            meter,
            assume_slow,
        }
    }

    /// Forget all per-film state when a different film opens.
    pub fn reset(&mut self, asset_count: usize) {
        self.requested.clear();
        self.upgrades.clear();
        self.full_urls = vec![None; asset_count];
    }

    pub fn is_slow(&self) -> bool {
        self.assume_slow || self.meter.is_slow()
    }

    /// Sender for out-of-band loads that should share the pipeline's
    /// slow-network signalling.
    pub fn notifier(&self) -> Sender<PipelineEvent> {
        self.events_tx.clone()
    }

    pub fn meter(&self) -> Arc<DownlinkMeter> {
        Arc::clone(&self.meter)
    }

    /// Request a thumbnail or preview fetch. Repeat requests for the
    /// same asset and tier are dropped.
    pub fn request(&mut self, asset_idx: usize, tier: Tier, url: &str) {
        debug_assert_ne!(tier, Tier::Full);
        if !self.requested.insert((asset_idx, tier)) {
            return;
        }
        let job = FetchJob {
            asset_idx,
            tier,
            url: url.to_string(),
        };
        if self.thumb_tx.send(job).is_err() {
            warn!("fetch pool is gone; dropping request for asset {asset_idx}");
        }
    }

    /// Queue a full-resolution upgrade. At most one is ever in flight;
    /// call `pump` after enqueuing and after each completion.
    pub fn enqueue_full(&mut self, asset_idx: usize, url: &str) {
        if self.requested.contains(&(asset_idx, Tier::Full)) {
            return;
        }
        if asset_idx >= self.full_urls.len() {
            self.full_urls.resize(asset_idx + 1, None);
        }
        self.full_urls[asset_idx] = Some(url.to_string());
        self.upgrades.enqueue(asset_idx);
    }

    /// Promote an asset to the front of the upgrade queue (the user is
    /// looking at it right now).
    pub fn prioritize_full(&mut self, asset_idx: usize, url: &str) {
        if self.requested.contains(&(asset_idx, Tier::Full))
            || self.upgrades.inflight() == Some(asset_idx)
        {
            return;
        }
        if asset_idx >= self.full_urls.len() {
            self.full_urls.resize(asset_idx + 1, None);
        }
        self.full_urls[asset_idx] = Some(url.to_string());
        let mut rest = LoadQueue::default();
        rest.enqueue(asset_idx);
        while let Some(other) = self.upgrades.queue.pop() {
            rest.enqueue(other);
        }
        self.upgrades.queue = rest;
    }

    pub fn pump(&mut self) {
        while let Some(idx) = self.upgrades.next_dispatch() {
            let Some(url) = self.full_urls.get(idx).and_then(|u| u.clone()) else {
                self.upgrades.complete(idx);
                continue;
            };
            if self.requested.contains(&(idx, Tier::Full)) {
                self.upgrades.complete(idx);
                continue;
            }
            self.requested.insert((idx, Tier::Full));
            let job = FetchJob {
                asset_idx: idx,
                tier: Tier::Full,
                url,
            };
            if self.full_tx.send(job).is_err() {
                warn!("full-res worker is gone; dropping upgrade for asset {idx}");
                self.upgrades.complete(idx);
                continue;
            }
            break;
        }
    }

    /// Drain up to `max` pipeline events, keeping the one-in-flight
    /// upgrade invariant moving as full-tier completions come back.
    pub fn poll_events(&mut self, max: usize) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        for _ in 0..max {
            match self.events_rx.try_recv() {
                Ok(event) => {
                    if let PipelineEvent::TierLoaded(done) = &event {
                        if done.tier == Tier::Full {
                            self.upgrades.complete(done.asset_idx);
                            if done.result.is_err() {
                                // allow a later retry once the user returns
                                self.requested.remove(&(done.asset_idx, Tier::Full));
                            }
                            self.pump();
                        } else if done.result.is_err() {
                            self.requested.remove(&(done.asset_idx, done.tier));
                        }
                    }
                    events.push(event);
                }
                Err(_) => break,
            }
        }
        events
    }
}

fn run_fetch_job(
    client: &reqwest::blocking::Client,
    meter: &DownlinkMeter,
    assume_slow: bool,
    job: FetchJob,
    tx: &Sender<PipelineEvent>,
) {
    let slow = assume_slow || meter.is_slow();
    let schedule = TimeoutSchedule::background(slow);
    let result = fetch_with_schedule(client, meter, &job.url, &schedule, tx);
    let _ = tx.send(PipelineEvent::TierLoaded(TierDone {
        asset_idx: job.asset_idx,
        tier: job.tier,
        result,
    }));
}

/// Fetch one image through the cache with retries. The first retry
/// raises the slow-network notice; a later success clears it.
pub fn fetch_with_schedule(
    client: &reqwest::blocking::Client,
    meter: &DownlinkMeter,
    url: &str,
    schedule: &TimeoutSchedule,
    tx: &Sender<PipelineEvent>,
) -> Result<std::path::PathBuf, String> {
    let key = url_to_cache_key(url);
    if let Some(found) = find_cached_by_key(&key) {
        return Ok(found);
    }

    let mut last_err = String::new();
    let mut notice_raised = false;
    for attempt in 1..=MAX_LOAD_ATTEMPTS {
        if attempt > 1 {
            if !notice_raised {
                notice_raised = true;
                let _ = tx.send(PipelineEvent::SlowNetwork(true));
            }
            thread::sleep(RETRY_PAUSE);
        }
        let started = Instant::now();
        let fetched = client
            .get(url)
            .timeout(schedule.attempt_timeout(attempt))
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes());
        match fetched {
            Ok(bytes) => {
                meter.record(bytes.len(), started.elapsed());
                if notice_raised {
                    let _ = tx.send(PipelineEvent::SlowNetwork(false));
                }
                return store_image_bytes(&key, &bytes);
            }
            Err(err) => {
                last_err = format!("attempt {attempt}: {err}");
                debug!("fetch {url} failed, {last_err}");
            }
        }
    }
    if notice_raised {
        let _ = tx.send(PipelineEvent::SlowNetwork(false));
    }
    Err(format!("{url}: {last_err}"))
}

/// Download `url` to `dest`, honoring `cancel` between chunks. A
/// cancelled download leaves no partial file behind.
pub fn download_to_file(
    client: &reqwest::blocking::Client,
    url: &str,
    dest: &std::path::Path,
    cancel: &Arc<AtomicBool>,
) -> Result<(), String> {
    use std::io::{Read, Write};

    let mut resp = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| format!("download {url}: {e}"))?;

    let tmp = dest.with_extension("part");
    let mut out =
        std::fs::File::create(&tmp).map_err(|e| format!("create {}: {e}", tmp.display()))?;
    let mut buf = [0u8; 64 * 1024];
    loop {
        if cancel.load(Ordering::Relaxed) {
            drop(out);
            let _ = std::fs::remove_file(&tmp);
            return Err("cancelled".into());
        }
        let n = resp.read(&mut buf).map_err(|e| format!("read: {e}"))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).map_err(|e| format!("write: {e}"))?;
    }
    drop(out);
    std::fs::rename(&tmp, dest).map_err(|e| format!("rename: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_queue_dedupes_and_keeps_order() {
        let mut q = LoadQueue::default();
        assert!(q.enqueue(3));
        assert!(q.enqueue(1));
        assert!(!q.enqueue(3));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), None);
        // popped items may be queued again
        assert!(q.enqueue(3));
    }

    #[test]
    fn upgrade_queue_releases_one_at_a_time() {
        let mut q = UpgradeQueue::default();
        q.enqueue(0);
        q.enqueue(1);
        q.enqueue(2);

        assert_eq!(q.next_dispatch(), Some(0));
        // nothing else until 0 completes
        assert_eq!(q.next_dispatch(), None);
        assert_eq!(q.inflight(), Some(0));

        q.complete(0);
        assert_eq!(q.next_dispatch(), Some(1));
        q.complete(1);
        assert_eq!(q.next_dispatch(), Some(2));
        q.complete(2);
        assert_eq!(q.next_dispatch(), None);
    }

    #[test]
    fn upgrade_queue_ignores_duplicate_of_inflight() {
        let mut q = UpgradeQueue::default();
        q.enqueue(5);
        assert_eq!(q.next_dispatch(), Some(5));
        assert!(!q.enqueue(5));
        q.complete(5);
        assert_eq!(q.next_dispatch(), None);
    }

    #[test]
    fn timeout_schedule_grows_per_attempt() {
        let s = TimeoutSchedule::background(false);
        assert_eq!(s.attempt_timeout(1), Duration::from_secs(7));
        assert_eq!(s.attempt_timeout(2), Duration::from_secs(10));
        assert_eq!(s.attempt_timeout(3), Duration::from_secs(15));
        // attempts past the table reuse the last entry
        assert_eq!(s.attempt_timeout(4), Duration::from_secs(15));
    }

    #[test]
    fn slow_connection_doubles_timeouts() {
        let s = TimeoutSchedule::background(true);
        assert_eq!(s.attempt_timeout(1), Duration::from_secs(14));
        assert_eq!(s.attempt_timeout(2), Duration::from_secs(20));
        assert_eq!(s.attempt_timeout(3), Duration::from_secs(30));
    }

    #[test]
    fn user_initiated_loads_wait_longer() {
        let s = TimeoutSchedule::user_initiated(false);
        assert_eq!(s.attempt_timeout(1), Duration::from_secs_f32(10.5));
        let slow = TimeoutSchedule::user_initiated(true);
        assert_eq!(slow.attempt_timeout(1), Duration::from_secs(21));
    }

    #[test]
    fn meter_flags_slow_links() {
        let meter = DownlinkMeter::default();
        assert!(!meter.is_slow());
        // 100 KiB over one second is well under 1.5 Mbps
        meter.record(100 * 1024, Duration::from_secs(1));
        assert!(meter.is_slow());
        // a run of fast transfers pulls the average back up
        for _ in 0..8 {
            meter.record(4_000_000, Duration::from_secs(1));
        }
        assert!(!meter.is_slow());
    }

    #[test]
    fn meter_ignores_tiny_transfers() {
        let meter = DownlinkMeter::default();
        meter.record(100, Duration::from_secs(5));
        assert!(!meter.is_slow());
    }
}
