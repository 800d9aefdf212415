use crate::util::lock;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// What the caller found when it inspected a candidate's queue
pub(crate) enum Activation {
    /// The queue is now ready; stop scanning
    Activated,

    /// The queue's tier changed since it was filed; file it again here
    Refile(u32),

    /// The queue is no longer inactive; drop the entry
    Stale,
}

/// Tiers of inactive site keys, lowest tier number served first
///
/// One lock covers the whole structure so a scan never races a refile.
pub(crate) struct PrecedenceActivator {
    tiers: Mutex<BTreeMap<u32, VecDeque<String>>>,

    /// Best tier with a waiting key, `u32::MAX` when none
    highest_waiting: AtomicU32,
}

impl Default for PrecedenceActivator {
    fn default() -> Self {
        Self {
            tiers: Mutex::new(BTreeMap::new()),
            highest_waiting: AtomicU32::new(u32::MAX),
        }
    }
}

impl PrecedenceActivator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a key under `tier`
    pub fn file(&self, key: &str, tier: u32) {
        let mut tiers = lock(&self.tiers);
        tiers.entry(tier).or_default().push_back(key.to_string());
        self.update_watermark(&tiers);
    }

    /// Activates the first key whose queue still belongs to its filed tier
    ///
    /// `inspect` is called with each candidate key and the tier it was filed
    /// under; it runs with the activator lock held and may take a queue lock.
    ///
    /// # Returns
    ///
    /// The activated key, or `None` if no filed key could be activated.
    pub fn activate_next(&self, mut inspect: impl FnMut(&str, u32) -> Activation) -> Option<String> {
        let mut tiers = lock(&self.tiers);
        let scan: Vec<u32> = tiers.keys().copied().collect();

        let mut activated = None;
        'tiers: for tier in scan {
            loop {
                let Some(key) = tiers.get_mut(&tier).and_then(VecDeque::pop_front) else {
                    break;
                };
                match inspect(&key, tier) {
                    Activation::Activated => {
                        activated = Some(key);
                        break 'tiers;
                    }
                    Activation::Refile(current) => {
                        tracing::debug!("Refiling {} from tier {} to {}", key, tier, current);
                        tiers.entry(current).or_default().push_back(key);
                    }
                    Activation::Stale => {
                        tracing::debug!("Dropping stale inactive entry {}", key);
                    }
                }
            }
        }

        tiers.retain(|_, keys| !keys.is_empty());
        self.update_watermark(&tiers);
        activated
    }

    pub fn highest_waiting(&self) -> u32 {
        self.highest_waiting.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        lock(&self.tiers).values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of waiting keys per tier
    pub fn tier_counts(&self) -> BTreeMap<u32, usize> {
        lock(&self.tiers)
            .iter()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(tier, keys)| (*tier, keys.len()))
            .collect()
    }

    fn update_watermark(&self, tiers: &BTreeMap<u32, VecDeque<String>>) {
        let highest = tiers
            .iter()
            .find(|(_, keys)| !keys.is_empty())
            .map_or(u32::MAX, |(tier, _)| *tier);
        self.highest_waiting.store(highest, Ordering::SeqCst);
    }
}
