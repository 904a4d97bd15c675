//! Append-only, monotonically numbered version ledgers
//!
//! A [`VersionLedger`] belongs to one work or one publish. Numbers start at 1
//! and are never reused: a version whose file disappears from disk is flagged
//! missing, not removed, so external references to "version 7" stay stable.
//!
//! All state sits behind one mutex per ledger. Appends are serialized through
//! it, and a failed call returns before touching the state.

use crate::error::{LineageError, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A record a ledger can hold
pub trait VersionRecord: Send + Sync {
    fn number(&self) -> u64;

    /// Project-relative location of the version on disk
    fn relative_path(&self) -> &str;
}

/// Which sentinel policy a ledger follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerKind {
    /// `Latest` is the highest present version
    Work,
    /// `Latest` is the live version when one is set, otherwise the highest present
    Publish,
}

/// Literal version number or a sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionSelector {
    Latest,
    InProgress,
    /// The version marked promoted on a publish ledger
    Promoted,
    Number(u64),
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Latest => write!(f, "latest"),
            VersionSelector::InProgress => write!(f, "in-progress"),
            VersionSelector::Promoted => write!(f, "promoted"),
            VersionSelector::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<u64> for VersionSelector {
    fn from(number: u64) -> Self {
        VersionSelector::Number(number)
    }
}

impl FromStr for VersionSelector {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "latest" | "live" => return Ok(VersionSelector::Latest),
            "in-progress" | "in_progress" | "wip" => return Ok(VersionSelector::InProgress),
            "promoted" | "pro" => return Ok(VersionSelector::Promoted),
            _ => {}
        }
        let digits = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        match digits.parse::<u64>() {
            Ok(number) if number > 0 => Ok(VersionSelector::Number(number)),
            _ => Err(LineageError::InvalidSelector(s.to_string())),
        }
    }
}

/// Integer codes used by host integrations: `-1` latest, `0` in-progress
impl TryFrom<i64> for VersionSelector {
    type Error = LineageError;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            -1 => Ok(VersionSelector::Latest),
            0 => Ok(VersionSelector::InProgress),
            n if n > 0 => Ok(VersionSelector::Number(n as u64)),
            n => Err(LineageError::InvalidSelector(n.to_string())),
        }
    }
}

impl VersionSelector {
    /// Codes used by publish pickers in host integrations: `-1` live, `0` promoted
    pub fn from_publish_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(VersionSelector::Promoted),
            code => VersionSelector::try_from(code),
        }
    }
}

/// Append sequence observed before a disk listing started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerMark(u64);

/// What a disk listing found for one ledger
#[derive(Debug)]
pub struct DiskScan<R> {
    /// Records found on disk, in file order
    pub entries: Vec<R>,

    /// Version numbers seen on disk whose entry could not be read
    pub unreadable: BTreeSet<u64>,

    /// Taken with [`VersionLedger::mark`] before listing
    pub mark: LedgerMark,
}

/// Changes applied by one rescan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescanSummary {
    pub added: Vec<u64>,
    pub flagged_missing: Vec<u64>,
    pub restored: Vec<u64>,

    /// Disk entries that collided with a known path under another number
    pub conflicts: Vec<u64>,
}

impl RescanSummary {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.flagged_missing.is_empty() && self.restored.is_empty()
    }
}

/// A record with its missing flag
#[derive(Debug)]
pub struct LedgerEntry<R> {
    pub record: Arc<R>,
    pub missing: bool,
}

impl<R> Clone for LedgerEntry<R> {
    fn clone(&self) -> Self {
        Self {
            record: self.record.clone(),
            missing: self.missing,
        }
    }
}

impl<R: PartialEq> PartialEq for LedgerEntry<R> {
    fn eq(&self, other: &Self) -> bool {
        self.missing == other.missing && self.record == other.record
    }
}

struct Slot<R> {
    record: Arc<R>,
    missing: bool,
    seq: u64,
}

struct LedgerState<R> {
    entries: BTreeMap<u64, Slot<R>>,
    paths: HashMap<String, u64>,
    pending: Option<Arc<R>>,
    live: Option<u64>,
    promoted: Option<u64>,
    seq: u64,
}

impl<R: VersionRecord> LedgerState<R> {
    fn max_number(&self) -> u64 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    fn highest_present(&self) -> Option<&Slot<R>> {
        self.entries.values().rev().find(|slot| !slot.missing)
    }

    fn present(&self, number: Option<u64>) -> Option<Arc<R>> {
        number
            .and_then(|number| self.entries.get(&number))
            .filter(|slot| !slot.missing)
            .map(|slot| slot.record.clone())
    }

    fn insert(&mut self, record: R) -> Arc<R> {
        self.seq += 1;
        let record = Arc::new(record);
        self.paths
            .insert(record.relative_path().to_string(), record.number());
        self.entries.insert(
            record.number(),
            Slot {
                record: record.clone(),
                missing: false,
                seq: self.seq,
            },
        );
        record
    }
}

/// Ordered version records of one work or publish
pub struct VersionLedger<R> {
    kind: LedgerKind,
    owner: String,
    state: Mutex<LedgerState<R>>,
}

impl<R> fmt::Debug for VersionLedger<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("VersionLedger")
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("versions", &state.entries.len())
            .field("live", &state.live)
            .field("promoted", &state.promoted)
            .finish()
    }
}

impl<R: VersionRecord> VersionLedger<R> {
    pub fn new(kind: LedgerKind, owner: impl Into<String>) -> Self {
        Self {
            kind,
            owner: owner.into(),
            state: Mutex::new(LedgerState {
                entries: BTreeMap::new(),
                paths: HashMap::new(),
                pending: None,
                live: None,
                promoted: None,
                seq: 0,
            }),
        }
    }

    pub fn kind(&self) -> LedgerKind {
        self.kind
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Append a record numbered `max + 1` by the ledger.
    ///
    /// `build` receives the assigned number and runs under the ledger lock,
    /// so it must not call back into this ledger.
    pub fn append_with<F>(&self, build: F) -> Result<Arc<R>>
    where
        F: FnOnce(u64) -> R,
    {
        let mut state = self.state.lock();
        let number = state.max_number() + 1;
        let record = build(number);
        if record.number() != number {
            return Err(LineageError::NonMonotonicVersion {
                owner: self.owner.clone(),
                attempted: record.number(),
                current: number - 1,
            });
        }
        self.check_path(&state, &record)?;
        state.pending = None;
        Ok(state.insert(record))
    }

    /// Append a caller-numbered record; the number must exceed the current maximum
    pub fn append(&self, record: R) -> Result<Arc<R>> {
        let mut state = self.state.lock();
        let current = state.max_number();
        if record.number() <= current {
            return Err(LineageError::NonMonotonicVersion {
                owner: self.owner.clone(),
                attempted: record.number(),
                current,
            });
        }
        self.check_path(&state, &record)?;
        state.pending = None;
        Ok(state.insert(record))
    }

    fn check_path(&self, state: &LedgerState<R>, record: &R) -> Result<()> {
        match state.paths.get(record.relative_path()) {
            Some(existing) => Err(LineageError::DuplicateVersionPath {
                owner: self.owner.clone(),
                path: record.relative_path().to_string(),
                existing: *existing,
            }),
            None => Ok(()),
        }
    }

    /// Resolve a number or sentinel against the current state.
    ///
    /// Numbered lookups also return versions flagged missing.
    pub fn get(&self, selector: impl Into<VersionSelector>) -> Result<Arc<R>> {
        let selector = selector.into();
        let state = self.state.lock();
        let found = match selector {
            VersionSelector::Number(number) => {
                state.entries.get(&number).map(|slot| slot.record.clone())
            }
            VersionSelector::InProgress => state.pending.clone(),
            VersionSelector::Promoted => state.present(state.promoted),
            VersionSelector::Latest => self.resolve_latest(&state),
        };
        found.ok_or_else(|| LineageError::VersionNotFound {
            owner: self.owner.clone(),
            selector: selector.to_string(),
        })
    }

    fn resolve_latest(&self, state: &LedgerState<R>) -> Option<Arc<R>> {
        if self.kind == LedgerKind::Publish {
            if let Some(live) = state.present(state.live) {
                return Some(live);
            }
        }
        state.highest_present().map(|slot| slot.record.clone())
    }

    pub fn latest(&self) -> Option<Arc<R>> {
        self.get(VersionSelector::Latest).ok()
    }

    /// Versions present on disk, ascending
    pub fn versions(&self) -> Vec<Arc<R>> {
        let state = self.state.lock();
        state
            .entries
            .values()
            .filter(|slot| !slot.missing)
            .map(|slot| slot.record.clone())
            .collect()
    }

    /// Every known version including those flagged missing
    pub fn all_versions(&self) -> Vec<Arc<R>> {
        let state = self.state.lock();
        state.entries.values().map(|slot| slot.record.clone()).collect()
    }

    pub fn entries(&self) -> Vec<LedgerEntry<R>> {
        let state = self.state.lock();
        state
            .entries
            .values()
            .map(|slot| LedgerEntry {
                record: slot.record.clone(),
                missing: slot.missing,
            })
            .collect()
    }

    pub fn version_numbers(&self) -> Vec<u64> {
        self.state.lock().entries.keys().copied().collect()
    }

    pub fn find_by_path(&self, relative_path: &str) -> Option<Arc<R>> {
        let state = self.state.lock();
        let number = state.paths.get(relative_path)?;
        state.entries.get(number).map(|slot| slot.record.clone())
    }

    pub fn is_missing(&self, number: u64) -> Option<bool> {
        self.state.lock().entries.get(&number).map(|slot| slot.missing)
    }

    /// Number the next append will receive
    pub fn next_number(&self) -> u64 {
        self.state.lock().max_number() + 1
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Fill the in-progress slot with a record for the next number.
    ///
    /// The reservation takes no number; it is cleared by the next append
    /// or by a rescan that finds that number on disk.
    pub fn set_in_progress<F>(&self, build: F) -> Arc<R>
    where
        F: FnOnce(u64) -> R,
    {
        let mut state = self.state.lock();
        let record = Arc::new(build(state.max_number() + 1));
        state.pending = Some(record.clone());
        record
    }

    pub fn clear_in_progress(&self) -> Option<Arc<R>> {
        self.state.lock().pending.take()
    }

    pub fn in_progress(&self) -> Option<Arc<R>> {
        self.state.lock().pending.clone()
    }

    fn stored(&self, state: &LedgerState<R>, number: u64) -> Result<Arc<R>> {
        state
            .entries
            .get(&number)
            .map(|slot| slot.record.clone())
            .ok_or_else(|| LineageError::VersionNotFound {
                owner: self.owner.clone(),
                selector: number.to_string(),
            })
    }

    /// Mark a version as the one `Latest` resolves to on a publish ledger
    pub fn set_live(&self, number: u64) -> Result<Arc<R>> {
        let mut state = self.state.lock();
        let record = self.stored(&state, number)?;
        state.live = Some(number);
        Ok(record)
    }

    pub fn live(&self) -> Option<u64> {
        self.state.lock().live
    }

    /// Mark a version as the one `Promoted` resolves to
    pub fn set_promoted(&self, number: u64) -> Result<Arc<R>> {
        let mut state = self.state.lock();
        let record = self.stored(&state, number)?;
        state.promoted = Some(number);
        Ok(record)
    }

    pub fn promoted(&self) -> Option<u64> {
        self.state.lock().promoted
    }

    /// Undo an append whose record could not be persisted.
    ///
    /// Nothing happens unless `record` is still the stored entry for its
    /// number. A reservation the append consumed can be handed back and is
    /// restored when no newer one was made since.
    pub fn retract(&self, record: &Arc<R>, reservation: Option<Arc<R>>) -> bool {
        let mut state = self.state.lock();
        let number = record.number();
        let stored = state
            .entries
            .get(&number)
            .is_some_and(|slot| Arc::ptr_eq(&slot.record, record));
        if !stored {
            return false;
        }

        state.entries.remove(&number);
        if state.paths.get(record.relative_path()) == Some(&number) {
            state.paths.remove(record.relative_path());
        }
        if state.live == Some(number) {
            state.live = None;
        }
        if state.promoted == Some(number) {
            state.promoted = None;
        }
        if state.pending.is_none() {
            state.pending = reservation;
        }
        true
    }

    /// Sequence to pass back in a [`DiskScan`]
    pub fn mark(&self) -> LedgerMark {
        LedgerMark(self.state.lock().seq)
    }

    /// Reconcile the ledger with what a disk listing found.
    ///
    /// Unknown disk versions are added under their on-disk numbers, known
    /// versions absent from disk are flagged missing, and flagged versions
    /// found again are restored. Records appended after `scan.mark` are
    /// left alone, as are versions whose entry could not be read. Nothing
    /// is renumbered or removed, so repeating a rescan over an unchanged
    /// disk changes nothing.
    pub fn rescan(&self, scan: DiskScan<R>) -> RescanSummary {
        let DiskScan {
            entries,
            unreadable,
            mark,
        } = scan;
        let mut summary = RescanSummary::default();
        let mut state = self.state.lock();
        let mut seen = BTreeSet::new();

        for record in entries {
            let number = record.number();
            if !seen.insert(number) {
                continue;
            }
            if let Some(slot) = state.entries.get_mut(&number) {
                if slot.missing {
                    slot.missing = false;
                    summary.restored.push(number);
                }
                continue;
            }
            if state.paths.contains_key(record.relative_path()) {
                summary.conflicts.push(number);
                continue;
            }
            state.insert(record);
            summary.added.push(number);
        }

        for (number, slot) in state.entries.iter_mut() {
            let keep = seen.contains(number) || unreadable.contains(number) || slot.seq > mark.0;
            if !keep && !slot.missing {
                slot.missing = true;
                summary.flagged_missing.push(*number);
            }
        }

        let disk_max = seen.iter().next_back().copied().unwrap_or(0);
        if state
            .pending
            .as_ref()
            .is_some_and(|pending| pending.number() <= disk_max)
        {
            state.pending = None;
        }
        summary
    }
}

impl<R: VersionRecord + Clone> VersionLedger<R> {
    /// Replace a stored record with an edited copy.
    ///
    /// Only fields outside the identity may change; an edit that alters the
    /// number or path is rejected and the stored record kept.
    pub fn backfill<F>(&self, number: u64, edit: F) -> Result<Arc<R>>
    where
        F: FnOnce(&mut R),
    {
        let mut state = self.state.lock();
        let slot = state
            .entries
            .get_mut(&number)
            .ok_or_else(|| LineageError::VersionNotFound {
                owner: self.owner.clone(),
                selector: number.to_string(),
            })?;
        let mut updated = R::clone(&slot.record);
        edit(&mut updated);
        if updated.number() != number || updated.relative_path() != slot.record.relative_path() {
            return Err(LineageError::ImmutableVersion {
                owner: self.owner.clone(),
                number,
            });
        }
        slot.record = Arc::new(updated);
        Ok(slot.record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    struct Rec {
        number: u64,
        path: String,
        note: String,
    }

    impl Rec {
        fn new(number: u64) -> Self {
            Self {
                number,
                path: format!("hero/hero_v{number:03}.ma"),
                note: String::new(),
            }
        }
    }

    impl VersionRecord for Rec {
        fn number(&self) -> u64 {
            self.number
        }

        fn relative_path(&self) -> &str {
            &self.path
        }
    }

    fn work_ledger(count: u64) -> VersionLedger<Rec> {
        let ledger = VersionLedger::new(LedgerKind::Work, "work hero");
        for _ in 0..count {
            ledger.append_with(Rec::new).unwrap();
        }
        ledger
    }

    fn disk(ledger: &VersionLedger<Rec>, numbers: &[u64]) -> DiskScan<Rec> {
        DiskScan {
            entries: numbers.iter().copied().map(Rec::new).collect(),
            unreadable: BTreeSet::new(),
            mark: ledger.mark(),
        }
    }

    #[test]
    fn test_append_numbers_from_one() {
        let ledger = work_ledger(0);
        let numbers: Vec<u64> = (0..4)
            .map(|_| ledger.append_with(Rec::new).unwrap().number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_concurrent_appends_are_serialized() {
        let ledger = Arc::new(VersionLedger::new(LedgerKind::Work, "work hero"));
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let ledger = ledger.clone();
                thread::spawn(move || {
                    (0..25)
                        .map(|i| {
                            ledger
                                .append_with(|number| Rec {
                                    number,
                                    path: format!("hero/w{worker}_{i}.ma"),
                                    note: String::new(),
                                })
                                .unwrap()
                                .number
                        })
                        .collect::<Vec<u64>>()
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            let numbers = handle.join().unwrap();
            assert!(numbers.windows(2).all(|pair| pair[0] < pair[1]));
            all.extend(numbers);
        }
        all.sort_unstable();
        assert_eq!(all, (1..=200).collect::<Vec<u64>>());
    }

    #[test]
    fn test_non_monotonic_append_leaves_state() {
        let ledger = work_ledger(3);
        let before = ledger.entries();
        let err = ledger.append(Rec::new(2)).unwrap_err();
        assert!(err.is_consistency());
        assert!(matches!(
            err,
            LineageError::NonMonotonicVersion {
                attempted: 2,
                current: 3,
                ..
            }
        ));
        assert_eq!(ledger.entries(), before);
        assert_eq!(ledger.append(Rec::new(4)).unwrap().number, 4);
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let ledger = work_ledger(1);
        let err = ledger
            .append_with(|number| Rec {
                number,
                path: "hero/hero_v001.ma".into(),
                note: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, LineageError::DuplicateVersionPath { existing: 1, .. }));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_sentinels_on_work_ledger() {
        let ledger = work_ledger(5);
        ledger.set_in_progress(|number| Rec {
            note: "unsaved edit".into(),
            ..Rec::new(number)
        });

        assert_eq!(ledger.get(VersionSelector::Latest).unwrap().number, 5);
        let pending = ledger.get(VersionSelector::InProgress).unwrap();
        assert_eq!(pending.note, "unsaved edit");
        assert_eq!(pending.number, 6);
        assert_eq!(ledger.len(), 5);
    }

    #[test]
    fn test_sentinels_on_empty_ledger() {
        let ledger = work_ledger(0);
        assert!(ledger.get(VersionSelector::Latest).unwrap_err().is_not_found());
        assert!(ledger.get(VersionSelector::InProgress).unwrap_err().is_not_found());
        assert!(ledger.get(1u64).unwrap_err().is_not_found());
        assert!(ledger.latest().is_none());
    }

    #[test]
    fn test_publish_latest_follows_live() {
        let ledger = VersionLedger::new(LedgerKind::Publish, "publish hero");
        for _ in 0..3 {
            ledger.append_with(Rec::new).unwrap();
        }
        assert_eq!(ledger.get(VersionSelector::Latest).unwrap().number, 3);
        ledger.set_live(2).unwrap();
        assert_eq!(ledger.get(VersionSelector::Latest).unwrap().number, 2);
        assert!(ledger.set_live(9).unwrap_err().is_not_found());

        // a work ledger ignores the live marker
        let work = work_ledger(3);
        work.set_live(1).unwrap();
        assert_eq!(work.get(VersionSelector::Latest).unwrap().number, 3);
    }

    #[test]
    fn test_promoted_is_separate_from_live() {
        let ledger = VersionLedger::new(LedgerKind::Publish, "publish hero");
        for _ in 0..4 {
            ledger.append_with(Rec::new).unwrap();
        }
        assert!(ledger.get(VersionSelector::Promoted).unwrap_err().is_not_found());

        ledger.set_live(3).unwrap();
        ledger.set_promoted(2).unwrap();
        assert_eq!(ledger.get(VersionSelector::Latest).unwrap().number, 3);
        assert_eq!(ledger.get(VersionSelector::Promoted).unwrap().number, 2);
        assert!(ledger.set_promoted(7).unwrap_err().is_not_found());
        assert_eq!(ledger.promoted(), Some(2));

        // a promoted version that left the disk no longer resolves
        ledger.rescan(disk(&ledger, &[1, 3, 4]));
        assert!(ledger.get(VersionSelector::Promoted).is_err());
    }

    #[test]
    fn test_retract_undoes_an_append() {
        let ledger = work_ledger(2);
        let reservation = ledger.set_in_progress(Rec::new);
        let appended = ledger.append_with(Rec::new).unwrap();
        assert!(ledger.in_progress().is_none());

        assert!(ledger.retract(&appended, Some(reservation)));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.next_number(), 3);
        assert!(ledger.find_by_path("hero/hero_v003.ma").is_none());
        assert_eq!(ledger.in_progress().unwrap().number, 3);

        // the number is free again for the retry
        assert_eq!(ledger.append(Rec::new(3)).unwrap().number, 3);
        assert!(!ledger.retract(&appended, None));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let ledger = work_ledger(2);
        let first = ledger.rescan(disk(&ledger, &[1, 2, 3, 5]));
        assert_eq!(first.added, vec![3, 5]);
        let after_first = ledger.entries();

        let second = ledger.rescan(disk(&ledger, &[1, 2, 3, 5]));
        assert!(second.is_unchanged());
        assert_eq!(ledger.entries(), after_first);
        assert_eq!(ledger.next_number(), 6);
    }

    #[test]
    fn test_rescan_flags_and_restores() {
        let ledger = work_ledger(3);
        let summary = ledger.rescan(disk(&ledger, &[1, 3]));
        assert_eq!(summary.flagged_missing, vec![2]);
        assert_eq!(ledger.is_missing(2), Some(true));
        assert_eq!(ledger.versions().len(), 2);
        assert_eq!(ledger.get(2u64).unwrap().number, 2);

        // a missing version never gives up its number
        assert_eq!(ledger.next_number(), 4);

        let summary = ledger.rescan(disk(&ledger, &[1, 2, 3]));
        assert_eq!(summary.restored, vec![2]);
        assert_eq!(ledger.is_missing(2), Some(false));
    }

    #[test]
    fn test_latest_skips_missing() {
        let ledger = work_ledger(3);
        ledger.rescan(disk(&ledger, &[1, 2]));
        assert_eq!(ledger.get(VersionSelector::Latest).unwrap().number, 2);
    }

    #[test]
    fn test_append_wins_over_stale_listing() {
        let ledger = work_ledger(2);
        let scan = disk(&ledger, &[1, 2]);
        // saved while the listing was in flight
        ledger.append_with(Rec::new).unwrap();

        let summary = ledger.rescan(scan);
        assert!(summary.flagged_missing.is_empty());
        assert_eq!(ledger.is_missing(3), Some(false));
    }

    #[test]
    fn test_unreadable_entries_are_not_flagged() {
        let ledger = work_ledger(3);
        let mut scan = disk(&ledger, &[1, 3]);
        scan.unreadable.insert(2);
        let summary = ledger.rescan(scan);
        assert!(summary.flagged_missing.is_empty());
    }

    #[test]
    fn test_rescan_clears_superseded_reservation() {
        let ledger = work_ledger(1);
        ledger.set_in_progress(Rec::new);
        ledger.rescan(disk(&ledger, &[1]));
        assert!(ledger.in_progress().is_some());

        ledger.rescan(disk(&ledger, &[1, 2]));
        assert!(ledger.in_progress().is_none());
    }

    #[test]
    fn test_backfill_keeps_identity() {
        let ledger = work_ledger(2);
        let updated = ledger
            .backfill(1, |record| record.note = "thumbnail".into())
            .unwrap();
        assert_eq!(updated.note, "thumbnail");
        assert_eq!(ledger.get(1u64).unwrap().note, "thumbnail");
        let err = ledger.backfill(1, |record| record.number = 9).unwrap_err();
        assert!(matches!(err, LineageError::ImmutableVersion { number: 1, .. }));
        assert!(err.is_consistency());
        let err = ledger
            .backfill(2, |record| record.path = "hero/renamed.ma".into())
            .unwrap_err();
        assert!(matches!(err, LineageError::ImmutableVersion { number: 2, .. }));
        assert_eq!(ledger.get(1u64).unwrap().number, 1);
        assert!(ledger.find_by_path("hero/hero_v002.ma").is_some());
    }

    #[test]
    fn test_selector_parsing() {
        assert_eq!("latest".parse::<VersionSelector>().unwrap(), VersionSelector::Latest);
        assert_eq!("live".parse::<VersionSelector>().unwrap(), VersionSelector::Latest);
        assert_eq!("pro".parse::<VersionSelector>().unwrap(), VersionSelector::Promoted);
        assert_eq!("wip".parse::<VersionSelector>().unwrap(), VersionSelector::InProgress);
        assert_eq!("v007".parse::<VersionSelector>().unwrap(), VersionSelector::Number(7));
        assert_eq!("12".parse::<VersionSelector>().unwrap(), VersionSelector::Number(12));
        assert!("v0".parse::<VersionSelector>().is_err());
        assert!("newest".parse::<VersionSelector>().is_err());

        assert_eq!(VersionSelector::try_from(-1i64).unwrap(), VersionSelector::Latest);
        assert_eq!(VersionSelector::try_from(0i64).unwrap(), VersionSelector::InProgress);
        assert_eq!(VersionSelector::try_from(3i64).unwrap(), VersionSelector::Number(3));
        assert!(VersionSelector::try_from(-2i64).is_err());

        assert_eq!(VersionSelector::from_publish_code(-1).unwrap(), VersionSelector::Latest);
        assert_eq!(VersionSelector::from_publish_code(0).unwrap(), VersionSelector::Promoted);
        assert_eq!(VersionSelector::from_publish_code(4).unwrap(), VersionSelector::Number(4));
    }
}
