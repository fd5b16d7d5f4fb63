//! Match tracked time entries against scheduled work events.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{TimeEntry, WorkEvent};
use crate::{Error, Result};

/// Upper bound on the look-back; the tracker serves no older entries.
pub const MAX_TRACKING_DAYS: i64 = 90;

/// A range of whole local days, `[from, to)` as instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackingWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

fn local_midnight(day: NaiveDate) -> DateTime<Utc> {
    let naive = day.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

impl TrackingWindow {
    /// The days `today - since_days ..= today`.
    pub fn ending_on(today: NaiveDate, since_days: i64) -> Result<Self> {
        if !(0..=MAX_TRACKING_DAYS).contains(&since_days) {
            return Err(Error::InvalidInput(format!(
                "since-days must be between 0 and {}, got {}",
                MAX_TRACKING_DAYS, since_days
            )));
        }
        let first = today - Duration::days(since_days);
        let after_last = today + Duration::days(1);
        Ok(Self {
            from: local_midnight(first),
            to: local_midnight(after_last),
        })
    }

    pub fn ending_today(since_days: i64) -> Result<Self> {
        Self::ending_on(Local::now().date_naive(), since_days)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.from && instant < self.to
    }
}

/// Strip leading decoration (emoji, bullets, punctuation) and whitespace.
pub fn clean_name(name: &str) -> &str {
    name.trim_start_matches(|c: char| !c.is_alphanumeric()).trim()
}

/// True when both sides exist and agree on name, start and end.
pub fn is_matching(entry: Option<&TimeEntry>, event: Option<&WorkEvent>) -> bool {
    let (Some(entry), Some(event)) = (entry, event) else {
        return false;
    };
    let Some(description) = entry.description.as_deref() else {
        return false;
    };
    clean_name(description) == clean_name(&event.title)
        && entry.start == event.start
        && entry.effective_end() == Some(event.end)
}

/// The event whose start is nearest to the entry's start.
///
/// On a tie the earlier candidate in `events` is kept.
pub fn nearest_event<'a, I>(entry: &TimeEntry, events: I) -> Option<&'a WorkEvent>
where
    I: IntoIterator<Item = &'a WorkEvent>,
{
    let mut best: Option<(&WorkEvent, Duration)> = None;
    for event in events {
        let distance = (event.start - entry.start).abs();
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((event, distance)),
        }
    }
    best.map(|(event, _)| event)
}

/// A work event that should be moved to match its time entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Adjustment {
    pub entry: TimeEntry,
    pub event: WorkEvent,
}

/// What to change so the schedule reflects tracked time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackingPlan {
    /// Entries with no work event; work should be logged for them.
    pub missing: Vec<TimeEntry>,
    /// Events that exist but disagree with their entry.
    pub adjustments: Vec<Adjustment>,
    pub in_sync: usize,
    pub skipped_running: usize,
}

impl TrackingPlan {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.adjustments.is_empty()
    }
}

/// Classify every finished entry as missing, needing adjustment, or in sync.
///
/// Each event backs at most one entry. Entry/event pairs with the same
/// name are claimed closest first, so an entry that loses its nearest
/// event still takes the nearest free one. Entries left without an
/// event count as missing.
pub fn plan(entries: &[TimeEntry], events: &[WorkEvent]) -> TrackingPlan {
    let mut by_name: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (position, event) in events.iter().enumerate() {
        by_name
            .entry(clean_name(&event.title))
            .or_default()
            .push(position);
    }

    let mut result = TrackingPlan::default();
    // (distance, entry index, event position)
    let mut candidates: Vec<(Duration, usize, usize)> = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        if entry.is_running() {
            result.skipped_running += 1;
            continue;
        }
        let group = entry
            .description
            .as_deref()
            .and_then(|d| by_name.get(clean_name(d)));
        for &position in group.into_iter().flatten() {
            let distance = (events[position].start - entry.start).abs();
            candidates.push((distance, index, position));
        }
    }
    candidates.sort();

    let mut assigned: HashMap<usize, usize> = HashMap::new();
    let mut taken: HashSet<usize> = HashSet::new();
    for (_, index, position) in candidates {
        if assigned.contains_key(&index) || taken.contains(&position) {
            continue;
        }
        assigned.insert(index, position);
        taken.insert(position);
    }

    for (index, entry) in entries.iter().enumerate() {
        if entry.is_running() {
            continue;
        }
        let Some(&position) = assigned.get(&index) else {
            result.missing.push(entry.clone());
            continue;
        };
        let event = &events[position];
        if is_matching(Some(entry), Some(event)) {
            result.in_sync += 1;
        } else {
            result.adjustments.push(Adjustment {
                entry: entry.clone(),
                event: event.clone(),
            });
        }
    }

    result
}
