//! View layout engine.
//!
//! Maps a selected date, a view mode and the event collection onto
//! serializable grid models that the templates render directly. All
//! computation is wall-clock arithmetic on naive timestamps; nothing here
//! fetches or mutates data.

use super::Event;
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use indexmap::IndexMap;
use serde::Serialize;

/// Height of a full hour row in the day and week grids.
const HOUR_HEIGHT_PX: u32 = 64;

/// The four calendar view granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Day,
    Week,
    Month,
    Year,
}

impl ViewMode {
    /// Parses a view mode, falling back to the day view for anything
    /// unrecognized instead of failing the request.
    pub fn parse_or_day(s: &str) -> ViewMode {
        match s {
            "day" => ViewMode::Day,
            "week" => ViewMode::Week,
            "month" => ViewMode::Month,
            "year" => ViewMode::Year,
            other => {
                log::warn!("unknown calendar view {other:?}, falling back to the day view");
                ViewMode::Day
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Day => "day",
            ViewMode::Week => "week",
            ViewMode::Month => "month",
            ViewMode::Year => "year",
        }
    }
}

/// The navigation state of the calendar UI: which date is selected and at
/// which granularity it is shown. Travels in query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub mode: ViewMode,
    pub date: NaiveDate,
}

impl ViewState {
    /// Resolves the raw query parameters. Both fall back rather than fail:
    /// unknown views to the day view, unparseable dates to today.
    pub fn resolve(view: Option<&str>, date: Option<&str>, today: NaiveDate) -> ViewState {
        let mode = view.map(ViewMode::parse_or_day).unwrap_or(ViewMode::Day);

        let date = match date {
            Some(s) => s.parse().unwrap_or_else(|_| {
                log::warn!("unparseable calendar date {s:?}, falling back to today");
                today
            }),
            None => today,
        };

        ViewState { mode, date }
    }

    /// The header title for this state.
    pub fn title(&self) -> String {
        view_title(self.mode, self.date)
    }

    /// The date one step backwards at this granularity.
    pub fn prev(&self) -> NaiveDate {
        step(self.mode, self.date, -1)
    }

    /// The date one step forwards at this granularity.
    pub fn next(&self) -> NaiveDate {
        step(self.mode, self.date, 1)
    }

    pub fn nav(&self, today: NaiveDate) -> Nav {
        Nav {
            mode: self.mode,
            title: self.title(),
            date: self.date,
            prev: self.prev(),
            next: self.next(),
            today,
        }
    }
}

/// Header navigation model handed to the templates.
#[derive(Debug, Clone, Serialize)]
pub struct Nav {
    pub mode: ViewMode,
    pub title: String,
    pub date: NaiveDate,
    pub prev: NaiveDate,
    pub next: NaiveDate,
    pub today: NaiveDate,
}

fn step(mode: ViewMode, date: NaiveDate, direction: i64) -> NaiveDate {
    match mode {
        ViewMode::Day => date + Duration::days(direction),
        ViewMode::Week => date + Duration::days(7 * direction),
        ViewMode::Month => add_months(date, direction),
        ViewMode::Year => add_months(date, 12 * direction),
    }
}

fn add_months(date: NaiveDate, count: i64) -> NaiveDate {
    if count >= 0 {
        date.checked_add_months(Months::new(count as u32)).unwrap()
    } else {
        date.checked_sub_months(Months::new(-count as u32)).unwrap()
    }
}

/// The header title shown above a view.
pub fn view_title(mode: ViewMode, date: NaiveDate) -> String {
    match mode {
        ViewMode::Day => date.format("%B %-d, %Y").to_string(),
        ViewMode::Month => date.format("%B %Y").to_string(),
        ViewMode::Year => date.format("%Y").to_string(),
        ViewMode::Week => {
            let (start, end) = week_bounds(date);
            if start.month() == end.month() {
                format!("{} - {}", start.format("%b %-d"), end.format("%-d, %Y"))
            } else {
                format!("{} - {}", start.format("%b %-d"), end.format("%b %-d, %Y"))
            }
        }
    }
}

/// First (Sunday) and last (Saturday) day of the week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
    (start, start + Duration::days(6))
}

/// First and last day of the full-week grid covering the month of `date`.
pub fn month_grid_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap();
    let last = add_months(first, 1) - Duration::days(1);
    (week_bounds(first).0, week_bounds(last).1)
}

fn overlaps(event: &Event, from: NaiveDateTime, to: NaiveDateTime) -> bool {
    event.start < to && event.end > from
}

fn hour_window(date: NaiveDate, hour: u32) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap());
    (start, start + Duration::hours(1))
}

/// Events assigned to the hour bucket `hour` on `date`: everything starting
/// on that day whose interval overlaps the bucket window. Multi-hour events
/// are members of every hour they span. Ordered by start time, stable on
/// ties.
pub fn hour_bucket_members<'a>(events: &'a [Event], date: NaiveDate, hour: u32) -> Vec<&'a Event> {
    let (from, to) = hour_window(date, hour);

    let mut members: Vec<&Event> = events
        .iter()
        .filter(|event| event.start.date() == date && overlaps(event, from, to))
        .collect();
    members.sort_by_key(|event| event.start);
    members
}

/// Events assigned to the day cell for `date` in the month view. Membership
/// is start-day equality only; an event running past midnight still belongs
/// solely to the day it starts on.
pub fn day_cell_members<'a>(events: &'a [Event], date: NaiveDate) -> Vec<&'a Event> {
    let mut members: Vec<&Event> = events
        .iter()
        .filter(|event| event.start.date() == date)
        .collect();
    members.sort_by_key(|event| event.start);
    members
}

/// Number of events whose interval overlaps the given month, including
/// events that start before and end after it.
pub fn month_event_count(events: &[Event], year: i32, month: u32) -> usize {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let from = first.and_time(NaiveTime::MIN);
    let to = add_months(first, 1).and_time(NaiveTime::MIN);

    events
        .iter()
        .filter(|event| event.start < to && event.end >= from)
        .count()
}

/// How much descriptive text an inline event block shows, keyed on the
/// minutes the event overlaps its bucket window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailTier {
    /// Summary only.
    Compact,
    /// Summary and time range.
    Standard,
    /// Summary, time range and interviewer.
    Detailed,
}

impl DetailTier {
    pub fn for_minutes(minutes: i64) -> DetailTier {
        if minutes <= 20 {
            DetailTier::Compact
        } else if minutes <= 40 {
            DetailTier::Standard
        } else {
            DetailTier::Detailed
        }
    }

    fn min_height_px(self) -> u32 {
        match self {
            DetailTier::Compact => 16,
            DetailTier::Standard => 28,
            DetailTier::Detailed => 44,
        }
    }
}

fn overlap_minutes(event: &Event, from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    let start = event.start.max(from);
    let end = event.end.min(to);
    (end - start).num_minutes().max(0)
}

/// Block height scales with the overlap duration, clamped to the tier
/// minimum so short events stay clickable.
fn block_height_px(minutes: i64) -> u32 {
    let scaled = minutes.clamp(0, 60) as u32 * HOUR_HEIGHT_PX / 60;
    scaled.max(DetailTier::for_minutes(minutes).min_height_px())
}

/// The single event block rendered inline in an hour bucket.
#[derive(Debug, Clone, Serialize)]
pub struct EventBlock {
    pub id: i64,
    pub summary: String,
    /// Time range label, present from the standard tier up.
    pub time: Option<String>,
    /// Interviewer name, present at the detailed tier.
    pub interviewer: Option<String>,
    pub tier: DetailTier,
    pub height_px: u32,
}

impl EventBlock {
    fn for_window(event: &Event, from: NaiveDateTime, to: NaiveDateTime) -> EventBlock {
        let minutes = overlap_minutes(event, from, to);
        let tier = DetailTier::for_minutes(minutes);

        EventBlock {
            id: event.id,
            summary: event.summary.clone(),
            time: (tier != DetailTier::Compact).then(|| time_range_label(event)),
            interviewer: (tier == DetailTier::Detailed)
                .then(|| event.interviewer_name().unwrap_or("N/A").to_string()),
            tier,
            height_px: block_height_px(minutes),
        }
    }
}

/// One hour bucket in the day or week grid.
#[derive(Debug, Clone, Serialize)]
pub struct HourBucket {
    pub date: NaiveDate,
    pub hour: u32,
    /// Number of events assigned to this bucket. A badge with this count is
    /// shown whenever it exceeds one.
    pub count: usize,
    /// The earliest member that starts in this hour. Continuation hours of
    /// multi-hour events render no duplicate block.
    pub inline: Option<EventBlock>,
    /// Key used to open the overlay listing every member.
    pub key: String,
    pub current: bool,
}

impl HourBucket {
    pub fn build(events: &[Event], date: NaiveDate, hour: u32, now: NaiveDateTime) -> HourBucket {
        let (from, to) = hour_window(date, hour);
        let members = hour_bucket_members(events, date, hour);

        let inline = members
            .iter()
            .find(|event| event.start.hour() == hour)
            .map(|event| EventBlock::for_window(event, from, to));

        HourBucket {
            date,
            hour,
            count: members.len(),
            inline,
            key: BucketRef::hour(date, hour).key(),
            current: now.date() == date && now.hour() == hour,
        }
    }
}

/// One labeled hour row of the day view.
#[derive(Debug, Clone, Serialize)]
pub struct DaySlot {
    pub label: String,
    pub bucket: HourBucket,
}

/// The day view: 24 hour rows for a single date.
#[derive(Debug, Clone, Serialize)]
pub struct DayView {
    pub date: NaiveDate,
    pub slots: Vec<DaySlot>,
}

impl DayView {
    pub fn build(events: &[Event], date: NaiveDate, now: NaiveDateTime) -> DayView {
        let slots = (0..24)
            .map(|hour| DaySlot {
                label: hour_label(hour),
                bucket: HourBucket::build(events, date, hour, now),
            })
            .collect();

        DayView { date, slots }
    }
}

/// Column header of the week view.
#[derive(Debug, Clone, Serialize)]
pub struct DayHeader {
    pub date: NaiveDate,
    pub weekday: String,
    pub day: u32,
    pub is_today: bool,
}

/// One labeled hour row of the week view, with a cell per weekday.
#[derive(Debug, Clone, Serialize)]
pub struct WeekRow {
    pub label: String,
    pub cells: Vec<HourBucket>,
}

/// The week view: Sunday through Saturday, 24 hour rows.
#[derive(Debug, Clone, Serialize)]
pub struct WeekView {
    pub days: Vec<DayHeader>,
    pub rows: Vec<WeekRow>,
}

impl WeekView {
    pub fn build(events: &[Event], date: NaiveDate, now: NaiveDateTime) -> WeekView {
        let (start, _) = week_bounds(date);
        let dates: Vec<NaiveDate> = (0..7).map(|i| start + Duration::days(i)).collect();

        let days = dates
            .iter()
            .map(|&date| DayHeader {
                date,
                weekday: date.format("%a").to_string(),
                day: date.day(),
                is_today: date == now.date(),
            })
            .collect();

        let rows = (0..24)
            .map(|hour| WeekRow {
                label: hour_label(hour),
                cells: dates
                    .iter()
                    .map(|&date| HourBucket::build(events, date, hour, now))
                    .collect(),
            })
            .collect();

        WeekView { days, rows }
    }
}

/// The inline entry of a month day cell.
#[derive(Debug, Clone, Serialize)]
pub struct MonthEntry {
    pub id: i64,
    pub summary: String,
    pub position: String,
}

/// One day cell of the month grid.
#[derive(Debug, Clone, Serialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub day: u32,
    pub in_month: bool,
    pub is_today: bool,
    pub count: usize,
    pub inline: Option<MonthEntry>,
    pub key: String,
}

/// The month view: full weeks covering the selected month.
#[derive(Debug, Clone, Serialize)]
pub struct MonthView {
    pub weeks: Vec<Vec<DayCell>>,
}

impl MonthView {
    pub fn build(events: &[Event], date: NaiveDate, now: NaiveDateTime) -> MonthView {
        let (grid_start, grid_end) = month_grid_bounds(date);

        // Group once in file order instead of rescanning the collection for
        // every cell.
        let mut by_day: IndexMap<NaiveDate, Vec<&Event>> = IndexMap::new();
        for event in events {
            by_day.entry(event.start.date()).or_default().push(event);
        }

        let mut weeks = Vec::new();
        let mut week = Vec::new();
        let mut day = grid_start;

        while day <= grid_end {
            let mut members = by_day.get(&day).cloned().unwrap_or_default();
            members.sort_by_key(|event| event.start);

            let inline = members.first().map(|event| MonthEntry {
                id: event.id,
                summary: event.summary.clone(),
                position: event.job_title().unwrap_or("N/A").to_string(),
            });

            week.push(DayCell {
                date: day,
                day: day.day(),
                in_month: day.month() == date.month() && day.year() == date.year(),
                is_today: day == now.date(),
                count: members.len(),
                inline,
                key: BucketRef::day(day).key(),
            });

            if week.len() == 7 {
                weeks.push(std::mem::take(&mut week));
            }

            day += Duration::days(1);
        }

        MonthView { weeks }
    }
}

/// One day of a mini month grid on a year-view card.
#[derive(Debug, Clone, Serialize)]
pub struct MiniDay {
    pub day: u32,
    pub in_month: bool,
    pub is_today: bool,
}

/// One month card of the year view.
#[derive(Debug, Clone, Serialize)]
pub struct MonthSummary {
    pub month: u32,
    pub name: String,
    /// First day of the month, used as the month-view link target.
    pub date: NaiveDate,
    pub count: usize,
    pub count_label: String,
    pub is_current: bool,
    pub weeks: Vec<Vec<MiniDay>>,
}

/// The year view: twelve month cards with event counts.
#[derive(Debug, Clone, Serialize)]
pub struct YearView {
    pub year: i32,
    pub months: Vec<MonthSummary>,
}

impl YearView {
    pub fn build(events: &[Event], year: i32, today: NaiveDate) -> YearView {
        let months = (1..=12)
            .map(|month| {
                let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
                let count = month_event_count(events, year, month);

                MonthSummary {
                    month,
                    name: first.format("%B").to_string(),
                    date: first,
                    count,
                    count_label: match count {
                        0 => "No events".to_string(),
                        1 => "1 event".to_string(),
                        n => format!("{n} events"),
                    },
                    is_current: today.year() == year && today.month() == month,
                    weeks: mini_month_weeks(first, today),
                }
            })
            .collect();

        YearView { year, months }
    }
}

fn mini_month_weeks(first: NaiveDate, today: NaiveDate) -> Vec<Vec<MiniDay>> {
    let (grid_start, grid_end) = month_grid_bounds(first);

    let mut weeks = Vec::new();
    let mut week = Vec::new();
    let mut day = grid_start;

    while day <= grid_end {
        week.push(MiniDay {
            day: day.day(),
            in_month: day.month() == first.month(),
            is_today: day == today,
        });

        if week.len() == 7 {
            weeks.push(std::mem::take(&mut week));
        }

        day += Duration::days(1);
    }

    weeks
}

/// Addresses a single bucket of the day, week or month grid, as carried in
/// the `bucket` query parameter: `2024-06-10T09` for an hour bucket,
/// `2024-06-10` for a month day cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketRef {
    pub date: NaiveDate,
    pub hour: Option<u32>,
}

impl BucketRef {
    pub fn hour(date: NaiveDate, hour: u32) -> BucketRef {
        BucketRef {
            date,
            hour: Some(hour),
        }
    }

    pub fn day(date: NaiveDate) -> BucketRef {
        BucketRef { date, hour: None }
    }

    pub fn parse(s: &str) -> Option<BucketRef> {
        match s.split_once('T') {
            Some((date, hour)) => {
                let date = date.parse().ok()?;
                let hour: u32 = hour.parse().ok()?;
                (hour < 24).then_some(BucketRef::hour(date, hour))
            }
            None => Some(BucketRef::day(s.parse().ok()?)),
        }
    }

    pub fn key(&self) -> String {
        match self.hour {
            Some(hour) => format!("{}T{hour:02}", self.date),
            None => self.date.to_string(),
        }
    }
}

/// One row of the bucket overlay.
#[derive(Debug, Clone, Serialize)]
pub struct OverlayRow {
    pub id: i64,
    pub position: String,
    pub summary: String,
    pub interviewer: String,
    pub date: String,
    pub time: String,
}

/// The overlay listing every event of an activated bucket.
#[derive(Debug, Clone, Serialize)]
pub struct Overlay {
    pub key: String,
    pub rows: Vec<OverlayRow>,
}

impl Overlay {
    pub fn build(events: &[Event], bucket: BucketRef) -> Overlay {
        let members = match bucket.hour {
            Some(hour) => hour_bucket_members(events, bucket.date, hour),
            None => day_cell_members(events, bucket.date),
        };

        let rows = members
            .into_iter()
            .map(|event| OverlayRow {
                id: event.id,
                position: event.job_title().unwrap_or("N/A").to_string(),
                summary: event.summary.clone(),
                interviewer: event.interviewer_name().unwrap_or("N/A").to_string(),
                date: event.start.format("%d %b %Y").to_string(),
                time: time_range_label(event),
            })
            .collect();

        Overlay {
            key: bucket.key(),
            rows,
        }
    }
}

fn hour_label(hour: u32) -> String {
    NaiveTime::from_hms_opt(hour, 0, 0)
        .unwrap()
        .format("%-I %p")
        .to_string()
}

fn time_range_label(event: &Event) -> String {
    format!(
        "{} - {}",
        event.start.format("%-I:%M %p"),
        event.end.format("%-I:%M %p")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Event;

    fn dt(s: &str) -> NaiveDateTime {
        s.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn event(id: i64, start: &str, end: &str) -> Event {
        Event {
            id,
            summary: format!("Round {id}"),
            description: None,
            start: dt(start),
            end: dt(end),
            link: None,
            position: None,
            interviewer: None,
            created_by: None,
            meeting_platform: None,
            documents: None,
            job_id: None,
            user_det: None,
            extra: Default::default(),
        }
    }

    fn ids(members: &[&Event]) -> Vec<i64> {
        members.iter().map(|event| event.id).collect()
    }

    #[test]
    fn hour_bucket_uses_interval_overlap() {
        let events = vec![
            event(1, "2024-06-10T09:15:00", "2024-06-10T09:45:00"),
            event(2, "2024-06-10T14:00:00", "2024-06-10T15:00:00"),
            // Same hour, different day.
            event(3, "2024-06-11T09:15:00", "2024-06-11T09:45:00"),
        ];
        let day = date("2024-06-10");

        assert_eq!(ids(&hour_bucket_members(&events, day, 9)), vec![1]);
        assert!(hour_bucket_members(&events, day, 8).is_empty());
        assert!(hour_bucket_members(&events, day, 10).is_empty());
        assert_eq!(ids(&hour_bucket_members(&events, day, 14)), vec![2]);
    }

    #[test]
    fn multi_hour_event_is_member_of_every_spanned_hour() {
        let events = vec![event(1, "2024-06-10T09:30:00", "2024-06-10T11:30:00")];
        let day = date("2024-06-10");

        assert_eq!(ids(&hour_bucket_members(&events, day, 9)), vec![1]);
        assert_eq!(ids(&hour_bucket_members(&events, day, 10)), vec![1]);
        assert_eq!(ids(&hour_bucket_members(&events, day, 11)), vec![1]);
        assert!(hour_bucket_members(&events, day, 12).is_empty());

        // Inline display happens only in the bucket containing the start;
        // continuation hours show the membership count without a duplicate.
        let now = dt("2024-01-01T00:00:00");
        let start_bucket = HourBucket::build(&events, day, 9, now);
        assert_eq!(start_bucket.inline.as_ref().map(|block| block.id), Some(1));

        let continuation = HourBucket::build(&events, day, 10, now);
        assert_eq!(continuation.count, 1);
        assert!(continuation.inline.is_none());
    }

    #[test]
    fn inline_is_earliest_start_in_hour_with_exact_badge_count() {
        let events = vec![
            event(1, "2024-06-10T08:30:00", "2024-06-10T09:30:00"),
            event(2, "2024-06-10T09:10:00", "2024-06-10T09:40:00"),
            event(3, "2024-06-10T09:05:00", "2024-06-10T09:20:00"),
        ];
        let day = date("2024-06-10");
        let now = dt("2024-01-01T00:00:00");

        let members = hour_bucket_members(&events, day, 9);
        assert_eq!(ids(&members), vec![1, 3, 2]);

        let bucket = HourBucket::build(&events, day, 9, now);
        assert_eq!(bucket.count, 3);
        // Event 1 is earliest but started at 8; event 3 is the earliest
        // member actually starting in this hour.
        assert_eq!(bucket.inline.as_ref().map(|block| block.id), Some(3));

        // A single-member bucket renders inline without a badge.
        let bucket = HourBucket::build(&events, day, 8, now);
        assert_eq!(bucket.count, 1);
        assert_eq!(bucket.inline.as_ref().map(|block| block.id), Some(1));
    }

    #[test]
    fn equal_start_times_keep_collection_order() {
        let events = vec![
            event(7, "2024-06-10T09:00:00", "2024-06-10T09:30:00"),
            event(4, "2024-06-10T09:00:00", "2024-06-10T10:00:00"),
        ];

        let members = hour_bucket_members(&events, date("2024-06-10"), 9);
        assert_eq!(ids(&members), vec![7, 4]);
    }

    #[test]
    fn detail_tiers_follow_overlap_duration() {
        let day = date("2024-06-10");
        let now = dt("2024-01-01T00:00:00");

        // 30 minutes: standard tier, summary plus time.
        let events = vec![event(1, "2024-06-10T09:15:00", "2024-06-10T09:45:00")];
        let block = HourBucket::build(&events, day, 9, now).inline.unwrap();
        assert_eq!(block.tier, DetailTier::Standard);
        assert_eq!(block.time.as_deref(), Some("9:15 AM - 9:45 AM"));
        assert!(block.interviewer.is_none());

        // 15 minutes: compact tier, summary only.
        let events = vec![event(2, "2024-06-10T09:00:00", "2024-06-10T09:15:00")];
        let block = HourBucket::build(&events, day, 9, now).inline.unwrap();
        assert_eq!(block.tier, DetailTier::Compact);
        assert!(block.time.is_none());
        assert!(block.interviewer.is_none());

        // Full-hour overlap of a longer event: detailed tier.
        let mut long = event(3, "2024-06-10T09:00:00", "2024-06-10T10:30:00");
        long.interviewer = Some("Vinodhini".into());
        let events = vec![long];
        let block = HourBucket::build(&events, day, 9, now).inline.unwrap();
        assert_eq!(block.tier, DetailTier::Detailed);
        assert_eq!(block.time.as_deref(), Some("9:00 AM - 10:30 AM"));
        assert_eq!(block.interviewer.as_deref(), Some("Vinodhini"));
    }

    #[test]
    fn block_height_is_monotonic_and_clamped() {
        assert_eq!(block_height_px(10), 16);
        assert_eq!(block_height_px(30), 32);
        assert_eq!(block_height_px(45), 48);
        assert_eq!(block_height_px(60), 64);
        // Overlap never exceeds the bucket window.
        assert_eq!(block_height_px(90), 64);
    }

    #[test]
    fn month_cells_use_start_day_equality_only() {
        // Crosses midnight: belongs to June 10th only, never the 11th.
        let events = vec![event(1, "2024-06-10T23:59:00", "2024-06-11T00:01:00")];

        assert_eq!(ids(&day_cell_members(&events, date("2024-06-10"))), vec![1]);
        assert!(day_cell_members(&events, date("2024-06-11")).is_empty());
    }

    #[test]
    fn month_view_covers_full_weeks() {
        let events = vec![
            event(1, "2024-06-10T09:00:00", "2024-06-10T10:00:00"),
            event(2, "2024-06-10T11:00:00", "2024-06-10T12:00:00"),
        ];
        let view = MonthView::build(&events, date("2024-06-15"), dt("2024-06-10T09:30:00"));

        // June 2024 spans six Sunday-to-Saturday weeks (May 26 - July 6).
        assert_eq!(view.weeks.len(), 6);
        assert!(view.weeks.iter().all(|week| week.len() == 7));
        assert_eq!(view.weeks[0][0].date, date("2024-05-26"));
        assert!(!view.weeks[0][0].in_month);
        assert_eq!(view.weeks[5][6].date, date("2024-07-06"));

        let cell = view
            .weeks
            .iter()
            .flatten()
            .find(|cell| cell.date == date("2024-06-10"))
            .unwrap();
        assert!(cell.in_month);
        assert!(cell.is_today);
        assert_eq!(cell.count, 2);
        assert_eq!(cell.inline.as_ref().map(|entry| entry.id), Some(1));
        assert_eq!(cell.key, "2024-06-10");
    }

    #[test]
    fn year_counts_use_month_span_overlap() {
        let events = vec![
            event(1, "2024-06-10T09:00:00", "2024-06-10T10:00:00"),
            // Contains June entirely.
            event(2, "2024-05-20T09:00:00", "2024-07-10T10:00:00"),
            // Ends exactly at the start of June: still counted.
            event(3, "2024-05-31T22:00:00", "2024-06-01T00:00:00"),
            // Starts exactly at the start of July: not a June event.
            event(4, "2024-07-01T00:00:00", "2024-07-01T01:00:00"),
        ];

        assert_eq!(month_event_count(&events, 2024, 6), 3);
        assert_eq!(month_event_count(&events, 2024, 5), 2);
        assert_eq!(month_event_count(&events, 2024, 7), 2);
        assert_eq!(month_event_count(&events, 2024, 4), 0);
    }

    #[test]
    fn year_view_cards_carry_counts_and_mini_grids() {
        let events = vec![
            event(1, "2024-06-10T09:00:00", "2024-06-10T10:00:00"),
            event(2, "2024-06-12T09:00:00", "2024-06-12T10:00:00"),
        ];
        let view = YearView::build(&events, 2024, date("2024-06-10"));

        assert_eq!(view.months.len(), 12);

        let june = &view.months[5];
        assert_eq!(june.name, "June");
        assert_eq!(june.date, date("2024-06-01"));
        assert_eq!(june.count, 2);
        assert_eq!(june.count_label, "2 events");
        assert!(june.is_current);
        assert!(june.weeks.iter().all(|week| week.len() == 7));

        assert_eq!(view.months[0].count_label, "No events");
        assert!(!view.months[0].is_current);
    }

    #[test]
    fn unknown_view_mode_falls_back_to_day() {
        assert_eq!(ViewMode::parse_or_day("agenda"), ViewMode::Day);
        assert_eq!(ViewMode::parse_or_day("week"), ViewMode::Week);
        assert_eq!(ViewMode::parse_or_day("month"), ViewMode::Month);
        assert_eq!(ViewMode::parse_or_day("year"), ViewMode::Year);
    }

    #[test]
    fn view_state_resolution_is_lenient() {
        let today = date("2024-06-10");

        let state = ViewState::resolve(Some("week"), Some("2024-06-03"), today);
        assert_eq!(state.mode, ViewMode::Week);
        assert_eq!(state.date, date("2024-06-03"));

        let state = ViewState::resolve(None, None, today);
        assert_eq!(state.mode, ViewMode::Day);
        assert_eq!(state.date, today);

        let state = ViewState::resolve(Some("agenda"), Some("not-a-date"), today);
        assert_eq!(state.mode, ViewMode::Day);
        assert_eq!(state.date, today);
    }

    #[test]
    fn view_titles_match_header_formats() {
        let day = date("2024-06-10");

        assert_eq!(view_title(ViewMode::Day, day), "June 10, 2024");
        assert_eq!(view_title(ViewMode::Month, day), "June 2024");
        assert_eq!(view_title(ViewMode::Year, day), "2024");
        // Week fully inside one month.
        assert_eq!(view_title(ViewMode::Week, day), "Jun 9 - 15, 2024");
        // Week crossing a month boundary.
        assert_eq!(
            view_title(ViewMode::Week, date("2024-07-03")),
            "Jun 30 - Jul 6, 2024"
        );
    }

    #[test]
    fn navigation_steps_per_granularity() {
        let state = ViewState {
            mode: ViewMode::Day,
            date: date("2024-06-10"),
        };
        assert_eq!(state.prev(), date("2024-06-09"));
        assert_eq!(state.next(), date("2024-06-11"));

        let state = ViewState {
            mode: ViewMode::Week,
            date: date("2024-06-10"),
        };
        assert_eq!(state.prev(), date("2024-06-03"));
        assert_eq!(state.next(), date("2024-06-17"));

        // Month steps clamp to the last day of shorter months.
        let state = ViewState {
            mode: ViewMode::Month,
            date: date("2024-03-31"),
        };
        assert_eq!(state.prev(), date("2024-02-29"));
        assert_eq!(state.next(), date("2024-04-30"));

        let state = ViewState {
            mode: ViewMode::Year,
            date: date("2024-02-29"),
        };
        assert_eq!(state.prev(), date("2023-02-28"));
        assert_eq!(state.next(), date("2025-02-28"));
    }

    #[test]
    fn bucket_refs_round_trip() {
        let hour = BucketRef::parse("2024-06-10T09").unwrap();
        assert_eq!(hour, BucketRef::hour(date("2024-06-10"), 9));
        assert_eq!(hour.key(), "2024-06-10T09");

        let day = BucketRef::parse("2024-06-10").unwrap();
        assert_eq!(day, BucketRef::day(date("2024-06-10")));
        assert_eq!(day.key(), "2024-06-10");

        assert!(BucketRef::parse("2024-06-10T99").is_none());
        assert!(BucketRef::parse("junk").is_none());
    }

    #[test]
    fn overlay_lists_every_member_in_order() {
        let mut first = event(1, "2024-06-10T09:05:00", "2024-06-10T09:20:00");
        first.position = Some("Django Developer".into());
        let events = vec![
            event(2, "2024-06-10T09:10:00", "2024-06-10T09:40:00"),
            first,
            // Continuation from the previous hour is listed too.
            event(3, "2024-06-10T08:30:00", "2024-06-10T09:30:00"),
        ];

        let overlay = Overlay::build(&events, BucketRef::hour(date("2024-06-10"), 9));
        assert_eq!(overlay.key, "2024-06-10T09");
        assert_eq!(
            overlay.rows.iter().map(|row| row.id).collect::<Vec<_>>(),
            vec![3, 1, 2]
        );

        let row = &overlay.rows[1];
        assert_eq!(row.position, "Django Developer");
        assert_eq!(row.interviewer, "N/A");
        assert_eq!(row.date, "10 Jun 2024");
        assert_eq!(row.time, "9:05 AM - 9:20 AM");

        // Day-cell overlays use start-day equality.
        let overlay = Overlay::build(&events, BucketRef::day(date("2024-06-10")));
        assert_eq!(overlay.rows.len(), 3);
    }
}
