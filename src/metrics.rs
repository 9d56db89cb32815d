use crate::calendar::layout::ViewMode;
use crate::calendar::Lookup;
use crate::Result;
use prometheus::{
    core::{AtomicU64, GenericCounter},
    opts, IntCounterVec, IntGauge, Registry,
};

pub const NAMESPACE: &str = "terminplan";

/// Container for calendar metrics.
pub struct CalendarMetrics {
    events_total: IntGauge,
    lookups_total: IntCounterVec,
    renders_total: IntCounterVec,
}

impl CalendarMetrics {
    /// Creates new CalendarMetrics.
    pub fn new() -> Result<CalendarMetrics> {
        let events_total = IntGauge::with_opts(
            opts!(
                "calendar_events_total",
                "Number of events in the calendar store"
            )
            .namespace(NAMESPACE),
        )?;

        let lookups_total = IntCounterVec::new(
            opts!(
                "calendar_lookups_total",
                "Total number of meeting id lookups performed"
            )
            .namespace(NAMESPACE),
            &["outcome"],
        )?;

        let renders_total = IntCounterVec::new(
            opts!(
                "calendar_renders_total",
                "Total number of calendar view renders"
            )
            .namespace(NAMESPACE),
            &["view"],
        )?;

        Ok(CalendarMetrics {
            events_total,
            lookups_total,
            renders_total,
        })
    }

    /// Registers the metrics in a prometheus registry.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.events_total.clone()))?;
        registry.register(Box::new(self.lookups_total.clone()))?;
        registry.register(Box::new(self.renders_total.clone()))?;
        Ok(())
    }

    /// Provides access to the total calendar events gauge.
    pub fn events_total(&self) -> IntGauge {
        self.events_total.clone()
    }

    /// Provides access to the meeting lookups counter.
    pub fn lookups_total(&self, outcome: LookupOutcome) -> GenericCounter<AtomicU64> {
        self.lookups_total.with_label_values(&[outcome.as_str()])
    }

    /// Provides access to the view renders counter.
    pub fn renders_total(&self, view: ViewMode) -> GenericCounter<AtomicU64> {
        self.renders_total.with_label_values(&[view.as_str()])
    }
}

/// Which lookup source, if any, answered a meeting id query.
#[derive(Debug, Copy, Clone)]
pub enum LookupOutcome {
    /// The id matched the event collection.
    Primary,
    /// The id matched the fallback meeting record.
    Fallback,
    /// The id matched neither source.
    Miss,
}

impl LookupOutcome {
    /// Returns the outcome as a &str.
    pub fn as_str(&self) -> &str {
        match self {
            LookupOutcome::Primary => "primary",
            LookupOutcome::Fallback => "fallback",
            LookupOutcome::Miss => "miss",
        }
    }
}

impl From<&Lookup<'_>> for LookupOutcome {
    fn from(lookup: &Lookup<'_>) -> Self {
        match lookup {
            Lookup::Primary(_) => LookupOutcome::Primary,
            Lookup::Fallback(_) => LookupOutcome::Fallback,
            Lookup::Miss => LookupOutcome::Miss,
        }
    }
}
