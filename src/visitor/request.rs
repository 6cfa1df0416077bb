//! Visit requests and their validation rules.

use crate::config::VisitorConfig;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;

/// Maximum length of free-text notes on a pedestrian visit.
pub const MAX_NOTES_CHARS: usize = 200;

/// Directory timestamp layout for visit windows.
const WINDOW_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date and time range of a single visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitWindow {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl VisitWindow {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end)
    }

    pub(crate) fn cells(&self) -> (String, String) {
        (
            self.starts_at().format(WINDOW_FORMAT).to_string(),
            self.ends_at().format(WINDOW_FORMAT).to_string(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct VehiclePassRequest {
    pub first_name: String,
    pub last_name: String,
    pub window: VisitWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PedestrianKind {
    /// Single visit; the phone number is optional.
    OneDay { phone: Option<String> },
    /// Service staff coming on several days (cleaning, gardening, ...).
    Recurring { service: String },
}

#[derive(Debug, Clone)]
pub struct PedestrianRequest {
    pub name: String,
    pub kind: PedestrianKind,
    pub window: VisitWindow,
    pub notes: String,
}

impl PedestrianRequest {
    /// Entry name as recorded: `name (service|phone) - notes`, blank parts omitted.
    pub fn entry_name(&self) -> String {
        let mut entry = self.name.trim().to_string();
        let detail = match self.kind {
            PedestrianKind::Recurring { ref service } => Some(service.trim()),
            PedestrianKind::OneDay { ref phone } => phone.as_deref().map(str::trim),
        };
        if let Some(detail) = detail.filter(|d| !d.is_empty()) {
            entry.push_str(&format!(" ({detail})"));
        }
        let notes = self.notes.trim();
        if !notes.is_empty() {
            entry.push_str(&format!(" - {notes}"));
        }
        entry
    }
}

/// Gate hours, booking horizon and local calendar for visits.
#[derive(Debug, Clone)]
pub struct VisitRules {
    pub timezone: Tz,
    pub gate_opens: NaiveTime,
    pub gate_closes: NaiveTime,
    pub vehicle_days_ahead: u32,
    pub pedestrian_days_ahead: u32,
}

impl VisitRules {
    pub fn from_config(config: &VisitorConfig) -> anyhow::Result<Self> {
        let (gate_opens, gate_closes) = config.gate_window()?;
        Ok(Self {
            timezone: config.timezone()?,
            gate_opens,
            gate_closes,
            vehicle_days_ahead: config.vehicle_days_ahead,
            pedestrian_days_ahead: config.pedestrian_days_ahead,
        })
    }

    /// Today's date in the community's timezone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    pub fn check_vehicle(&self, request: &VehiclePassRequest, today: NaiveDate) -> Vec<String> {
        let mut errors = Vec::new();
        if request.first_name.trim().is_empty() && request.last_name.trim().is_empty() {
            errors.push("visitor first or last name is required".to_string());
        }
        self.check_window(&request.window, today, self.vehicle_days_ahead, &mut errors);
        errors
    }

    pub fn check_pedestrian(&self, request: &PedestrianRequest, today: NaiveDate) -> Vec<String> {
        let mut errors = Vec::new();
        if request.name.trim().is_empty() {
            errors.push("visitor name is required".to_string());
        }
        if let PedestrianKind::Recurring { ref service } = request.kind {
            if service.trim().is_empty() {
                errors.push("service type is required for recurring visitors".to_string());
            }
        }
        if request.notes.trim().chars().count() > MAX_NOTES_CHARS {
            errors.push(format!("notes cannot exceed {MAX_NOTES_CHARS} characters"));
        }
        self.check_window(&request.window, today, self.pedestrian_days_ahead, &mut errors);
        errors
    }

    fn check_window(
        &self,
        window: &VisitWindow,
        today: NaiveDate,
        days_ahead: u32,
        errors: &mut Vec<String>,
    ) {
        let open = self.gate_opens.format("%H:%M");
        let close = self.gate_closes.format("%H:%M");
        let outside = |t: NaiveTime| t < self.gate_opens || t > self.gate_closes;

        if outside(window.start) {
            errors.push(format!("start time must be between {open} and {close}"));
        }
        if outside(window.end) {
            errors.push(format!("end time must be between {open} and {close}"));
        }
        if window.end <= window.start {
            errors.push("end time must be after start time".to_string());
        }
        if window.date < today {
            errors.push("visit date cannot be in the past".to_string());
        } else if window.date > today + TimeDelta::days(i64::from(days_ahead)) {
            errors.push(format!("visit date must be within {days_ahead} days"));
        }
    }
}
