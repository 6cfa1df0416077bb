//! Visitor registration by authenticated residents.
//!
//! Two flows append a row to the shared directory:
//! - Vehicle passes get a derived code, `QR` + compacted visitor name +
//!   the resident's own access code, to be rendered as a QR image by the
//!   caller.
//! - Pedestrian visitors (one-day or recurring service staff) are recorded
//!   by a descriptive entry name.

pub mod request;

pub use request::{
    PedestrianKind, PedestrianRequest, VehiclePassRequest, VisitRules, VisitWindow,
};

use crate::directory::{DirectorySource, SourceRow};
use crate::session::Session;
use chrono::NaiveDate;
use std::sync::Arc;

/// Directory type tag for vehicle passes.
const VEHICLE_TAG: &str = "visita";
/// Directory type tag for pedestrian visitors.
const PEDESTRIAN_TAG: &str = "peatonal";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VisitorError {
    #[error("visitor registration requires an authenticated resident")]
    NotAuthenticated,
    #[error("invalid visit: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("the visit could not be recorded in the directory")]
    NotRecorded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Vehicle,
    Pedestrian,
}

/// A recorded visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorPass {
    pub kind: PassKind,
    /// First directory column: the pass code (vehicle) or entry name (pedestrian).
    pub code: String,
    pub visitor: String,
    pub resident: String,
    pub window: VisitWindow,
}

impl VisitorPass {
    /// Suggested file name for the rendered QR image.
    pub fn image_file_name(&self) -> String {
        let compact = compact_name(&self.visitor);
        format!(
            "QR_{}_{}_{}_{}.png",
            match self.kind {
                PassKind::Vehicle => "vehicular",
                PassKind::Pedestrian => "peatonal",
            },
            compact,
            self.window.date.format("%Y%m%d"),
            self.window.start.format("%H%M"),
        )
    }
}

pub struct VisitorDesk {
    source: Arc<dyn DirectorySource>,
    rules: VisitRules,
}

impl VisitorDesk {
    pub fn new(source: Arc<dyn DirectorySource>, rules: VisitRules) -> Self {
        Self { source, rules }
    }

    pub fn rules(&self) -> &VisitRules {
        &self.rules
    }

    pub async fn register_vehicle(
        &self,
        session: &Session,
        request: &VehiclePassRequest,
    ) -> Result<VisitorPass, VisitorError> {
        self.register_vehicle_on(session, request, self.rules.today())
            .await
    }

    pub async fn register_vehicle_on(
        &self,
        session: &Session,
        request: &VehiclePassRequest,
        today: NaiveDate,
    ) -> Result<VisitorPass, VisitorError> {
        require_session(session)?;
        let errors = self.rules.check_vehicle(request, today);
        if !errors.is_empty() {
            return Err(VisitorError::Invalid(errors));
        }

        let visitor = format!("{} {}", request.first_name.trim(), request.last_name.trim())
            .trim()
            .to_string();
        let code = format!(
            "QR{}{}",
            compact_name(&format!("{}{}", request.first_name, request.last_name)),
            session.principal_credential.trim()
        );

        let pass = VisitorPass {
            kind: PassKind::Vehicle,
            code,
            visitor,
            resident: session.principal_name.clone(),
            window: request.window,
        };
        self.record(&pass, VEHICLE_TAG).await?;
        Ok(pass)
    }

    pub async fn register_pedestrian(
        &self,
        session: &Session,
        request: &PedestrianRequest,
    ) -> Result<VisitorPass, VisitorError> {
        self.register_pedestrian_on(session, request, self.rules.today())
            .await
    }

    pub async fn register_pedestrian_on(
        &self,
        session: &Session,
        request: &PedestrianRequest,
        today: NaiveDate,
    ) -> Result<VisitorPass, VisitorError> {
        require_session(session)?;
        let errors = self.rules.check_pedestrian(request, today);
        if !errors.is_empty() {
            return Err(VisitorError::Invalid(errors));
        }

        let pass = VisitorPass {
            kind: PassKind::Pedestrian,
            code: request.entry_name(),
            visitor: request.name.trim().to_string(),
            resident: session.principal_name.clone(),
            window: request.window,
        };
        self.record(&pass, PEDESTRIAN_TAG).await?;
        Ok(pass)
    }

    async fn record(&self, pass: &VisitorPass, tag: &str) -> Result<(), VisitorError> {
        let (valid_from, valid_to) = pass.window.cells();
        let row = SourceRow {
            credential: pass.code.clone(),
            kind: tag.to_string(),
            owner_name: pass.resident.clone(),
            valid_from,
            valid_to,
        };
        if self.source.append_row(row).await {
            tracing::info!(resident = %pass.resident, kind = ?pass.kind, "Visitor registered");
            Ok(())
        } else {
            Err(VisitorError::NotRecorded)
        }
    }
}

fn require_session(session: &Session) -> Result<(), VisitorError> {
    if session.is_authenticated {
        Ok(())
    } else {
        Err(VisitorError::NotAuthenticated)
    }
}

/// Lowercase with all whitespace removed.
fn compact_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
