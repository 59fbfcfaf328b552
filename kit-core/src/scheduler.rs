//! Scheduler boundary - one pass per owner
//!
//! The scheduler decides whether a pass is a reconcile or a finalize, turns
//! errors into retry decisions, and reports both back to its caller. It holds
//! no state; serializing passes per owner is the caller's job.

use log::debug;

use crate::context::ReconcileContext;
use crate::controller::{Controller, ReconcileResult};
use crate::error::ReconcileError;
use crate::owner::ControlPlane;

/// Which controller entry point a pass used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Reconcile,
    Finalize,
}

/// Result of one pass, paired with the error that caused a failure
#[derive(Debug)]
pub struct PassReport {
    pub kind: PassKind,
    pub result: ReconcileResult,
    pub error: Option<ReconcileError>,
}

impl PassReport {
    /// Finalize succeeded: the owner can be removed
    pub fn finalized(&self) -> bool {
        self.kind == PassKind::Finalize && self.error.is_none()
    }
}

/// Run `controller` once against `owner`
pub async fn run_pass(
    controller: &dyn Controller,
    ctx: &ReconcileContext,
    owner: &mut ControlPlane,
) -> PassReport {
    let kind = if owner.is_being_deleted() {
        PassKind::Finalize
    } else {
        PassKind::Reconcile
    };
    debug!("Running {:?} of {} for {}", kind, controller.name(), owner.name);

    let outcome = match kind {
        PassKind::Reconcile => controller.reconcile(ctx, owner).await,
        PassKind::Finalize => controller.finalize(ctx, owner).await,
    };

    match outcome {
        Ok(result) => PassReport {
            kind,
            result,
            error: None,
        },
        Err(error) => PassReport {
            kind,
            result: controller.error_policy(&error),
            error: Some(error),
        },
    }
}
