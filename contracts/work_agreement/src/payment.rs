//! Payment structure strategy family.
//!
//! Four policies share one surface: record work, calculate the amount due,
//! and consume recorded work when a payment goes out. The policy is fixed at
//! formation; verification dispatches through the configured oracle client
//! (or the milestone's own oracle for milestone work), never by tag
//! comparison scattered across call sites.

use soroban_sdk::{Address, BytesN, Env, Vec};

use crate::collaborators::{OracleClient, OracleKind};
use crate::errors::AgreementError;
use crate::storage::{Milestone, PaymentConfig, PaymentType, WorkMetrics};

/// Outcome of consuming recorded work for one payment cycle.
pub struct Disbursement {
    pub amount: i128,
}

/// Verifies a work claim and accumulates it into the metrics.
///
/// Piece-rate, time-based, and custom policies accrue `amount` units or
/// hours after the oracle confirms the proof. The manual kind instead parks
/// the claim until the employer confirms it. Milestone work goes through
/// `complete_milestone`, not here.
pub fn record_work(
    env: &Env,
    config: &PaymentConfig,
    metrics: &mut WorkMetrics,
    amount: i128,
    proof: BytesN<32>,
    secondary_proof: Option<BytesN<32>>,
) -> Result<(), AgreementError> {
    if amount <= 0 {
        return Err(AgreementError::InvalidAmount);
    }

    if config.oracle_kind == OracleKind::Manual {
        metrics.pending_manual += amount;
        return Ok(());
    }

    let oracle = config
        .oracle
        .as_ref()
        .ok_or(AgreementError::VerificationFailed)?;
    verify_claim(env, oracle, amount, proof)?;

    if config.payment_type == PaymentType::Custom && config.require_both {
        let secondary = config
            .secondary_oracle
            .as_ref()
            .ok_or(AgreementError::VerificationFailed)?;
        let secondary_proof = secondary_proof.ok_or(AgreementError::VerificationFailed)?;
        verify_claim(env, secondary, amount, secondary_proof)?;
    }

    match config.payment_type {
        PaymentType::PieceRate | PaymentType::Custom => {
            metrics.units_completed += amount;
        }
        PaymentType::TimeBased => {
            metrics.hours_worked += amount;
        }
        PaymentType::MilestoneBased => {
            return Err(AgreementError::MilestoneNotFound);
        }
    }
    Ok(())
}

/// Moves employer-confirmed manual work into the accrued metrics.
pub fn confirm_manual_work(
    config: &PaymentConfig,
    metrics: &mut WorkMetrics,
) -> Result<i128, AgreementError> {
    if metrics.pending_manual == 0 {
        return Err(AgreementError::NothingToConfirm);
    }
    let confirmed = metrics.pending_manual;
    metrics.pending_manual = 0;
    match config.payment_type {
        PaymentType::TimeBased => metrics.hours_worked += confirmed,
        _ => metrics.units_completed += confirmed,
    }
    Ok(confirmed)
}

/// Verifies and marks a milestone completed, dispatching on the milestone's
/// own oracle kind rather than the agreement-wide oracle.
pub fn complete_milestone(
    env: &Env,
    milestones: &mut Vec<Milestone>,
    index: u32,
    proof: BytesN<32>,
) -> Result<(), AgreementError> {
    let mut milestone = milestones
        .get(index)
        .ok_or(AgreementError::MilestoneNotFound)?;
    if milestone.completed {
        return Err(AgreementError::MilestoneAlreadyCompleted);
    }

    match milestone.oracle_kind {
        OracleKind::Manual => {
            // employer auth was checked by the caller for the manual path
        }
        _ => {
            let oracle = milestone
                .oracle
                .as_ref()
                .ok_or(AgreementError::VerificationFailed)?;
            verify_claim(env, oracle, milestone.amount, proof)?;
        }
    }

    milestone.completed = true;
    milestones.set(index, milestone);
    Ok(())
}

/// Pure function of the accumulated metrics and rate config.
///
/// Errors when the computed amount violates the configured bounds; the
/// milestone policy is exempt from bounds since milestone amounts were fixed
/// when the employer appended them.
pub fn calculate_payment_due(
    config: &PaymentConfig,
    metrics: &WorkMetrics,
    milestones: &Vec<Milestone>,
) -> Result<i128, AgreementError> {
    let due = match config.payment_type {
        PaymentType::PieceRate => (metrics.units_completed - metrics.units_paid) * config.base_rate,
        PaymentType::TimeBased => (metrics.hours_worked - metrics.hours_paid) * config.base_rate,
        PaymentType::MilestoneBased => unpaid_milestone_total(milestones),
        PaymentType::Custom => {
            (metrics.units_completed - metrics.units_paid) * config.base_rate
                + (metrics.hours_worked - metrics.hours_paid) * config.base_rate
        }
    };

    if config.payment_type != PaymentType::MilestoneBased && due > 0 {
        if due < config.min_payment {
            return Err(AgreementError::BelowMinimumPayment);
        }
        if due > config.max_payment {
            return Err(AgreementError::AboveMaximumPayment);
        }
    }
    Ok(due)
}

/// Consumes the recorded work backing `amount` and advances the payment
/// schedule.
///
/// The paid watermarks advance only by `amount / base_rate`, so work
/// recorded after the amount was calculated stays unconsumed and remains
/// payable in the next cycle. The custom policy drains its unit backlog
/// before hours. Milestones flip to paid in order while `amount` covers
/// them; a completed milestone the amount does not reach stays unpaid.
pub fn mark_paid(
    env: &Env,
    config: &mut PaymentConfig,
    metrics: &mut WorkMetrics,
    milestones: &mut Vec<Milestone>,
    amount: i128,
) -> Disbursement {
    match config.payment_type {
        PaymentType::PieceRate => {
            metrics.units_paid += amount / config.base_rate;
        }
        PaymentType::TimeBased => {
            metrics.hours_paid += amount / config.base_rate;
        }
        PaymentType::Custom => {
            let mut backing = amount / config.base_rate;
            let unpaid_units = metrics.units_completed - metrics.units_paid;
            let from_units = backing.min(unpaid_units);
            metrics.units_paid += from_units;
            backing -= from_units;
            metrics.hours_paid += backing;
        }
        PaymentType::MilestoneBased => {
            let mut remaining = amount;
            let mut updated = Vec::new(env);
            for mut milestone in milestones.iter() {
                if milestone.completed && !milestone.paid && milestone.amount <= remaining {
                    remaining -= milestone.amount;
                    milestone.paid = true;
                }
                updated.push_back(milestone);
            }
            *milestones = updated;
        }
    }

    config.next_payment_due += config.interval;
    config.total_paid += amount;

    Disbursement { amount }
}

fn unpaid_milestone_total(milestones: &Vec<Milestone>) -> i128 {
    let mut total = 0i128;
    for milestone in milestones.iter() {
        if milestone.completed && !milestone.paid {
            total += milestone.amount;
        }
    }
    total
}

/// Oracle round trip shared by every oracle-backed path: the proof must
/// verify, and when the oracle vouches for a quantity the claim may not
/// exceed it.
fn verify_claim(
    env: &Env,
    oracle: &Address,
    amount: i128,
    proof: BytesN<32>,
) -> Result<(), AgreementError> {
    let result = OracleClient::new(env, oracle).verify(&proof);
    if !result.verified {
        return Err(AgreementError::VerificationFailed);
    }
    if result.quantity > 0 && amount > result.quantity {
        return Err(AgreementError::VerificationFailed);
    }
    Ok(())
}
