//! Request orchestration: validation, the anomaly guard, scoring and the ledger.

use chrono::{DateTime, Utc};
use risk_engine::{AnomalyGuard, GuardVerdict, RiskEngine, ScoringRequest};
use rust_decimal::Decimal;
use tracing::{info, warn};
use transfer_ledger::{
    amount_to_cents, AccountRepo, EntryRepo, HoldRequest, Party, TransferCommit, TransferLedger,
    UserRepo,
};
use transfer_models::{
    min_transfer_amount, Account, Decision, LedgerEntry, SecurityAlert, SecuritySettings,
    SecurityUpdate, SecurityUpdateReceipt, TransferReceipt, TransferRequest, UserProfile,
    VerifyRequest, VerifyResponse,
};

use crate::error::TransferError;
use crate::session::Caller;

const ALERT_MIN_SCORE: f64 = 50.0;
const ALERT_HIGH_SCORE: f64 = 70.0;
const ALERT_LIMIT: u32 = 5;

pub struct TransferService {
    ledger: TransferLedger,
    engine: RiskEngine,
    guard: AnomalyGuard,
}

fn required_fields(
    recipient_email: Option<&str>,
    amount: Option<Decimal>,
) -> Result<(String, Decimal), TransferError> {
    let email = recipient_email.map(str::trim).filter(|email| !email.is_empty());
    let (Some(email), Some(amount)) = (email, amount) else {
        return Err(TransferError::Validation(
            "Recipient email and amount are required".to_string(),
        ));
    };
    if amount < min_transfer_amount() {
        return Err(TransferError::Validation(
            "Minimum transfer amount is $0.01".to_string(),
        ));
    }
    amount_to_cents(amount)?;
    Ok((email.to_string(), amount))
}

impl TransferService {
    pub fn new(ledger: TransferLedger, engine: RiskEngine, guard: AnomalyGuard) -> Self {
        Self {
            ledger,
            engine,
            guard,
        }
    }

    async fn sender(&self, caller: &Caller) -> Result<(UserProfile, Account), TransferError> {
        let user = UserRepo::get_by_id(self.ledger.pool(), &caller.user_id)
            .await
            .map_err(|err| match err {
                err if err.is_not_found() => {
                    TransferError::NotFound("Sender not found".to_string())
                }
                err => err.into(),
            })?;
        let account = AccountRepo::primary_for_user(self.ledger.pool(), &user.id)
            .await?
            .ok_or_else(|| TransferError::NotFound("Sender account not found".to_string()))?;
        Ok((user, account))
    }

    async fn recipient(&self, email: &str) -> Result<(UserProfile, Account), TransferError> {
        let user = UserRepo::find_by_email(self.ledger.pool(), email)
            .await?
            .ok_or_else(|| TransferError::NotFound("Recipient not found".to_string()))?;
        let account = AccountRepo::primary_for_user(self.ledger.pool(), &user.id)
            .await?
            .ok_or_else(|| TransferError::NotFound("Recipient account not found".to_string()))?;
        Ok((user, account))
    }

    pub async fn transfer(
        &self,
        caller: &Caller,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, TransferError> {
        self.transfer_at(caller, request, Utc::now()).await
    }

    /// Runs one transfer through the full pipeline with an explicit clock.
    pub async fn transfer_at(
        &self,
        caller: &Caller,
        request: &TransferRequest,
        now: DateTime<Utc>,
    ) -> Result<TransferReceipt, TransferError> {
        let (recipient_email, amount) =
            required_fields(request.recipient_email.as_deref(), request.amount)?;

        let (sender, sender_account) = self.sender(caller).await?;
        if sender.email.eq_ignore_ascii_case(&recipient_email) {
            return Err(TransferError::Validation("Cannot transfer to yourself".to_string()));
        }
        if sender_account.balance < amount {
            return Err(TransferError::InsufficientFunds);
        }

        let (recipient, recipient_account) = self.recipient(&recipient_email).await?;
        if recipient.id == sender.id {
            return Err(TransferError::Validation("Cannot transfer to yourself".to_string()));
        }

        if recipient.receive_anomaly_protection {
            let history = self.ledger.receiving_history(&recipient.id, now).await?;
            if let GuardVerdict::Tripped { .. } =
                self.guard.check(&recipient.id, true, amount, &history)
            {
                return Err(TransferError::AnomalyBlocked);
            }
        }

        let scoring = ScoringRequest {
            sender_id: &sender.id,
            recipient_id: Some(&recipient.id),
            amount,
            claimed_country: caller.country.as_deref(),
            now,
        };
        let assessment = self
            .engine
            .assess(&scoring, || {
                self.ledger
                    .behavior_signals(&sender.id, caller.device_id.as_deref(), now)
            })
            .await?;
        let risk_score = assessment.final_score;

        match assessment.decision {
            Decision::Block => {
                warn!(
                    "transfer blocked: {} -> {} amount {amount} score {risk_score} reasons {:?}",
                    sender.id, recipient.id, assessment.reasons
                );
                Err(TransferError::RiskBlocked { risk_score })
            }
            Decision::Hold => {
                self.ledger
                    .record_hold(&HoldRequest {
                        sender_id: &sender.id,
                        recipient_name: &recipient.name,
                        amount,
                        risk_score,
                        description: request.description.as_deref(),
                        now,
                    })
                    .await?;
                Err(TransferError::PendingReview { risk_score })
            }
            Decision::Allow => {
                let done = self
                    .ledger
                    .commit_transfer(&TransferCommit {
                        sender: Party {
                            user_id: &sender.id,
                            account_id: &sender_account.id,
                            name: &sender.name,
                        },
                        recipient: Party {
                            user_id: &recipient.id,
                            account_id: &recipient_account.id,
                            name: &recipient.name,
                        },
                        amount,
                        risk_score,
                        description: request.description.as_deref(),
                        device_id: caller.device_id.as_deref(),
                        now,
                    })
                    .await?;
                Ok(TransferReceipt {
                    success: true,
                    new_balance: done.new_balance,
                    risk_score,
                })
            }
        }
    }

    /// Scores a prospective transfer without touching the ledger. The recipient is not
    /// resolved and the anomaly guard does not run.
    pub async fn verify(
        &self,
        caller: &Caller,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, TransferError> {
        let (_, amount) = required_fields(request.recipient_email.as_deref(), request.amount)?;
        let (sender, _) = self.sender(caller).await?;
        let now = Utc::now();

        let scoring = ScoringRequest {
            sender_id: &sender.id,
            recipient_id: None,
            amount,
            claimed_country: caller.country.as_deref(),
            now,
        };
        let assessment = self
            .engine
            .assess(&scoring, || {
                self.ledger
                    .behavior_signals(&sender.id, caller.device_id.as_deref(), now)
            })
            .await?;
        let (status, message) = self.engine.classify_preview(assessment.final_score);
        Ok(VerifyResponse {
            risk_score: assessment.final_score,
            status,
            message: message.to_string(),
        })
    }

    pub async fn security_settings(
        &self,
        caller: &Caller,
    ) -> Result<SecuritySettings, TransferError> {
        let user = UserRepo::get_by_id(self.ledger.pool(), &caller.user_id).await?;
        let flagged =
            EntryRepo::flagged_for_user(self.ledger.pool(), &user.id, ALERT_MIN_SCORE, ALERT_LIMIT)
                .await?;
        Ok(SecuritySettings {
            receive_anomaly_protection: user.receive_anomaly_protection,
            alerts: flagged.iter().map(alert_for).collect(),
        })
    }

    pub async fn update_security(
        &self,
        caller: &Caller,
        update: &SecurityUpdate,
    ) -> Result<SecurityUpdateReceipt, TransferError> {
        let enabled = update.receive_anomaly_protection.ok_or_else(|| {
            TransferError::Validation("receiveAnomalyProtection must be a boolean".to_string())
        })?;
        UserRepo::set_receive_protection(self.ledger.pool(), &caller.user_id, enabled).await?;
        info!("user {} set receive anomaly protection to {enabled}", caller.user_id);
        Ok(SecurityUpdateReceipt {
            success: true,
            receive_anomaly_protection: enabled,
        })
    }
}

/// Counterparty name out of "Transfer to {name}[ (under review)][: note]".
fn counterparty(description: &str) -> &str {
    let head = description.split(": ").next().unwrap_or(description);
    let head = head.strip_prefix("Transfer to ").unwrap_or(head);
    head.strip_suffix(" (under review)").unwrap_or(head)
}

fn alert_for(entry: &LedgerEntry) -> SecurityAlert {
    let score = entry.risk_score.unwrap_or_default();
    let high = score > ALERT_HIGH_SCORE;
    SecurityAlert {
        id: entry.id.clone(),
        title: if high {
            "High Risk Transaction Blocked"
        } else {
            "Unusual Transaction Flagged"
        }
        .to_string(),
        description: format!(
            "A transfer of ${} to {} was flagged with a risk score of {score}.",
            entry.amount,
            counterparty(&entry.description)
        ),
        severity: if high { "HIGH" } else { "MEDIUM" }.to_string(),
        time: entry.created_at,
    }
}
