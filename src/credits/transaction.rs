//! Credit-guarded generation transaction.
//!
//! Gates one paid call to the generation service behind a debit of the
//! caller's balance, and reverses that debit on every failure path after it:
//! verify inputs, read balance, reject non-positive, debit, append an audit
//! entry, call the service, refund on service error / safety refusal / empty
//! result. The balance check and the debit are two separate store calls, so
//! two concurrent requests for the same user can both pass the check; that
//! race is accepted here rather than hidden behind a store-side conditional
//! decrement.
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::ledger::{EntryCategory, LedgerEntry, LedgerStore};
use crate::prompt::builder::restyle_prompt;

/// Mime-typed raw image bytes, as sent to and received from the service.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// What the generation service came back with on a successful transport.
#[derive(Debug, Clone)]
pub enum GenerationReply {
    Image(InlineImage),
    /// The model declined to produce content, with its stated reason.
    Refusal(String),
    /// Success status but no image payload could be extracted.
    Empty,
}

/// Remote image-to-image generation capability.
#[async_trait::async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, image: &InlineImage, prompt: &str) -> AppResult<GenerationReply>;
}

#[derive(Debug)]
pub struct GenerationSuccess {
    pub image: InlineImage,
    pub credits_remaining: i64,
}

/// Run one debit-gated generation attempt for `user_id`.
///
/// On success exactly one balance write (the debit) has happened; on any
/// failure after the debit the pre-debit balance has been written back.
/// Audit entries are appended best-effort on both paths and never abort the
/// attempt.
pub async fn attempt_generation<L, G>(
    ledger: &L,
    generator: &G,
    user_id: &str,
    image: &InlineImage,
    style_descriptor: &str,
) -> AppResult<GenerationSuccess>
where
    L: LedgerStore + ?Sized,
    G: GenerationService + ?Sized,
{
    if image.data.is_empty() {
        return Err(AppError::InvalidInput("image is required".to_string()));
    }
    if style_descriptor.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "style descriptor is required".to_string(),
        ));
    }

    let balance = ledger.get_balance(user_id).await?;
    if balance <= 0 {
        return Err(AppError::InsufficientCredits);
    }

    let new_balance = balance - 1;
    ledger.set_balance(user_id, new_balance).await?;

    let request_id = Uuid::new_v4();
    let debit = LedgerEntry {
        user_id: user_id.to_string(),
        delta: -1,
        balance_after: new_balance,
        description: format!("hairstyle generation {request_id}"),
        category: EntryCategory::Usage,
        created_at: chrono::Utc::now(),
    };
    if let Err(err) = ledger.append_entry(debit).await {
        tracing::warn!("failed to append debit entry for {user_id}: {err}");
    }

    let prompt = restyle_prompt(style_descriptor);
    let failure = match generator.generate(image, &prompt).await {
        Ok(GenerationReply::Image(image)) => {
            tracing::info!("generation succeeded for {user_id}, {new_balance} credits remaining");
            return Ok(GenerationSuccess {
                image,
                credits_remaining: new_balance,
            });
        }
        Ok(GenerationReply::Refusal(reason)) => AppError::SafetyRefusal(reason),
        Ok(GenerationReply::Empty) => AppError::EmptyResult,
        Err(err) => err,
    };

    refund(ledger, user_id, balance, request_id).await;
    Err(failure)
}

/// Write back the balance snapshot read before the debit. Restoring the
/// snapshot rather than incrementing the current value means a concurrent
/// top-up landing between read and refund is overwritten; see DESIGN.md.
/// Refund failures are logged, never retried, and never replace the
/// original failure handed back to the caller.
async fn refund<L>(ledger: &L, user_id: &str, pre_debit_balance: i64, request_id: Uuid)
where
    L: LedgerStore + ?Sized,
{
    match ledger.set_balance(user_id, pre_debit_balance).await {
        Ok(()) => {
            let entry = LedgerEntry {
                user_id: user_id.to_string(),
                delta: 1,
                balance_after: pre_debit_balance,
                description: format!("refund for generation {request_id}"),
                category: EntryCategory::Refund,
                created_at: chrono::Utc::now(),
            };
            if let Err(err) = ledger.append_entry(entry).await {
                tracing::warn!("failed to append refund entry for {user_id}: {err}");
            }
        }
        Err(err) => {
            tracing::error!("refund write failed for {user_id}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeLedger {
        balance: Mutex<i64>,
        balance_writes: Mutex<Vec<i64>>,
        entries: Mutex<Vec<LedgerEntry>>,
        fail_reads: bool,
        fail_writes: bool,
        fail_appends: bool,
    }

    impl FakeLedger {
        fn with_balance(balance: i64) -> Self {
            let ledger = FakeLedger::default();
            *ledger.balance.lock().unwrap() = balance;
            ledger
        }

        fn balance(&self) -> i64 {
            *self.balance.lock().unwrap()
        }

        fn writes(&self) -> Vec<i64> {
            self.balance_writes.lock().unwrap().clone()
        }

        fn entries(&self) -> Vec<LedgerEntry> {
            self.entries.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl LedgerStore for FakeLedger {
        async fn get_balance(&self, _user_id: &str) -> AppResult<i64> {
            if self.fail_reads {
                return Err(AppError::LedgerUnavailable("read refused".to_string()));
            }
            Ok(self.balance())
        }

        async fn set_balance(&self, _user_id: &str, credits: i64) -> AppResult<()> {
            if self.fail_writes {
                return Err(AppError::LedgerWriteFailed("write refused".to_string()));
            }
            *self.balance.lock().unwrap() = credits;
            self.balance_writes.lock().unwrap().push(credits);
            Ok(())
        }

        async fn append_entry(&self, entry: LedgerEntry) -> AppResult<()> {
            if self.fail_appends {
                return Err(AppError::LedgerWriteFailed("append refused".to_string()));
            }
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }
    }

    enum Script {
        Image,
        Refusal,
        Empty,
        TransportError,
    }

    struct FakeGenerator {
        script: Script,
    }

    #[async_trait::async_trait]
    impl GenerationService for FakeGenerator {
        async fn generate(&self, _image: &InlineImage, prompt: &str) -> AppResult<GenerationReply> {
            assert!(prompt.contains("buzz cut"));
            match self.script {
                Script::Image => Ok(GenerationReply::Image(InlineImage {
                    mime_type: "image/png".to_string(),
                    data: vec![1, 2, 3],
                })),
                Script::Refusal => Ok(GenerationReply::Refusal("SAFETY".to_string())),
                Script::Empty => Ok(GenerationReply::Empty),
                Script::TransportError => Err(AppError::GenerationServiceError(
                    "status 503".to_string(),
                )),
            }
        }
    }

    fn photo() -> InlineImage {
        InlineImage {
            mime_type: "image/jpeg".to_string(),
            data: vec![0xff, 0xd8, 0xff],
        }
    }

    async fn run(ledger: &FakeLedger, script: Script) -> AppResult<GenerationSuccess> {
        let generator = FakeGenerator { script };
        attempt_generation(ledger, &generator, "u1", &photo(), "buzz cut").await
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected_before_any_read() {
        let ledger = FakeLedger::with_balance(5);
        let generator = FakeGenerator { script: Script::Image };

        let no_image = InlineImage {
            mime_type: "image/jpeg".to_string(),
            data: Vec::new(),
        };
        let err = attempt_generation(&ledger, &generator, "u1", &no_image, "buzz cut")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = attempt_generation(&ledger, &generator, "u1", &photo(), "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(ledger.writes().is_empty());
    }

    #[tokio::test]
    async fn zero_balance_returns_insufficient_credits_with_zero_writes() {
        let ledger = FakeLedger::with_balance(0);
        let err = run(&ledger, Script::Image).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientCredits));
        assert!(ledger.writes().is_empty());
        assert!(ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn success_debits_exactly_once() {
        let ledger = FakeLedger::with_balance(1);
        let outcome = run(&ledger, Script::Image).await.unwrap();
        assert_eq!(outcome.credits_remaining, 0);
        assert_eq!(outcome.image.data, vec![1, 2, 3]);
        assert_eq!(ledger.writes(), vec![0]);

        let entries = ledger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].delta, -1);
        assert_eq!(entries[0].balance_after, 0);
        assert_eq!(entries[0].category, EntryCategory::Usage);
    }

    #[tokio::test]
    async fn safety_refusal_refunds_the_pre_debit_balance() {
        let ledger = FakeLedger::with_balance(3);
        let err = run(&ledger, Script::Refusal).await.unwrap_err();
        assert!(matches!(err, AppError::SafetyRefusal(_)));
        // debit to 2, then refund back to 3
        assert_eq!(ledger.writes(), vec![2, 3]);
        assert_eq!(ledger.balance(), 3);

        let entries = ledger.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].delta, -1);
        assert_eq!(entries[1].delta, 1);
        assert_eq!(entries[1].category, EntryCategory::Refund);
    }

    #[tokio::test]
    async fn empty_result_refunds() {
        let ledger = FakeLedger::with_balance(2);
        let err = run(&ledger, Script::Empty).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyResult));
        assert_eq!(ledger.writes(), vec![1, 2]);
        assert_eq!(ledger.balance(), 2);
    }

    #[tokio::test]
    async fn service_error_refunds_and_surfaces_the_original_failure() {
        let ledger = FakeLedger::with_balance(5);
        let err = run(&ledger, Script::TransportError).await.unwrap_err();
        assert!(matches!(err, AppError::GenerationServiceError(_)));
        assert_eq!(ledger.writes(), vec![4, 5]);
        assert_eq!(ledger.balance(), 5);
    }

    #[tokio::test]
    async fn ledger_read_failure_surfaces_without_writes() {
        let ledger = FakeLedger {
            fail_reads: true,
            ..FakeLedger::default()
        };
        let err = run(&ledger, Script::Image).await.unwrap_err();
        assert!(matches!(err, AppError::LedgerUnavailable(_)));
        assert!(ledger.writes().is_empty());
    }

    #[tokio::test]
    async fn debit_write_failure_aborts_without_refund() {
        let ledger = FakeLedger {
            fail_writes: true,
            ..FakeLedger::with_balance(3)
        };
        let err = run(&ledger, Script::Image).await.unwrap_err();
        assert!(matches!(err, AppError::LedgerWriteFailed(_)));
        assert_eq!(ledger.balance(), 3);
        assert!(ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn append_failure_does_not_abort_the_attempt() {
        let ledger = FakeLedger {
            fail_appends: true,
            ..FakeLedger::with_balance(2)
        };
        let outcome = run(&ledger, Script::Image).await.unwrap();
        assert_eq!(outcome.credits_remaining, 1);
        assert_eq!(ledger.writes(), vec![1]);
        assert!(ledger.entries().is_empty());
    }
}
