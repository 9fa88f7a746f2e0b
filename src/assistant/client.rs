//! AssistantClient - builds requests from the live transcript and runs them
//!
//! Constructed once at startup and shared by reference. In-flight requests are
//! tracked per kind; starting a new request of a kind cancels the previous one
//! so a slow, superseded response can never reach the caller.

use dashmap::DashMap;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::context::MeetingContext;
use super::provider::{AnswerProvider, AnswerRequest, AssistError, AssistKind};
use crate::account::AccountFlags;
use crate::speech::{SpeechCapture, TranscriptEntry};

/// Text to send for a single-question request.
///
/// Manual text wins whenever it is non-empty after trimming; otherwise the
/// most recent final entry is used. Interim entries are never sent.
pub fn resolve_question(manual: Option<&str>, transcript: &[TranscriptEntry]) -> Option<TranscriptEntry> {
    if let Some(text) = manual.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(TranscriptEntry::manual(text));
    }
    transcript.iter().rev().find(|e| e.is_final()).cloned()
}

struct InFlight {
    request_id: u64,
    cancel_token: CancellationToken,
}

/// Unregisters a request when `send` finishes or its future is dropped
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<AssistKind, InFlight>,
    kind: AssistKind,
    request_id: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let request_id = self.request_id;
        self.in_flight.remove_if(&self.kind, |_, f| f.request_id == request_id);
    }
}

pub struct AssistantClient {
    provider: Arc<dyn AnswerProvider>,
    account: AccountFlags,
    in_flight: DashMap<AssistKind, InFlight>,
    next_request_id: AtomicU64,
}

impl AssistantClient {
    pub fn new(provider: Arc<dyn AnswerProvider>, account: AccountFlags) -> Self {
        Self {
            provider,
            account,
            in_flight: DashMap::new(),
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn account(&self) -> &AccountFlags {
        &self.account
    }

    /// Assemble the request for `kind` from the transcript and optional typed text
    pub fn build_request(
        &self,
        kind: AssistKind,
        context: &MeetingContext,
        manual: Option<&str>,
        transcript: &[TranscriptEntry],
    ) -> Result<AnswerRequest, AssistError> {
        let question = resolve_question(manual, transcript).ok_or(AssistError::NoQuestion)?;

        Ok(AnswerRequest {
            kind,
            context: context.clone(),
            transcript: vec![question],
        })
    }

    pub async fn request(
        &self,
        kind: AssistKind,
        context: &MeetingContext,
        manual: Option<&str>,
        transcript: &[TranscriptEntry],
    ) -> Result<String, AssistError> {
        self.check_access(kind)?;
        let request = self.build_request(kind, context, manual, transcript)?;
        self.send(request).await
    }

    /// Same as `request`, reading the transcript from a running capture
    pub async fn request_from_capture(
        &self,
        kind: AssistKind,
        context: &MeetingContext,
        manual: Option<&str>,
        capture: &SpeechCapture,
    ) -> Result<String, AssistError> {
        let transcript = capture.transcript();
        self.request(kind, context, manual, &transcript).await
    }

    /// Run a prepared request, superseding any in-flight one of the same kind
    pub async fn send(&self, request: AnswerRequest) -> Result<String, AssistError> {
        self.check_access(request.kind)?;

        let kind = request.kind;
        let (request_id, cancel_token) = self.register(kind);
        info!(
            "Requesting {} from {} (request {})",
            kind,
            self.provider.provider_name(),
            request_id
        );

        let guard = InFlightGuard {
            in_flight: &self.in_flight,
            kind,
            request_id,
        };
        let result = tokio::select! {
            _ = cancel_token.cancelled() => Err(AssistError::Cancelled),
            result = self.provider.generate(&request, cancel_token.clone()) => result,
        };
        drop(guard);

        if cancel_token.is_cancelled() {
            debug!("Dropping superseded {} response (request {})", kind, request_id);
            return Err(AssistError::Cancelled);
        }
        if let Err(e) = &result {
            warn!("{} request {} failed: {}", kind, request_id, e);
        }
        result
    }

    /// Cancel the in-flight request of `kind`. Returns false when none was running.
    pub fn cancel(&self, kind: AssistKind) -> bool {
        match self.in_flight.remove(&kind) {
            Some((_, f)) => {
                f.cancel_token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let kinds: Vec<AssistKind> = self.in_flight.iter().map(|e| *e.key()).collect();
        for kind in kinds {
            self.cancel(kind);
        }
    }

    pub fn is_pending(&self, kind: AssistKind) -> bool {
        self.in_flight.contains_key(&kind)
    }

    fn check_access(&self, kind: AssistKind) -> Result<(), AssistError> {
        if kind.requires_premium() && !self.account.is_premium() {
            return Err(AssistError::PremiumRequired);
        }
        Ok(())
    }

    fn register(&self, kind: AssistKind) -> (u64, CancellationToken) {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let cancel_token = CancellationToken::new();
        let previous = self.in_flight.insert(
            kind,
            InFlight {
                request_id,
                cancel_token: cancel_token.clone(),
            },
        );
        if let Some(previous) = previous {
            debug!("Request {} supersedes {}", request_id, previous.request_id);
            previous.cancel_token.cancel();
        }
        (request_id, cancel_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeProvider {
        delay: Duration,
        reply: Result<String, AssistError>,
        seen: Mutex<Vec<AnswerRequest>>,
    }

    impl FakeProvider {
        fn replying(reply: Result<String, AssistError>, delay: Duration) -> Arc<Self> {
            Arc::new(Self { delay, reply, seen: Mutex::new(Vec::new()) })
        }

        fn seen(&self) -> Vec<AnswerRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnswerProvider for FakeProvider {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn generate(
            &self,
            request: &AnswerRequest,
            cancel: CancellationToken,
        ) -> Result<String, AssistError> {
            self.seen.lock().unwrap().push(request.clone());
            tokio::select! {
                _ = cancel.cancelled() => Err(AssistError::Cancelled),
                _ = tokio::time::sleep(self.delay) => self.reply.clone(),
            }
        }
    }

    fn account(premium: bool) -> AccountFlags {
        let db = Arc::new(DatabaseManager::open_in_memory().unwrap());
        let flags = AccountFlags::load(db).unwrap();
        if premium {
            flags.sign_in("ada@example.com").unwrap();
            flags.upgrade_premium().unwrap();
        }
        flags
    }

    fn transcript() -> Vec<TranscriptEntry> {
        vec![
            TranscriptEntry::new_final("tell me about yourself", Some(0.9), Utc::now()),
            TranscriptEntry::new_final("what is your greatest strength", Some(0.8), Utc::now()),
            TranscriptEntry::new_interim("and your weak", Some(0.5), Utc::now()),
        ]
    }

    #[test]
    fn test_manual_text_wins_over_transcript() {
        let picked = resolve_question(Some("  typed question "), &transcript()).unwrap();
        assert_eq!(picked.text, "typed question");
        assert_eq!(picked.confidence, Some(1.0));
    }

    #[test]
    fn test_blank_manual_falls_back_to_latest_final() {
        let picked = resolve_question(Some("   "), &transcript()).unwrap();
        assert_eq!(picked.text, "what is your greatest strength");
    }

    #[test]
    fn test_interim_never_selected() {
        let only_interim = vec![TranscriptEntry::new_interim("half a", None, Utc::now())];
        assert!(resolve_question(None, &only_interim).is_none());
    }

    #[test]
    fn test_every_kind_sends_a_single_entry() {
        let client = AssistantClient::new(FakeProvider::replying(Ok(String::new()), Duration::ZERO), account(true));
        for kind in [AssistKind::Answer, AssistKind::CodeSample, AssistKind::Summary, AssistKind::Tips] {
            let request = client
                .build_request(kind, &MeetingContext::default(), None, &transcript())
                .unwrap();
            assert_eq!(request.transcript.len(), 1);
            assert_eq!(request.question(), Some("what is your greatest strength"));

            let typed = client
                .build_request(kind, &MeetingContext::default(), Some("typed"), &transcript())
                .unwrap();
            assert_eq!(typed.transcript.len(), 1);
            assert_eq!(typed.question(), Some("typed"));
        }
    }

    #[tokio::test]
    async fn test_answer_sends_single_entry() {
        let provider = FakeProvider::replying(Ok("I am persistent".to_string()), Duration::ZERO);
        let client = AssistantClient::new(provider.clone(), account(false));

        let reply = client
            .request(AssistKind::Answer, &MeetingContext::default(), None, &transcript())
            .await
            .unwrap();
        assert_eq!(reply, "I am persistent");

        let seen = provider.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].question(), Some("what is your greatest strength"));
        assert!(!client.is_pending(AssistKind::Answer));
    }

    #[tokio::test]
    async fn test_no_question_is_reported() {
        let provider = FakeProvider::replying(Ok("unused".to_string()), Duration::ZERO);
        let client = AssistantClient::new(provider.clone(), account(false));
        let err = client
            .request(AssistKind::Answer, &MeetingContext::default(), None, &[])
            .await
            .unwrap_err();
        assert_eq!(err, AssistError::NoQuestion);
        assert!(provider.seen().is_empty());
    }

    #[tokio::test]
    async fn test_premium_kinds_are_gated() {
        let provider = FakeProvider::replying(Ok("tips".to_string()), Duration::ZERO);
        let free = AssistantClient::new(provider.clone(), account(false));
        for kind in [AssistKind::CodeSample, AssistKind::Summary, AssistKind::Tips] {
            let err = free
                .request(kind, &MeetingContext::default(), Some("q"), &[])
                .await
                .unwrap_err();
            assert_eq!(err, AssistError::PremiumRequired);
        }
        assert!(provider.seen().is_empty());

        let premium = AssistantClient::new(provider, account(true));
        let reply = premium
            .request(AssistKind::Tips, &MeetingContext::default(), Some("q"), &[])
            .await
            .unwrap();
        assert_eq!(reply, "tips");
    }

    #[tokio::test]
    async fn test_provider_errors_propagate() {
        let provider = FakeProvider::replying(Err(AssistError::RateLimited), Duration::ZERO);
        let client = AssistantClient::new(provider, account(false));
        let err = client
            .request(AssistKind::Answer, &MeetingContext::default(), Some("q"), &[])
            .await
            .unwrap_err();
        assert_eq!(err, AssistError::RateLimited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_request_cancels_older_of_same_kind() {
        let provider = FakeProvider::replying(Ok("answer".to_string()), Duration::from_secs(5));
        let client = Arc::new(AssistantClient::new(provider, account(false)));

        let first = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .request(AssistKind::Answer, &MeetingContext::default(), Some("first"), &[])
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(client.is_pending(AssistKind::Answer));

        let second = client
            .request(AssistKind::Answer, &MeetingContext::default(), Some("second"), &[])
            .await;

        assert_eq!(first.await.unwrap(), Err(AssistError::Cancelled));
        assert_eq!(second, Ok("answer".to_string()));
        assert!(!client.is_pending(AssistKind::Answer));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_request_is_unregistered() {
        let provider = FakeProvider::replying(Ok("late".to_string()), Duration::from_secs(5));
        let client = AssistantClient::new(provider, account(false));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            client.request(AssistKind::Answer, &MeetingContext::default(), Some("q"), &[]),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(!client.is_pending(AssistKind::Answer));
        assert!(!client.cancel(AssistKind::Answer));
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_cancel() {
        let provider = FakeProvider::replying(Ok("late".to_string()), Duration::from_secs(5));
        let client = Arc::new(AssistantClient::new(provider, account(false)));

        let pending = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .request(AssistKind::Answer, &MeetingContext::default(), Some("q"), &[])
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(client.cancel(AssistKind::Answer));
        assert_eq!(pending.await.unwrap(), Err(AssistError::Cancelled));
        assert!(!client.cancel(AssistKind::Answer));
    }
}
