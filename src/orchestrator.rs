//! Orchestrator — serializes the capture → analyze → record → display pipeline.
//!
//! Hotkeys fire from the event loop at arbitrary times relative to an
//! in-flight network call. The phase mutex is the one piece of shared
//! mutable state: a trigger is accepted only when the machine is Idle,
//! checked-and-set under a single lock acquisition, so rapid key presses
//! can never start a second (billed) provider call. Rejected triggers are
//! dropped, not queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::capture::ScreenCapturer;
use crate::history::{AnswerRecord, HistoryStore};
use crate::logging::DiagnosticLog;
use crate::presenter::{Presenter, View};
use crate::provider::{AnalyzeError, Provider, QuizAnalyzer, QuizResult};

/// Pipeline state. Error and Displaying are transient; every path ends Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Capturing,
    Analyzing,
    Displaying,
    Error,
}

impl Phase {
    /// A cycle is running and new triggers will be dropped.
    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::Capturing | Phase::Analyzing)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SwitchError {
    #[error("provider {0} is not configured; run `snapquiz setup` first")]
    ProviderNotConfigured(Provider),
}

/// Builds an analyzer for a provider, or rejects the request when the
/// provider has no usable credentials. Injected so tests can swap it out.
pub type AnalyzerFactory =
    dyn Fn(Provider) -> Result<Arc<dyn QuizAnalyzer>, SwitchError> + Send + Sync;

struct ActiveAnalyzer {
    provider: Provider,
    client: Arc<dyn QuizAnalyzer>,
}

pub struct OrchestratorOptions {
    /// Accepted triggers within this window of the previous one are dropped.
    pub cooldown: Duration,
    pub answers_per_line: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(2),
            answers_per_line: 10,
        }
    }
}

pub struct Orchestrator {
    phase: Mutex<Phase>,
    seq: AtomicU64,
    last_trigger: Mutex<Option<Instant>>,
    cycle_started: Mutex<Option<Instant>>,
    capturer: Box<dyn ScreenCapturer>,
    active: Mutex<ActiveAnalyzer>,
    factory: Box<AnalyzerFactory>,
    history: HistoryStore,
    presenter: Arc<dyn Presenter>,
    diag: Option<DiagnosticLog>,
    last_result: Mutex<Option<QuizResult>>,
    opts: OrchestratorOptions,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capturer: Box<dyn ScreenCapturer>,
        provider: Provider,
        analyzer: Arc<dyn QuizAnalyzer>,
        factory: Box<AnalyzerFactory>,
        history: HistoryStore,
        presenter: Arc<dyn Presenter>,
        diag: Option<DiagnosticLog>,
        opts: OrchestratorOptions,
    ) -> Self {
        Self {
            phase: Mutex::new(Phase::Idle),
            seq: AtomicU64::new(0),
            last_trigger: Mutex::new(None),
            cycle_started: Mutex::new(None),
            capturer,
            active: Mutex::new(ActiveAnalyzer {
                provider,
                client: analyzer,
            }),
            factory,
            history,
            presenter,
            diag,
            last_result: Mutex::new(None),
            opts,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap()
    }

    pub fn active_provider(&self) -> Provider {
        self.active.lock().unwrap().provider
    }

    /// Start a capture cycle. Returns false when the trigger was dropped
    /// (cycle already running, or inside the cooldown window).
    pub fn trigger_capture(self: Arc<Self>) -> bool {
        let mut last = self.last_trigger.lock().unwrap();
        if let Some(prev) = *last {
            if prev.elapsed() < self.opts.cooldown {
                log::info!(
                    "Capture ignored (cooldown {:.1}s)",
                    self.opts.cooldown.as_secs_f64()
                );
                return false;
            }
        }

        {
            let mut phase = self.phase.lock().unwrap();
            if *phase != Phase::Idle {
                log::debug!("Capture ignored, a cycle is already running ({:?})", *phase);
                return false;
            }
            *phase = Phase::Capturing;
        }
        *last = Some(Instant::now());
        drop(last);
        *self.cycle_started.lock().unwrap() = Some(Instant::now());

        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!("Capture {seq} triggered ({})", self.capturer.name());

        let this = Arc::clone(&self);
        std::thread::Builder::new()
            .name("analysis".into())
            .spawn(move || this.run_cycle(seq))
            .expect("spawn analysis thread");
        true
    }

    fn run_cycle(self: Arc<Self>, seq: u64) {
        let png = match self.capturer.capture() {
            Ok(png) => png,
            Err(e) => {
                log::error!("Capture {seq} failed: {e:#}");
                self.set_phase(Phase::Error);
                self.presenter
                    .present(View::Error(format!("Screen capture failed: {e}")));
                self.end_cycle();
                return;
            }
        };

        let (provider, client) = {
            let active = self.active.lock().unwrap();
            (active.provider, Arc::clone(&active.client))
        };
        self.set_phase(Phase::Analyzing);

        match client.analyze(&png) {
            Ok(result) => {
                log::info!(
                    "Capture {seq}: {} questions answered by {provider}",
                    result.questions.len()
                );
                self.record_result(seq, provider, &result);
                *self.last_result.lock().unwrap() = Some(result.clone());
                self.set_phase(Phase::Displaying);
                self.presenter.present(View::Results(result.format_display()));
            }
            Err(AnalyzeError::NoQuestions) => {
                // Not a failure: the screen simply held no quiz.
                log::info!("Capture {seq}: no questions found in image");
                self.presenter.present(View::Status(
                    "No questions found in the image.\nTry capturing again.".into(),
                ));
            }
            Err(e) => {
                log::error!("Capture {seq}: analysis failed: {e}");
                self.set_phase(Phase::Error);
                self.presenter
                    .present(View::Error(format!("Analysis failed: {e}")));
            }
        }
        self.end_cycle();
    }

    fn record_result(&self, seq: u64, provider: Provider, result: &QuizResult) {
        for q in &result.questions {
            if q.answer.trim().is_empty() {
                log::warn!("Skipping question {} with no answer", q.number);
                continue;
            }
            let record = AnswerRecord {
                seq,
                timestamp: result.timestamp,
                number: Some(q.number.clone()),
                question: Some(q.question.clone()),
                answer: q.answer.clone(),
                provider: provider.to_string(),
            };
            // History is best effort: a write failure must not kill the cycle.
            if let Err(e) = self.history.append(&record) {
                log::warn!("Failed to write history record: {e:#}");
            }
        }
    }

    /// Toggle to the other provider. Rejected (previous provider stays
    /// active) when the target has no usable credentials. Independent of
    /// the capture phase: an in-flight cycle keeps the analyzer it cloned.
    pub fn switch_provider(&self) -> Result<Provider, SwitchError> {
        let target = self.active.lock().unwrap().provider.other();
        match (self.factory)(target) {
            Ok(client) => {
                let mut active = self.active.lock().unwrap();
                active.provider = target;
                active.client = client;
                log::info!("Active provider switched to {target}");
                self.presenter.present(View::Status(format!(
                    "Provider switched to {}",
                    target.as_str().to_uppercase()
                )));
                Ok(target)
            }
            Err(e) => {
                log::warn!("Provider switch rejected: {e}");
                self.presenter.present(View::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Present the last result (or a processing/empty status). Pure read.
    pub fn show_results(&self) -> Option<QuizResult> {
        let last = self.last_result.lock().unwrap().clone();
        if self.phase().is_busy() {
            let elapsed = self
                .cycle_started
                .lock()
                .unwrap()
                .map(|t| t.elapsed().as_secs_f64())
                .unwrap_or(0.0);
            self.presenter.present(View::Status(format!(
                "Processing... ({elapsed:.1}s)\nPlease wait"
            )));
            return last;
        }
        match &last {
            Some(result) => self
                .presenter
                .present(View::Results(result.format_display())),
            None => self.presenter.present(View::Status(
                "No data yet.\nPress the capture hotkey first.".into(),
            )),
        }
        last
    }

    /// Present the full answer history. Pure read. Returns the record count.
    pub fn show_history(&self) -> usize {
        let count = self.history.len();
        if count == 0 {
            self.presenter.present(View::Status(
                "No answers saved yet.\nPress the capture hotkey first.".into(),
            ));
        } else {
            self.presenter.present(View::History(
                self.history.format_lines(self.opts.answers_per_line),
            ));
            log::info!("Showed {count} answers");
        }
        count
    }

    /// Drop all stored answers, in memory and on disk. Irreversible.
    pub fn reset_history(&self) -> usize {
        match self.history.clear() {
            Ok(count) => {
                log::info!("Reset {count} answers");
                self.presenter
                    .present(View::Status(format!("Cleared {count} answers")));
                count
            }
            Err(e) => {
                log::error!("Failed to reset history: {e:#}");
                self.presenter
                    .present(View::Error(format!("Failed to reset history: {e}")));
                0
            }
        }
    }

    /// Reset history and truncate the diagnostic log.
    pub fn clear_all(&self) {
        let count = match self.history.clear() {
            Ok(count) => count,
            Err(e) => {
                log::error!("Failed to clear history: {e:#}");
                0
            }
        };
        if let Some(diag) = &self.diag {
            match diag.clear() {
                Ok(()) => log::info!("Diagnostic log cleared"),
                Err(e) => log::error!("Failed to clear diagnostic log: {e}"),
            }
        }
        self.presenter.present(View::Status(format!(
            "Cleared {count} answers and the diagnostic log"
        )));
    }

    fn set_phase(&self, next: Phase) {
        let mut phase = self.phase.lock().unwrap();
        log::debug!("Phase {:?} -> {next:?}", *phase);
        *phase = next;
    }

    fn end_cycle(&self) {
        self.set_phase(Phase::Idle);
        *self.cycle_started.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::QuizQuestion;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    struct StaticCapturer;

    impl ScreenCapturer for StaticCapturer {
        fn capture(&self) -> anyhow::Result<Vec<u8>> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
        fn name(&self) -> &str {
            "static"
        }
    }

    struct FailingCapturer;

    impl ScreenCapturer for FailingCapturer {
        fn capture(&self) -> anyhow::Result<Vec<u8>> {
            anyhow::bail!("no screen available")
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    enum MockBehavior {
        Answer(&'static str),
        Fail(&'static str),
        NoQuestions,
        /// Signals on the first channel once analysis starts, then waits
        /// for the second before answering. Single use.
        Block(Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>),
    }

    struct MockAnalyzer {
        calls: AtomicUsize,
        behavior: MockBehavior,
    }

    impl MockAnalyzer {
        fn new(behavior: MockBehavior) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                behavior,
            })
        }
    }

    fn result_with(answer: &str) -> QuizResult {
        QuizResult {
            questions: vec![QuizQuestion {
                number: "1".into(),
                question: "mock question".into(),
                answer: answer.into(),
            }],
            total_questions: 1,
            timestamp: Utc::now(),
        }
    }

    impl QuizAnalyzer for MockAnalyzer {
        fn analyze(&self, _png: &[u8]) -> Result<QuizResult, AnalyzeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                MockBehavior::Answer(a) => Ok(result_with(a)),
                MockBehavior::Fail(msg) => Err(AnalyzeError::Api(msg.to_string())),
                MockBehavior::NoQuestions => Err(AnalyzeError::NoQuestions),
                MockBehavior::Block(channels) => {
                    let (started, release) = channels
                        .lock()
                        .unwrap()
                        .take()
                        .expect("blocking analyzer is single use");
                    started.send(()).unwrap();
                    release.recv().unwrap();
                    Ok(result_with("A"))
                }
            }
        }
        fn test_connection(&self) -> anyhow::Result<()> {
            Ok(())
        }
        fn name(&self) -> &str {
            "mock"
        }
    }

    struct RecordingPresenter {
        views: Mutex<Vec<View>>,
    }

    impl Presenter for RecordingPresenter {
        fn present(&self, view: View) {
            self.views.lock().unwrap().push(view);
        }
    }

    struct Fixture {
        orch: Arc<Orchestrator>,
        analyzer: Arc<MockAnalyzer>,
        presenter: Arc<RecordingPresenter>,
        _dir: tempfile::TempDir,
    }

    fn rejecting_factory() -> Box<AnalyzerFactory> {
        Box::new(|p| Err(SwitchError::ProviderNotConfigured(p)))
    }

    fn build(
        capturer: Box<dyn ScreenCapturer>,
        behavior: MockBehavior,
        factory: Box<AnalyzerFactory>,
        cooldown: Duration,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = MockAnalyzer::new(behavior);
        let presenter = Arc::new(RecordingPresenter {
            views: Mutex::new(Vec::new()),
        });
        let orch = Arc::new(Orchestrator::new(
            capturer,
            Provider::Gemini,
            analyzer.clone() as Arc<dyn QuizAnalyzer>,
            factory,
            HistoryStore::open(dir.path().join("answers.log")),
            presenter.clone() as Arc<dyn Presenter>,
            None,
            OrchestratorOptions {
                cooldown,
                answers_per_line: 10,
            },
        ));
        Fixture {
            orch,
            analyzer,
            presenter,
            _dir: dir,
        }
    }

    fn fixture(behavior: MockBehavior) -> Fixture {
        build(
            Box::new(StaticCapturer),
            behavior,
            rejecting_factory(),
            Duration::ZERO,
        )
    }

    fn wait_for_idle(orch: &Orchestrator) {
        for _ in 0..400 {
            if orch.phase() == Phase::Idle {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("orchestrator did not return to Idle");
    }

    fn views(f: &Fixture) -> Vec<View> {
        f.presenter.views.lock().unwrap().clone()
    }

    #[test]
    fn rapid_triggers_run_at_most_one_cycle() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let f = fixture(MockBehavior::Block(Mutex::new(Some((
            started_tx, release_rx,
        )))));

        assert!(f.orch.clone().trigger_capture());
        started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("analysis should start");

        // The analyzer is blocked mid-call: every further trigger is a no-op.
        assert!(!f.orch.clone().trigger_capture());
        assert!(!f.orch.clone().trigger_capture());
        assert!(f.orch.phase().is_busy());

        release_tx.send(()).unwrap();
        wait_for_idle(&f.orch);
        assert_eq!(f.analyzer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.orch.history.len(), 1);
    }

    #[test]
    fn cooldown_drops_triggers_even_when_idle() {
        let f = build(
            Box::new(StaticCapturer),
            MockBehavior::Answer("A"),
            rejecting_factory(),
            Duration::from_secs(60),
        );
        assert!(f.orch.clone().trigger_capture());
        wait_for_idle(&f.orch);
        assert!(!f.orch.clone().trigger_capture());
        assert_eq!(f.analyzer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn switch_to_unconfigured_provider_is_rejected() {
        let f = fixture(MockBehavior::Answer("A"));
        assert_eq!(f.orch.active_provider(), Provider::Gemini);

        let err = f.orch.switch_provider().unwrap_err();
        assert!(matches!(
            err,
            SwitchError::ProviderNotConfigured(Provider::Bedrock)
        ));
        // Previous provider stays in effect.
        assert_eq!(f.orch.active_provider(), Provider::Gemini);
        assert!(views(&f).iter().any(|v| matches!(v, View::Error(_))));
    }

    #[test]
    fn switch_toggles_when_target_is_configured() {
        let factory: Box<AnalyzerFactory> =
            Box::new(|_| Ok(MockAnalyzer::new(MockBehavior::Answer("C")) as Arc<dyn QuizAnalyzer>));
        let f = build(
            Box::new(StaticCapturer),
            MockBehavior::Answer("A"),
            factory,
            Duration::ZERO,
        );
        assert_eq!(f.orch.switch_provider().unwrap(), Provider::Bedrock);
        assert_eq!(f.orch.active_provider(), Provider::Bedrock);
        assert_eq!(f.orch.switch_provider().unwrap(), Provider::Gemini);
    }

    #[test]
    fn successful_capture_records_answer_and_shows_it() {
        let f = fixture(MockBehavior::Answer("B"));
        assert!(f.orch.clone().trigger_capture());
        wait_for_idle(&f.orch);

        let records = f.orch.history.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].answer, "B");
        assert_eq!(records[0].provider, "gemini");
        assert_eq!(records[0].seq, 1);

        let shown = f.orch.show_results().expect("a result should be stored");
        assert_eq!(shown.questions[0].answer, "B");
        assert!(views(&f).iter().any(|v| matches!(v, View::Results(_))));
    }

    #[test]
    fn analysis_failure_returns_to_idle_without_record() {
        let f = fixture(MockBehavior::Fail("timed out waiting for response"));
        assert!(f.orch.clone().trigger_capture());
        wait_for_idle(&f.orch);

        assert!(f.orch.history.is_empty());
        assert!(f.orch.last_result.lock().unwrap().is_none());
        assert!(views(&f).iter().any(|v| matches!(v, View::Error(_))));

        // No retry happened, and a fresh trigger is accepted again.
        assert_eq!(f.analyzer.calls.load(Ordering::SeqCst), 1);
        assert!(f.orch.clone().trigger_capture());
        wait_for_idle(&f.orch);
        assert_eq!(f.analyzer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn no_questions_is_informational_not_an_error() {
        let f = fixture(MockBehavior::NoQuestions);
        assert!(f.orch.clone().trigger_capture());
        wait_for_idle(&f.orch);

        assert!(f.orch.history.is_empty());
        let shown = views(&f);
        assert!(shown
            .iter()
            .any(|v| matches!(v, View::Status(s) if s.contains("No questions"))));
        assert!(!shown.iter().any(|v| matches!(v, View::Error(_))));
    }

    #[test]
    fn capture_failure_surfaces_error_and_recovers() {
        let f = build(
            Box::new(FailingCapturer),
            MockBehavior::Answer("A"),
            rejecting_factory(),
            Duration::ZERO,
        );
        assert!(f.orch.clone().trigger_capture());
        wait_for_idle(&f.orch);

        assert_eq!(f.analyzer.calls.load(Ordering::SeqCst), 0);
        assert!(f.orch.history.is_empty());
        assert!(views(&f)
            .iter()
            .any(|v| matches!(v, View::Error(s) if s.contains("capture failed"))));
    }

    #[test]
    fn show_results_with_no_data_reports_status() {
        let f = fixture(MockBehavior::Answer("A"));
        assert!(f.orch.show_results().is_none());
        assert!(views(&f)
            .iter()
            .any(|v| matches!(v, View::Status(s) if s.contains("No data"))));
    }

    #[test]
    fn show_history_lists_recorded_answers() {
        let f = fixture(MockBehavior::Answer("D"));
        assert_eq!(f.orch.show_history(), 0);
        assert!(f.orch.clone().trigger_capture());
        wait_for_idle(&f.orch);
        assert_eq!(f.orch.show_history(), 1);
        assert!(views(&f)
            .iter()
            .any(|v| matches!(v, View::History(s) if s.contains("1D"))));
    }

    #[test]
    fn reset_history_drops_all_records() {
        let f = fixture(MockBehavior::Answer("A"));
        assert!(f.orch.clone().trigger_capture());
        wait_for_idle(&f.orch);
        assert_eq!(f.orch.reset_history(), 1);
        assert!(f.orch.history.is_empty());
    }

    #[test]
    fn sequence_ids_increase_across_cycles() {
        let f = fixture(MockBehavior::Answer("A"));
        for _ in 0..3 {
            assert!(f.orch.clone().trigger_capture());
            wait_for_idle(&f.orch);
        }
        let seqs: Vec<u64> = f.orch.history.records().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }
}
