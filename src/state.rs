//! Application state: the engine, the persistence collaborator, the optional
//! grader, and one session slot per user.
//!
//! Every engine call for a user happens while that user's slot is locked, so two
//! submissions can never race on the same `ChallengeState`. The slot is the
//! authoritative copy for the running process; the store is written after each
//! mutation and a failed write is reported but does not undo the mutation.
//!
//! Slots without a challenge are evicted when released, so ids that never start
//! a run leave nothing behind.

use std::{
    collections::HashMap,
    ops::{Deref, DerefMut},
    sync::{Arc, Mutex as SyncMutex, PoisonError},
};

use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::catalog::Catalog;
use crate::config::{load_app_config_from_env, AppConfig, Prompts, RulesCfg};
use crate::domain::{ChallengeState, ProblemTemplate, Submission, SubmitOutcome, Summary};
use crate::engine::{ChallengeEngine, Clock, EngineRules, SystemClock};
use crate::error::{ApiError, EngineError, GradingError};
use crate::grading::{Grader, PhotoPayload};
use crate::share::{compose, ShareMessage};
use crate::store::{validate_user, ChallengeStore};

/// Per-user cache of the challenge, filled from the store on first access.
#[derive(Default)]
pub struct Slot {
    loaded: bool,
    /// The store may still hold a run this slot has discarded.
    unsynced: bool,
    pub state: Option<ChallengeState>,
}

type Slots = SyncMutex<HashMap<String, Arc<Mutex<Slot>>>>;

fn lock_slots(slots: &Slots) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Mutex<Slot>>>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A user's slot, locked for the duration of one request.
pub struct Session<'a> {
    user: String,
    slots: &'a Slots,
    guard: OwnedMutexGuard<Slot>,
}

impl Deref for Session<'_> {
    type Target = Slot;

    fn deref(&self) -> &Slot {
        &self.guard
    }
}

impl DerefMut for Session<'_> {
    fn deref_mut(&mut self) -> &mut Slot {
        &mut self.guard
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.guard.state.is_some() || self.guard.unsynced {
            return;
        }
        let mut slots = lock_slots(self.slots);
        let mine = OwnedMutexGuard::mutex(&self.guard);
        // Two handles: the map and this guard. A queued request holds a third.
        let idle = slots
            .get(&self.user)
            .is_some_and(|s| Arc::ptr_eq(s, mine) && Arc::strong_count(s) == 2);
        if idle {
            slots.remove(&self.user);
            debug!(target: "mathe_backend", user = %self.user, "Empty session evicted");
        }
    }
}

/// What "today's problem" resolves to.
pub enum Today {
    Open { problem: ProblemTemplate, day: u32, total_days: u32 },
    Done { summary: Summary },
}

pub struct AppState {
    pub engine: ChallengeEngine,
    pub store: ChallengeStore,
    pub grader: Option<Grader>,
    pub prompts: Prompts,
    pub rules: RulesCfg,
    sessions: Slots,
    rng: Mutex<StdRng>,
}

impl AppState {
    /// Build state from env: load config, assemble the catalog, pick the store,
    /// init the grader.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let cfg = load_app_config_from_env().unwrap_or_default();

        let catalog = match Catalog::from_bank(&cfg.problems, cfg.include_builtin_problems) {
            Ok(c) => c,
            Err(e) => {
                warn!(target: "mathe_backend", error = %e, "Configured catalog unusable; using built-in problems");
                Catalog::builtin()
            }
        };

        let store = match std::env::var("STORE").as_deref() {
            Ok("memory") => ChallengeStore::memory(),
            _ => {
                let dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into());
                ChallengeStore::json_file(dir)
            }
        };

        let grader = Grader::from_env();
        if let Some(g) = &grader {
            info!(target: "mathe_backend", base_url = %g.base_url, vision_model = %g.vision_model, "Photo grading enabled.");
        } else {
            info!(target: "mathe_backend", ungraded_photos = cfg.rules.allow_ungraded_photos, "Photo grading disabled (no OPENAI_API_KEY).");
        }

        Self::new(cfg, Arc::new(catalog), Arc::new(SystemClock), store, grader, StdRng::from_entropy())
    }

    pub fn new(
        cfg: AppConfig,
        catalog: Arc<Catalog>,
        clock: Arc<dyn Clock>,
        store: ChallengeStore,
        grader: Option<Grader>,
        rng: StdRng,
    ) -> Self {
        let engine = ChallengeEngine::new(catalog, clock, EngineRules::from(&cfg.rules));
        info!(
            target: "mathe_backend",
            problems = engine.catalog().len(),
            store = store.kind(),
            min_days = engine.rules().min_days,
            max_days = engine.rules().max_days,
            medal_table = ?engine.rules().medal_table,
            "App state ready"
        );
        Self {
            engine,
            store,
            grader,
            prompts: cfg.prompts,
            rules: cfg.rules,
            sessions: SyncMutex::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    /// Lock the user's slot, loading it from the store the first time.
    async fn session(&self, user: &str) -> Result<Session<'_>, ApiError> {
        let user = validate_user(user)?;
        let slot = lock_slots(&self.sessions).entry(user.to_string()).or_default().clone();
        let mut session = Session {
            user: user.to_string(),
            slots: &self.sessions,
            guard: slot.lock_owned().await,
        };
        if !session.loaded {
            session.state = self.store.load(user).await?;
            session.loaded = true;
        }
        Ok(session)
    }

    /// Number of user slots currently held in memory.
    pub fn resident_sessions(&self) -> usize {
        lock_slots(&self.sessions).len()
    }

    /// Write-through; a failure is logged and reported as `false`.
    async fn persist(&self, user: &str, state: Option<&ChallengeState>) -> bool {
        let res = match state {
            Some(s) => self.store.save(user, s).await,
            None => self.store.clear(user).await,
        };
        match res {
            Ok(()) => true,
            Err(e) => {
                warn!(target: "mathe_backend", %user, error = %e, "Persisting challenge failed; keeping in-memory state");
                false
            }
        }
    }

    #[instrument(level = "info", skip(self))]
    pub async fn current(&self, user: &str) -> Result<Option<(ChallengeState, Summary)>, ApiError> {
        let slot = self.session(user).await?;
        Ok(slot.state.as_ref().map(|s| (s.clone(), self.engine.summarize(s))))
    }

    /// Start a new run, replacing any existing one.
    #[instrument(level = "info", skip(self))]
    pub async fn start(&self, user: &str, total_days: u32) -> Result<(Summary, bool), ApiError> {
        let mut slot = self.session(user).await?;
        let state = self.engine.start(total_days)?;
        let summary = self.engine.summarize(&state);
        slot.state = Some(state);
        let persisted = self.persist(user, slot.state.as_ref()).await;
        Ok((summary, persisted))
    }

    #[instrument(level = "info", skip(self))]
    pub async fn reset(&self, user: &str) -> Result<bool, ApiError> {
        let mut slot = self.session(user).await?;
        slot.state = self.engine.reset();
        let persisted = self.persist(user, None).await;
        slot.unsynced = !persisted;
        Ok(persisted)
    }

    /// Today's problem, drawing one if needed, or the summary when today is done.
    #[instrument(level = "info", skip(self))]
    pub async fn today(&self, user: &str) -> Result<(Today, bool), ApiError> {
        let mut slot = self.session(user).await?;
        let state = slot.state.as_mut().ok_or(ApiError::NoChallenge)?;
        if state.is_complete() || self.engine.is_already_done_today(state) {
            return Ok((Today::Done { summary: self.engine.summarize(state) }, true));
        }
        let before = state.problem_drawn_on;
        let problem = {
            let mut rng = self.rng.lock().await;
            self.engine.select_problem(state, &mut *rng)?
        };
        let (day, total_days) = (state.current_day, state.total_days);
        let persisted = if state.problem_drawn_on != before {
            self.persist(user, slot.state.as_ref()).await
        } else {
            true
        };
        Ok((Today::Open { problem, day, total_days }, persisted))
    }

    #[instrument(level = "info", skip(self, answer), fields(answer_len = answer.len()))]
    pub async fn submit_text(&self, user: &str, answer: &str) -> Result<(SubmitOutcome, Summary, bool), ApiError> {
        let mut slot = self.session(user).await?;
        let state = slot.state.as_mut().ok_or(ApiError::NoChallenge)?;
        let outcome = self.engine.submit_answer(state, Submission::Text(answer.to_string()))?;
        let summary = self.engine.summarize(state);
        let persisted = self.persist(user, slot.state.as_ref()).await;
        Ok((outcome, summary, persisted))
    }

    /// Grade a photographed solution. Grader failures award nothing and leave
    /// the day open for another attempt.
    #[instrument(level = "info", skip(self, image_base64, mime), fields(image_len = image_base64.len(), %mime))]
    pub async fn submit_photo(
        &self,
        user: &str,
        image_base64: &str,
        mime: &str,
    ) -> Result<(SubmitOutcome, Summary, bool), ApiError> {
        let mut slot = self.session(user).await?;
        let state = slot.state.as_mut().ok_or(ApiError::NoChallenge)?;

        // Same guards the engine applies, checked before spending a grading call.
        if state.is_complete() {
            return Err(EngineError::ChallengeComplete.into());
        }
        if self.engine.is_already_done_today(state) {
            return Err(EngineError::AlreadyDoneToday.into());
        }
        let problem = self.engine.active_problem(state)?;

        let photo = PhotoPayload::from_base64(image_base64, mime)?;
        let submission = match &self.grader {
            Some(grader) => {
                let verdict = grader.grade_photo(&self.prompts, &problem.question, &photo).await?;
                Submission::Graded {
                    is_correct: verdict.is_correct,
                    feedback: verdict.feedback,
                    correct_answer: verdict.correct_answer,
                }
            }
            None if self.rules.allow_ungraded_photos => Submission::UngradedPhoto,
            None => return Err(GradingError::Unavailable.into()),
        };

        let outcome = self.engine.submit_answer(state, submission)?;
        let summary = self.engine.summarize(state);
        let persisted = self.persist(user, slot.state.as_ref()).await;
        Ok((outcome, summary, persisted))
    }

    #[instrument(level = "info", skip(self))]
    pub async fn solution(&self, user: &str) -> Result<ProblemTemplate, ApiError> {
        let slot = self.session(user).await?;
        let state = slot.state.as_ref().ok_or(ApiError::NoChallenge)?;
        Ok(self.engine.reveal_solution(state)?)
    }

    #[instrument(level = "info", skip(self))]
    pub async fn summary(&self, user: &str) -> Result<Summary, ApiError> {
        let slot = self.session(user).await?;
        let state = slot.state.as_ref().ok_or(ApiError::NoChallenge)?;
        Ok(self.engine.summarize(state))
    }

    /// Share text for the problem currently shown to the user.
    #[instrument(level = "info", skip(self))]
    pub async fn share(&self, user: &str) -> Result<ShareMessage, ApiError> {
        let slot = self.session(user).await?;
        let state = slot.state.as_ref().ok_or(ApiError::NoChallenge)?;
        let problem = state.current_problem.as_ref().ok_or(EngineError::NoActiveProblem)?;
        // After today's submission the shown problem belongs to the previous day.
        let day = if self.engine.is_already_done_today(state) {
            state.completed_days()
        } else {
            state.current_day
        };
        Ok(compose(problem, day, state.total_days))
    }
}
