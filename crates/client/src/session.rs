//! Event loop around [`ViewState`].
//!
//! A `Session` owns the only copy of the view state. User intents are applied
//! synchronously; store requests and timers run as spawned tasks that report
//! back through one channel, and those reports are applied one at a time in
//! arrival order. Nothing below the session mutates shared state.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use stockroom_core::{IntentId, ItemId, NoticeId};
use stockroom_inventory::{CanonicalItem, Dashboard, ItemDraft, ListQuery};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::fetch::fetch_items;
use crate::store::ItemStore;
use crate::timer::{TimerKey, Timers};
use crate::types::{DeleteMode, SaveMode};
use crate::view::{DeletePhase, Effect, Event, IntentError, ViewState};

pub struct Session<S: ItemStore + 'static> {
    state: ViewState,
    store: Arc<S>,
    config: ClientConfig,
    timers: Timers,
    tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
    /// Store requests whose completion event has not been applied yet.
    in_flight: usize,
}

impl<S: ItemStore + 'static> Session<S> {
    pub fn new(store: Arc<S>, config: ClientConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: ViewState::new(),
            store,
            config,
            timers: Timers::new(),
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// No request in flight and no timer armed.
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.timers.is_empty()
    }

    /// Displayed list: filtered by the current query, duplicates merged.
    pub fn grouped(&self) -> Vec<CanonicalItem> {
        self.state.grouped(self.config.dashboard.price_policy)
    }

    pub fn dashboard(&self) -> Dashboard {
        self.state.dashboard(Utc::now(), &self.config.dashboard)
    }

    pub fn refresh(&mut self) -> Result<(), IntentError> {
        self.dispatch(Event::RefreshRequested)
    }

    /// Delete `id`.
    ///
    /// `Single` hides the record at once and returns the intent id; the store
    /// is only contacted when the grace period ends without an undo. `Group`
    /// deletes every record in the same name/category group right away.
    pub fn delete(&mut self, id: &ItemId, mode: DeleteMode) -> Result<Option<IntentId>, IntentError> {
        match mode {
            DeleteMode::Single => {
                let intent = IntentId::new();
                self.dispatch(Event::DeleteRequested {
                    id: id.clone(),
                    intent,
                    commit_at: Instant::now() + self.config.undo_grace,
                })?;
                tracing::info!(item_id = %id, %intent, grace_ms = self.config.undo_grace.as_millis() as u64, "delete armed");
                Ok(Some(intent))
            }
            DeleteMode::Group => {
                self.dispatch(Event::GroupDeleteRequested { id: id.clone() })?;
                Ok(None)
            }
        }
    }

    /// Restore the most recently deleted item if its grace period is still running.
    pub fn undo(&mut self) -> Result<(), IntentError> {
        let result = self.dispatch(Event::UndoRequested);
        match &result {
            Ok(()) => tracing::info!("delete undone"),
            Err(err) => tracing::info!(error = %err, "undo rejected"),
        }
        result
    }

    pub fn edit(&mut self, id: &ItemId) -> Result<(), IntentError> {
        self.dispatch(Event::EditRequested { id: id.clone() })
    }

    pub fn update_draft(&mut self, draft: ItemDraft) -> Result<(), IntentError> {
        self.dispatch(Event::DraftChanged(draft))
    }

    pub fn cancel_edit(&mut self) -> Result<(), IntentError> {
        self.dispatch(Event::EditCancelled)
    }

    pub fn submit(&mut self) -> Result<(), IntentError> {
        self.dispatch(Event::SubmitRequested)
    }

    pub fn set_query(&mut self, query: ListQuery) -> Result<(), IntentError> {
        self.dispatch(Event::QueryChanged(query))
    }

    /// Wait for the next timer or store report and apply it.
    ///
    /// Returns `false` without waiting when the session is idle.
    pub async fn next_event(&mut self) -> bool {
        if self.is_idle() {
            return false;
        }
        match self.rx.recv().await {
            Some(event) => {
                self.receive(event);
                true
            }
            None => false,
        }
    }

    /// Apply reports that have already arrived, without waiting.
    pub fn drain_ready(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.receive(event);
            applied += 1;
        }
        applied
    }

    /// Process events until every store request has completed (timers may remain armed).
    pub async fn wait_for_requests(&mut self) {
        while self.in_flight > 0 {
            if !self.next_event().await {
                break;
            }
        }
    }

    /// Process events until nothing is in flight and no timer is armed.
    pub async fn settle(&mut self) {
        while self.next_event().await {}
    }

    /// Commit every delete still in its grace period now, then wait for the store.
    pub async fn flush_pending(&mut self) {
        let armed: Vec<IntentId> = self
            .state
            .pending()
            .iter()
            .filter(|p| p.phase == DeletePhase::Armed)
            .map(|p| p.intent)
            .collect();

        for intent in armed {
            self.timers.cancel(TimerKey::Grace(intent));
            self.receive(Event::GraceExpired { intent });
        }
        self.wait_for_requests().await;
    }

    fn receive(&mut self, event: Event) {
        if let Some(key) = TimerKey::of(&event) {
            self.timers.fired(key);
        }
        if event.is_store_completion() {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        if let Err(err) = self.dispatch(event) {
            tracing::warn!(error = %err, "event rejected");
        }
    }

    fn dispatch(&mut self, event: Event) -> Result<(), IntentError> {
        let transition = self.state.reduce(event)?;
        self.state = transition.state;
        for effect in transition.effects {
            self.run(effect);
        }
        Ok(())
    }

    fn run(&mut self, effect: Effect) {
        match effect {
            Effect::Fetch => self.spawn_request(|store| async move {
                Event::FetchCompleted(fetch_items(store.as_ref()).await)
            }),

            Effect::ArmGraceTimer { intent, commit_at } => self.timers.arm(
                TimerKey::Grace(intent),
                commit_at,
                Event::GraceExpired { intent },
                self.tx.clone(),
            ),

            Effect::CancelGraceTimer { intent } => self.timers.cancel(TimerKey::Grace(intent)),

            Effect::CommitDelete { intent, id } => self.spawn_request(move |store| async move {
                match store.delete(&id).await {
                    Ok(()) => {
                        tracing::info!(item_id = %id, %intent, "delete committed");
                        Event::DeleteCommitted { intent }
                    }
                    Err(err) => {
                        tracing::warn!(item_id = %id, %intent, error = %err, "delete commit failed, re-fetching");
                        Event::DeleteFailed {
                            intent,
                            error: err.to_string(),
                        }
                    }
                }
            }),

            Effect::DeleteGroup { name, ids } => self.spawn_request(move |store| async move {
                tracing::info!(name = %name, count = ids.len(), "deleting item group");

                let mut batch = JoinSet::new();
                for id in ids {
                    let store = store.clone();
                    batch.spawn(async move { store.delete(&id).await.map_err(|err| (id, err)) });
                }

                let mut failures = 0;
                while let Some(joined) = batch.join_next().await {
                    match joined {
                        Ok(Ok(())) => {}
                        Ok(Err((id, err))) => {
                            tracing::error!(item_id = %id, error = %err, "group delete failed");
                            failures += 1;
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "group delete task aborted");
                            failures += 1;
                        }
                    }
                }

                Event::GroupDeleteFinished {
                    name,
                    failures,
                    notice: NoticeId::new(),
                }
            }),

            Effect::Create(payload) => self.spawn_request(move |store| async move {
                match store.create(&payload).await {
                    Ok(item) => {
                        tracing::info!(item_id = %item.id, name = %item.name, "item created");
                        Event::SaveSucceeded {
                            mode: SaveMode::Created,
                            notice: NoticeId::new(),
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "failed to create item");
                        Event::SaveFailed {
                            error: err.to_string(),
                            notice: NoticeId::new(),
                        }
                    }
                }
            }),

            Effect::Update { id, payload } => self.spawn_request(move |store| async move {
                match store.update(&id, &payload).await {
                    Ok(_) => {
                        tracing::info!(item_id = %id, "item updated");
                        Event::SaveSucceeded {
                            mode: SaveMode::Updated,
                            notice: NoticeId::new(),
                        }
                    }
                    Err(err) => {
                        tracing::error!(item_id = %id, error = %err, "failed to update item");
                        Event::SaveFailed {
                            error: err.to_string(),
                            notice: NoticeId::new(),
                        }
                    }
                }
            }),

            Effect::ArmNoticeTimer { notice } => self.timers.arm(
                TimerKey::Notice(notice),
                Instant::now() + self.config.notice_ttl,
                Event::NoticeExpired { notice },
                self.tx.clone(),
            ),
        }
    }

    fn spawn_request<F, Fut>(&mut self, request: F)
    where
        F: FnOnce(Arc<S>) -> Fut,
        Fut: Future<Output = Event> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.tx.clone();
        let pending = request(self.store.clone());
        tokio::spawn(async move {
            let _ = tx.send(pending.await);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use stockroom_inventory::RawItem;

    use crate::memory::MemoryStore;
    use crate::types::{ConnectivityState, NoticeLevel};

    fn stock() -> Vec<RawItem> {
        vec![
            RawItem::new("a", "Pen").with_category("Office").with_quantity(3.0),
            RawItem::new("b", "Mug").with_category("Home").with_quantity(9.0),
            RawItem::new("c", " pen").with_category("office").with_quantity(1.0),
        ]
    }

    async fn loaded(store: &Arc<MemoryStore>) -> Session<MemoryStore> {
        let mut session = Session::new(store.clone(), ClientConfig::default());
        session.refresh().unwrap();
        session.wait_for_requests().await;
        session
    }

    fn ids(session: &Session<MemoryStore>) -> Vec<String> {
        session
            .state()
            .items()
            .iter()
            .map(|i| i.id.to_string())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn undo_before_expiry_prevents_remote_delete() {
        let store = Arc::new(MemoryStore::with_items(stock()));
        let mut session = loaded(&store).await;

        session.delete(&ItemId::new("b"), DeleteMode::Single).unwrap();
        assert_eq!(ids(&session), vec!["a", "c"]);

        tokio::time::sleep(Duration::from_millis(4000)).await;
        session.drain_ready();
        session.undo().unwrap();
        assert_eq!(ids(&session), vec!["b", "a", "c"]);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        session.drain_ready();

        assert!(store.delete_calls().is_empty());
        assert!(session.state().pending().is_empty());
        assert!(session.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_without_undo_issues_exactly_one_delete() {
        let store = Arc::new(MemoryStore::with_items(stock()));
        let mut session = loaded(&store).await;

        let started = Instant::now();
        session.delete(&ItemId::new("b"), DeleteMode::Single).unwrap();
        session.settle().await;

        assert!(started.elapsed() >= Duration::from_millis(5000));
        assert_eq!(store.delete_calls(), vec![ItemId::new("b")]);
        assert!(session.state().pending().is_empty());
        assert_eq!(ids(&session), vec!["a", "c"]);
        assert_eq!(store.items().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn late_undo_is_rejected_once_commit_starts() {
        let store = Arc::new(MemoryStore::with_items(stock()));
        let mut session = loaded(&store).await;

        session.delete(&ItemId::new("a"), DeleteMode::Single).unwrap();
        // Only the grace timer is pending, so this waits for its expiry.
        assert!(session.next_event().await);

        assert_eq!(
            session.undo(),
            Err(IntentError::AlreadyCommitting(ItemId::new("a")))
        );

        session.settle().await;
        assert_eq!(session.undo(), Err(IntentError::NothingToUndo));
        assert_eq!(store.delete_calls(), vec![ItemId::new("a")]);
        assert!(!ids(&session).contains(&"a".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_commit_restores_authoritative_list() {
        let store = Arc::new(MemoryStore::with_items(stock()));
        store.fail_deletes(true);
        let mut session = loaded(&store).await;

        session.delete(&ItemId::new("b"), DeleteMode::Single).unwrap();
        session.settle().await;

        assert_eq!(store.delete_calls(), vec![ItemId::new("b")]);
        assert_eq!(ids(&session), vec!["a", "b", "c"]);
        assert!(session.state().pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn group_delete_removes_all_duplicates_without_undo() {
        let store = Arc::new(MemoryStore::with_items(stock()));
        let mut session = loaded(&store).await;

        assert_eq!(session.delete(&ItemId::new("a"), DeleteMode::Group), Ok(None));
        assert_eq!(session.undo(), Err(IntentError::NothingToUndo));
        session.wait_for_requests().await;

        let mut deleted = store.delete_calls();
        deleted.sort();
        assert_eq!(deleted, vec![ItemId::new("a"), ItemId::new("c")]);
        assert_eq!(ids(&session), vec!["b"]);
        assert_eq!(session.state().notices()[0].message, "Deleted all \"Pen\" items.");

        session.settle().await;
        assert!(session.state().notices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn submit_creates_item_and_refetches() {
        let store = Arc::new(MemoryStore::with_items(stock()));
        let mut session = loaded(&store).await;

        session
            .update_draft(ItemDraft {
                name: "Notebook".into(),
                quantity: "2".into(),
                price: "4.5".into(),
                category: "Stationery".into(),
                tags: "paper; a5".into(),
                restock_by: String::new(),
            })
            .unwrap();
        session.submit().unwrap();
        session.wait_for_requests().await;

        let created = store.items().into_iter().find(|i| i.name == "Notebook").unwrap();
        assert_eq!(created.tags, vec!["paper", "a5"]);
        assert_eq!(session.state().items().len(), 4);
        assert_eq!(session.state().draft(), &ItemDraft::default());
        assert_eq!(session.state().notices()[0].message, "Item added successfully!");

        tokio::time::sleep(Duration::from_millis(3000)).await;
        session.drain_ready();
        assert!(session.state().notices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn edit_submits_update_for_the_edited_record() {
        let store = Arc::new(MemoryStore::with_items(stock()));
        let mut session = loaded(&store).await;

        session.edit(&ItemId::new("b")).unwrap();
        let mut draft = session.state().draft().clone();
        draft.quantity = "12".into();
        session.update_draft(draft).unwrap();
        session.submit().unwrap();
        session.wait_for_requests().await;

        let mug = store.items().into_iter().find(|i| i.id.as_str() == "b").unwrap();
        assert_eq!(mug.quantity, 12.0);
        assert_eq!(session.state().editing(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_surfaces_error_notice() {
        let store = Arc::new(MemoryStore::with_items(stock()));
        store.fail_writes(true);
        let mut session = loaded(&store).await;

        session
            .update_draft(ItemDraft {
                name: "Lamp".into(),
                quantity: "1".into(),
                price: "20".into(),
                ..ItemDraft::default()
            })
            .unwrap();
        session.submit().unwrap();
        session.wait_for_requests().await;

        let notice = &session.state().notices()[0];
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(session.state().draft().name, "Lamp");
        assert_eq!(store.items().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_store_shows_empty_offline_view() {
        let store = Arc::new(MemoryStore::with_items(stock()));
        store.fail_lists(true);
        let session = loaded(&store).await;

        assert!(session.state().items().is_empty());
        assert_eq!(session.state().connectivity(), ConnectivityState::Offline);
        assert_eq!(session.dashboard().total_items, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_commits_armed_deletes_immediately() {
        let store = Arc::new(MemoryStore::with_items(stock()));
        let mut session = loaded(&store).await;

        session.delete(&ItemId::new("a"), DeleteMode::Single).unwrap();
        session.delete(&ItemId::new("b"), DeleteMode::Single).unwrap();

        let started = Instant::now();
        session.flush_pending().await;

        assert!(started.elapsed() < Duration::from_millis(5000));
        assert_eq!(store.delete_calls().len(), 2);
        assert!(session.state().pending().is_empty());
        assert!(session.is_idle());
    }
}
