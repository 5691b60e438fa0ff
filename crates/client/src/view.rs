//! View state and its transitions.
//!
//! `ViewState` is an immutable snapshot. Every event produces a new snapshot
//! plus a list of [`Effect`]s (remote calls, timers) that the session executes;
//! no IO happens here.
//!
//! Per-item delete lifecycle:
//!
//! ```text
//! Present --delete--> Armed --undo--> Restored (re-inserted at the head)
//!                       |
//!                     expiry
//!                       v
//!                   Committing --ok--> Committed
//!                       |
//!                     error --> re-fetch (authoritative list wins)
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use stockroom_core::{DomainError, IntentId, ItemId, NoticeId};
use stockroom_inventory::{
    CanonicalItem, Dashboard, DashboardSettings, ItemDraft, ItemPayload, ListQuery, LowStockEntry,
    PricePolicy, RawItem, category_options, group_members, metrics,
};

use crate::fetch::FetchOutcome;
use crate::types::{ConnectivityState, Notice, SaveMode};

/// Phase of an optimistic delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePhase {
    /// Grace period running; undo still possible.
    Armed,
    /// Timer fired; the store request is in flight.
    Committing,
}

/// An in-flight optimistic delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteIntent {
    pub intent: IntentId,
    /// The removed record, kept for restore.
    pub item: RawItem,
    pub commit_at: Instant,
    pub phase: DeletePhase,
}

/// Inputs to the state machine: user intents, timer expiries and store completions.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RefreshRequested,
    DeleteRequested {
        id: ItemId,
        intent: IntentId,
        commit_at: Instant,
    },
    UndoRequested,
    GroupDeleteRequested {
        id: ItemId,
    },
    EditRequested {
        id: ItemId,
    },
    DraftChanged(ItemDraft),
    EditCancelled,
    SubmitRequested,
    QueryChanged(ListQuery),

    GraceExpired {
        intent: IntentId,
    },
    NoticeExpired {
        notice: NoticeId,
    },

    FetchCompleted(FetchOutcome),
    DeleteCommitted {
        intent: IntentId,
    },
    DeleteFailed {
        intent: IntentId,
        error: String,
    },
    GroupDeleteFinished {
        name: String,
        failures: usize,
        notice: NoticeId,
    },
    SaveSucceeded {
        mode: SaveMode,
        notice: NoticeId,
    },
    SaveFailed {
        error: String,
        notice: NoticeId,
    },
}

impl Event {
    /// True for events that report the end of a store request.
    pub fn is_store_completion(&self) -> bool {
        matches!(
            self,
            Event::FetchCompleted(_)
                | Event::DeleteCommitted { .. }
                | Event::DeleteFailed { .. }
                | Event::GroupDeleteFinished { .. }
                | Event::SaveSucceeded { .. }
                | Event::SaveFailed { .. }
        )
    }
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Fetch,
    ArmGraceTimer { intent: IntentId, commit_at: Instant },
    CancelGraceTimer { intent: IntentId },
    CommitDelete { intent: IntentId, id: ItemId },
    DeleteGroup { name: String, ids: Vec<ItemId> },
    Create(ItemPayload),
    Update { id: ItemId, payload: ItemPayload },
    ArmNoticeTimer { notice: NoticeId },
}

/// Reasons a user intent is refused. The state is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("delete of item {0} is already being committed; undo is no longer possible")]
    AlreadyCommitting(ItemId),
    #[error("item {0} is not in the current view")]
    UnknownItem(ItemId),
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

/// New snapshot plus the effects to run.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: ViewState,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    items: Vec<RawItem>,
    pending: Vec<DeleteIntent>,
    connectivity: ConnectivityState,
    query: ListQuery,
    draft: ItemDraft,
    editing: Option<ItemId>,
    notices: Vec<Notice>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local (optimistic) view of the raw records.
    pub fn items(&self) -> &[RawItem] {
        &self.items
    }

    pub fn pending(&self) -> &[DeleteIntent] {
        &self.pending
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn draft(&self) -> &ItemDraft {
        &self.draft
    }

    pub fn editing(&self) -> Option<&ItemId> {
        self.editing.as_ref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Item offered for undo: the most recent delete still in its grace period.
    pub fn undo_candidate(&self) -> Option<&RawItem> {
        self.pending
            .last()
            .filter(|p| p.phase == DeletePhase::Armed)
            .map(|p| &p.item)
    }

    /// Filtered, merged list as displayed.
    pub fn grouped(&self, policy: PricePolicy) -> Vec<CanonicalItem> {
        self.query.grouped(&self.items, policy)
    }

    pub fn low_stock(&self, policy: PricePolicy, threshold: f64) -> Vec<LowStockEntry> {
        metrics::low_stock(&self.grouped(policy), threshold)
    }

    pub fn category_options(&self) -> Vec<String> {
        category_options(&self.items)
    }

    pub fn dashboard(&self, now: DateTime<Utc>, settings: &DashboardSettings) -> Dashboard {
        Dashboard::compute(&self.items, now, settings)
    }

    fn is_pending(&self, id: &ItemId) -> bool {
        self.pending.iter().any(|p| &p.item.id == id)
    }

    fn find(&self, id: &ItemId) -> Result<&RawItem, IntentError> {
        self.items
            .iter()
            .find(|i| &i.id == id)
            .ok_or_else(|| IntentError::UnknownItem(id.clone()))
    }

    /// Apply one event.
    pub fn reduce(&self, event: Event) -> Result<Transition, IntentError> {
        let mut next = self.clone();
        let mut effects = Vec::new();

        match event {
            Event::RefreshRequested => effects.push(Effect::Fetch),

            Event::DeleteRequested {
                id,
                intent,
                commit_at,
            } => {
                if id.is_empty() {
                    return Err(DomainError::invalid_id("cannot delete an item without an id").into());
                }
                let pos = self
                    .items
                    .iter()
                    .position(|i| i.id == id)
                    .ok_or_else(|| IntentError::UnknownItem(id.clone()))?;
                let item = next.items.remove(pos);
                next.pending.push(DeleteIntent {
                    intent,
                    item,
                    commit_at,
                    phase: DeletePhase::Armed,
                });
                effects.push(Effect::ArmGraceTimer { intent, commit_at });
            }

            Event::UndoRequested => {
                let last = next.pending.last().ok_or(IntentError::NothingToUndo)?;
                if last.phase == DeletePhase::Committing {
                    return Err(IntentError::AlreadyCommitting(last.item.id.clone()));
                }
                if let Some(restored) = next.pending.pop() {
                    effects.push(Effect::CancelGraceTimer {
                        intent: restored.intent,
                    });
                    next.items.insert(0, restored.item);
                }
            }

            Event::GroupDeleteRequested { id } => {
                let clicked = self.find(&id)?;
                let ids = group_members(&self.items, &clicked.group_key())
                    .into_iter()
                    .filter(|i| !i.id.is_empty())
                    .map(|i| i.id.clone())
                    .collect();
                effects.push(Effect::DeleteGroup {
                    name: clicked.name.clone(),
                    ids,
                });
            }

            Event::EditRequested { id } => {
                next.draft = ItemDraft::from_item(self.find(&id)?);
                next.editing = Some(id);
            }

            Event::DraftChanged(draft) => next.draft = draft,

            Event::EditCancelled => {
                next.draft = ItemDraft::default();
                next.editing = None;
            }

            Event::SubmitRequested => {
                let payload = self.draft.to_payload()?;
                effects.push(match &self.editing {
                    Some(id) => Effect::Update {
                        id: id.clone(),
                        payload,
                    },
                    None => Effect::Create(payload),
                });
            }

            Event::QueryChanged(query) => next.query = query,

            Event::GraceExpired { intent } => {
                // Checked at fire time: an undo processed earlier removed the intent.
                if let Some(p) = next
                    .pending
                    .iter_mut()
                    .find(|p| p.intent == intent && p.phase == DeletePhase::Armed)
                {
                    p.phase = DeletePhase::Committing;
                    effects.push(Effect::CommitDelete {
                        intent,
                        id: p.item.id.clone(),
                    });
                }
            }

            Event::NoticeExpired { notice } => next.notices.retain(|n| n.id != notice),

            Event::FetchCompleted(outcome) => {
                next.items = outcome
                    .items
                    .into_iter()
                    .filter(|i| !self.is_pending(&i.id))
                    .collect();
                next.connectivity = outcome.connectivity;
            }

            Event::DeleteCommitted { intent } => next.pending.retain(|p| p.intent != intent),

            Event::DeleteFailed { intent, .. } => {
                next.pending.retain(|p| p.intent != intent);
                effects.push(Effect::Fetch);
            }

            Event::GroupDeleteFinished {
                name,
                failures,
                notice,
            } => {
                next.notices.push(if failures == 0 {
                    Notice::success(notice, format!("Deleted all \"{name}\" items."))
                } else {
                    Notice::error(
                        notice,
                        format!("Could not delete {failures} \"{name}\" item(s)."),
                    )
                });
                effects.push(Effect::ArmNoticeTimer { notice });
                effects.push(Effect::Fetch);
            }

            Event::SaveSucceeded { mode, notice } => {
                let message = match mode {
                    SaveMode::Created => "Item added successfully!",
                    SaveMode::Updated => "Item updated successfully!",
                };
                next.notices.push(Notice::success(notice, message));
                next.draft = ItemDraft::default();
                next.editing = None;
                effects.push(Effect::ArmNoticeTimer { notice });
                effects.push(Effect::Fetch);
            }

            Event::SaveFailed { error, notice } => {
                next.notices
                    .push(Notice::error(notice, format!("Could not save item: {error}")));
                effects.push(Effect::ArmNoticeTimer { notice });
            }
        }

        Ok(Transition {
            state: next,
            effects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NoticeLevel;

    fn loaded(items: Vec<RawItem>) -> ViewState {
        ViewState::new()
            .reduce(Event::FetchCompleted(FetchOutcome {
                items,
                connectivity: ConnectivityState::Online,
            }))
            .unwrap()
            .state
    }

    fn stock() -> Vec<RawItem> {
        vec![
            RawItem::new("a", "Pen").with_category("Office").with_quantity(3.0),
            RawItem::new("b", "Mug").with_category("Home").with_quantity(9.0),
            RawItem::new("c", " pen").with_category("office").with_quantity(1.0),
        ]
    }

    fn ids(state: &ViewState) -> Vec<&str> {
        state.items().iter().map(|i| i.id.as_str()).collect()
    }

    fn delete(state: &ViewState, id: &str, intent: IntentId) -> Transition {
        state
            .reduce(Event::DeleteRequested {
                id: ItemId::new(id),
                intent,
                commit_at: Instant::now(),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn delete_without_an_id_is_refused_and_hides_nothing() {
        let mut items = stock();
        items.push(RawItem::new("", "Ghost"));
        items.push(RawItem::new("", "Phantom"));
        let state = loaded(items.clone());

        let refused = state.reduce(Event::DeleteRequested {
            id: ItemId::new(""),
            intent: IntentId::new(),
            commit_at: Instant::now(),
        });
        assert!(matches!(
            refused,
            Err(IntentError::Invalid(DomainError::InvalidId(_)))
        ));

        let refetched = state
            .reduce(Event::FetchCompleted(FetchOutcome {
                items,
                connectivity: ConnectivityState::Online,
            }))
            .unwrap()
            .state;
        assert_eq!(refetched.items().len(), 5);
        assert!(refetched.pending().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_immediately_and_arms_timer() {
        let state = loaded(stock());
        let intent = IntentId::new();
        let t = delete(&state, "b", intent);

        assert_eq!(ids(&t.state), vec!["a", "c"]);
        assert_eq!(t.state.pending().len(), 1);
        assert_eq!(t.state.undo_candidate().map(|i| i.name.as_str()), Some("Mug"));
        assert!(matches!(&t.effects[..], [Effect::ArmGraceTimer { intent: i, .. }] if *i == intent));
        // The previous snapshot is untouched.
        assert_eq!(ids(&state), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn undo_restores_at_head_and_cancels_timer() {
        let intent = IntentId::new();
        let state = delete(&loaded(stock()), "c", intent).state;

        let t = state.reduce(Event::UndoRequested).unwrap();
        assert_eq!(ids(&t.state), vec!["c", "a", "b"]);
        assert!(t.state.pending().is_empty());
        assert_eq!(t.effects, vec![Effect::CancelGraceTimer { intent }]);

        // The timer event arriving anyway is ignored.
        let late = t.state.reduce(Event::GraceExpired { intent }).unwrap();
        assert!(late.effects.is_empty());
        assert_eq!(late.state, t.state);
    }

    #[tokio::test]
    async fn only_most_recent_delete_is_undoable() {
        let (first, second) = (IntentId::new(), IntentId::new());
        let state = delete(&loaded(stock()), "a", first).state;
        let state = delete(&state, "b", second).state;

        let t = state.reduce(Event::UndoRequested).unwrap();
        assert_eq!(ids(&t.state), vec!["b", "c"]);
        assert_eq!(t.state.pending().len(), 1);
        assert_eq!(t.state.pending()[0].intent, first);
    }

    #[tokio::test]
    async fn expiry_commits_and_late_undo_is_rejected() {
        let intent = IntentId::new();
        let state = delete(&loaded(stock()), "a", intent).state;

        let t = state.reduce(Event::GraceExpired { intent }).unwrap();
        assert_eq!(
            t.effects,
            vec![Effect::CommitDelete {
                intent,
                id: ItemId::new("a")
            }]
        );
        assert_eq!(t.state.pending()[0].phase, DeletePhase::Committing);
        assert_eq!(t.state.undo_candidate(), None);

        let err = t.state.reduce(Event::UndoRequested).unwrap_err();
        assert_eq!(err, IntentError::AlreadyCommitting(ItemId::new("a")));

        let done = t.state.reduce(Event::DeleteCommitted { intent }).unwrap();
        assert!(done.state.pending().is_empty());
        assert_eq!(ids(&done.state), vec!["b", "c"]);
        assert_eq!(
            done.state.reduce(Event::UndoRequested).unwrap_err(),
            IntentError::NothingToUndo
        );
    }

    #[tokio::test]
    async fn failed_commit_refetches_and_authoritative_list_wins() {
        let intent = IntentId::new();
        let state = delete(&loaded(stock()), "a", intent).state;
        let state = state.reduce(Event::GraceExpired { intent }).unwrap().state;

        let t = state
            .reduce(Event::DeleteFailed {
                intent,
                error: "503".into(),
            })
            .unwrap();
        assert_eq!(t.effects, vec![Effect::Fetch]);

        let refetched = t
            .state
            .reduce(Event::FetchCompleted(FetchOutcome {
                items: stock(),
                connectivity: ConnectivityState::Online,
            }))
            .unwrap()
            .state;
        assert_eq!(ids(&refetched), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn fetch_during_grace_period_keeps_item_hidden() {
        let state = delete(&loaded(stock()), "b", IntentId::new()).state;
        let refetched = state
            .reduce(Event::FetchCompleted(FetchOutcome {
                items: stock(),
                connectivity: ConnectivityState::Online,
            }))
            .unwrap()
            .state;
        assert_eq!(ids(&refetched), vec!["a", "c"]);
    }

    #[test]
    fn failed_fetch_shows_empty_offline_list() {
        let state = loaded(stock())
            .reduce(Event::FetchCompleted(FetchOutcome {
                items: Vec::new(),
                connectivity: ConnectivityState::Offline,
            }))
            .unwrap()
            .state;
        assert!(state.items().is_empty());
        assert_eq!(state.connectivity(), ConnectivityState::Offline);
    }

    #[test]
    fn unknown_item_delete_is_rejected() {
        let err = loaded(stock())
            .reduce(Event::DeleteRequested {
                id: ItemId::new("zzz"),
                intent: IntentId::new(),
                commit_at: Instant::now(),
            })
            .unwrap_err();
        assert_eq!(err, IntentError::UnknownItem(ItemId::new("zzz")));
    }

    #[test]
    fn group_delete_targets_every_matching_record() {
        let t = loaded(stock())
            .reduce(Event::GroupDeleteRequested { id: ItemId::new("a") })
            .unwrap();
        assert_eq!(
            t.effects,
            vec![Effect::DeleteGroup {
                name: "Pen".into(),
                ids: vec![ItemId::new("a"), ItemId::new("c")],
            }]
        );
        // No optimistic removal in group mode.
        assert_eq!(t.state.items().len(), 3);

        let notice = NoticeId::new();
        let done = t
            .state
            .reduce(Event::GroupDeleteFinished {
                name: "Pen".into(),
                failures: 0,
                notice,
            })
            .unwrap();
        assert_eq!(done.state.notices()[0].message, "Deleted all \"Pen\" items.");
        assert_eq!(
            done.effects,
            vec![Effect::ArmNoticeTimer { notice }, Effect::Fetch]
        );
    }

    #[test]
    fn edit_then_submit_issues_update() {
        let state = loaded(stock())
            .reduce(Event::EditRequested { id: ItemId::new("b") })
            .unwrap()
            .state;
        assert_eq!(state.editing(), Some(&ItemId::new("b")));
        assert_eq!(state.draft().name, "Mug");

        let t = state.reduce(Event::SubmitRequested).unwrap();
        assert!(matches!(&t.effects[..], [Effect::Update { id, payload }]
            if id.as_str() == "b" && payload.quantity == 9.0));

        let notice = NoticeId::new();
        let saved = t
            .state
            .reduce(Event::SaveSucceeded {
                mode: SaveMode::Updated,
                notice,
            })
            .unwrap()
            .state;
        assert_eq!(saved.editing(), None);
        assert_eq!(saved.draft(), &ItemDraft::default());
        assert_eq!(saved.notices()[0].message, "Item updated successfully!");

        let expired = saved.reduce(Event::NoticeExpired { notice }).unwrap().state;
        assert!(expired.notices().is_empty());
    }

    #[test]
    fn invalid_draft_is_rejected_without_effects() {
        let state = ViewState::new()
            .reduce(Event::DraftChanged(ItemDraft {
                name: "Lamp".into(),
                quantity: "two".into(),
                price: "3".into(),
                ..ItemDraft::default()
            }))
            .unwrap()
            .state;
        assert!(matches!(
            state.reduce(Event::SubmitRequested),
            Err(IntentError::Invalid(DomainError::Validation(_)))
        ));
    }

    #[test]
    fn save_failure_keeps_draft_and_surfaces_error() {
        let draft = ItemDraft {
            name: "Lamp".into(),
            quantity: "2".into(),
            price: "3".into(),
            ..ItemDraft::default()
        };
        let state = ViewState::new()
            .reduce(Event::DraftChanged(draft.clone()))
            .unwrap()
            .state;
        let t = state
            .reduce(Event::SaveFailed {
                error: "API error (500)".into(),
                notice: NoticeId::new(),
            })
            .unwrap();
        assert_eq!(t.state.draft(), &draft);
        assert_eq!(t.state.notices()[0].level, NoticeLevel::Error);
    }

    #[test]
    fn query_filters_grouped_list() {
        let state = loaded(stock())
            .reduce(Event::QueryChanged(ListQuery {
                search: "pen".into(),
                ..ListQuery::default()
            }))
            .unwrap()
            .state;
        let grouped = state.grouped(PricePolicy::Sum);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].quantity, 4.0);
        assert_eq!(state.low_stock(PricePolicy::Sum, 5.0).len(), 1);
        assert_eq!(state.category_options(), vec!["All", "Office", "Home", "office"]);
    }
}
