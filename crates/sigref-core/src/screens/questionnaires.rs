//! Questionnaire list and questionnaire form screens.
//!
//! Both cache the server payload per entity. When the device has never
//! seen a payload, they fall back to what the master snapshot knows, so a
//! questionnaire can be answered offline right after a sync.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use super::controller::ScreenSource;
use crate::api::Backend;
use crate::auth::TokenProvider;
use crate::cache::{CacheManager, CachedData};
use crate::connectivity::Connectivity;
use crate::error::AppError;
use crate::models::{
    QuestionnaireForm, QuestionnaireListing, SchoolQuestionnaires, SchoolSummary,
};
use crate::notice::NoticeBus;
use crate::queue::{deliver_pending, PendingQueue};
use crate::sync::MasterDataSync;

fn summary_from_master(master: &MasterDataSync, school_id: i64) -> Option<SchoolSummary> {
    master.snapshot().school(school_id).map(|s| SchoolSummary {
        id: s.id,
        name: s.name.clone(),
        inep: Some(s.inep.clone()),
    })
}

fn master_cached_at(master: &MasterDataSync) -> chrono::DateTime<Utc> {
    master.last_sync().unwrap_or_else(Utc::now)
}

/// Everything the questionnaire list needs to flush the queue on focus
pub struct QueueAccess {
    pub queue: PendingQueue,
    pub tokens: Arc<dyn TokenProvider>,
    pub connectivity: Connectivity,
    pub notices: NoticeBus,
}

/// Questionnaires available for one school.
///
/// Coming into view delivers queued responses first, so the counts shown
/// include them.
pub struct QuestionnaireList {
    school_id: i64,
    backend: Arc<dyn Backend>,
    cache: CacheManager,
    master: MasterDataSync,
    pending: QueueAccess,
}

impl QuestionnaireList {
    pub fn new(
        school_id: i64,
        backend: Arc<dyn Backend>,
        cache: CacheManager,
        master: MasterDataSync,
        pending: QueueAccess,
    ) -> Self {
        Self {
            school_id,
            backend,
            cache,
            master,
            pending,
        }
    }

    pub fn school_id(&self) -> i64 {
        self.school_id
    }

    /// Questionnaires assigned to the school in the master snapshot. A
    /// snapshot without any assignment data lists every questionnaire.
    fn from_master(&self) -> Option<CachedData<SchoolQuestionnaires>> {
        let school = summary_from_master(&self.master, self.school_id)?;
        let snapshot = self.master.snapshot();
        let has_assignments = snapshot
            .questionnaires
            .iter()
            .any(|q| !q.target_schools.is_empty());
        let questionnaires = snapshot
            .questionnaires
            .iter()
            .filter(|q| !has_assignments || q.is_assigned_to(self.school_id))
            .map(|q| QuestionnaireListing {
                id: q.id,
                title: q.title.clone(),
                description: q.description.clone(),
                answers_today: 0,
                answers_total: 0,
            })
            .collect();
        let listing = SchoolQuestionnaires {
            school,
            questionnaires,
            my_monitorings_today: 0,
            my_monitorings_total: 0,
            total_today: 0,
            total_overall: 0,
            last_answer_at: None,
            user_is_monitor: false,
        };
        Some(CachedData::at(listing, master_cached_at(&self.master)))
    }
}

#[async_trait]
impl ScreenSource for QuestionnaireList {
    type Data = SchoolQuestionnaires;

    fn load_cached(&self) -> Option<CachedData<SchoolQuestionnaires>> {
        self.cache
            .load_school_questionnaires(self.school_id)
            .or_else(|| self.from_master())
    }

    async fn fetch(&self, token: &str) -> Result<SchoolQuestionnaires, AppError> {
        let listing = self
            .backend
            .fetch_school_questionnaires(token, self.school_id)
            .await?;
        if let Err(e) = self.cache.save_school_questionnaires(self.school_id, &listing) {
            warn!(school_id = self.school_id, error = %e, "Failed to cache questionnaire list");
        }
        Ok(listing)
    }

    async fn on_focus(&self) {
        deliver_pending(
            &self.pending.queue,
            self.backend.as_ref(),
            self.pending.tokens.as_ref(),
            &self.pending.connectivity,
            &self.pending.notices,
        )
        .await;
    }
}

/// The form for answering one questionnaire at one school.
pub struct QuestionnaireFormSource {
    school_id: i64,
    questionnaire_id: i64,
    backend: Arc<dyn Backend>,
    cache: CacheManager,
    master: MasterDataSync,
}

impl QuestionnaireFormSource {
    pub fn new(
        school_id: i64,
        questionnaire_id: i64,
        backend: Arc<dyn Backend>,
        cache: CacheManager,
        master: MasterDataSync,
    ) -> Self {
        Self {
            school_id,
            questionnaire_id,
            backend,
            cache,
            master,
        }
    }

    fn from_master(&self) -> Option<CachedData<QuestionnaireForm>> {
        let snapshot = self.master.snapshot();
        let questionnaire = snapshot.questionnaire(self.questionnaire_id)?.clone();
        let school = summary_from_master(&self.master, self.school_id).unwrap_or(SchoolSummary {
            id: self.school_id,
            ..Default::default()
        });
        let form = QuestionnaireForm {
            school,
            questionnaire,
            questions: snapshot.questions_for(self.questionnaire_id),
            today: None,
        };
        Some(CachedData::at(form, master_cached_at(&self.master)))
    }
}

#[async_trait]
impl ScreenSource for QuestionnaireFormSource {
    type Data = QuestionnaireForm;

    fn load_cached(&self) -> Option<CachedData<QuestionnaireForm>> {
        self.cache
            .load_questionnaire_form(self.questionnaire_id)
            .or_else(|| self.from_master())
    }

    async fn fetch(&self, token: &str) -> Result<QuestionnaireForm, AppError> {
        let form = self
            .backend
            .fetch_questionnaire_form(token, self.school_id, self.questionnaire_id)
            .await?;
        if let Err(e) = self.cache.save_questionnaire_form(self.questionnaire_id, &form) {
            warn!(
                questionnaire_id = self.questionnaire_id,
                error = %e,
                "Failed to cache questionnaire form"
            );
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::api::fake::{fixtures, FakeBackend, Reply};
    use crate::cache::MemoryStore;
    use crate::clock::SystemClock;
    use crate::connectivity::Reachability;
    use crate::notice::Notice;
    use crate::screens::ScreenController;

    struct Signed;

    impl TokenProvider for Signed {
        fn current_token(&self) -> Option<String> {
            Some("tok".to_string())
        }
    }

    struct World {
        backend: Arc<FakeBackend>,
        cache: CacheManager,
        connectivity: Connectivity,
        master: MasterDataSync,
        queue: PendingQueue,
        notices: NoticeBus,
    }

    fn world(reach: Reachability) -> World {
        let backend = Arc::new(FakeBackend::new());
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        let connectivity = Connectivity::new(reach);
        let master = MasterDataSync::new(
            backend.clone(),
            cache.clone(),
            connectivity.clone(),
            Arc::new(SystemClock),
            chrono::Duration::hours(24),
        );
        let queue = PendingQueue::new(cache.clone(), Arc::new(SystemClock));
        World {
            backend,
            cache,
            connectivity,
            master,
            queue,
            notices: NoticeBus::new(),
        }
    }

    fn list_screen(w: &World, school_id: i64) -> ScreenController<QuestionnaireList> {
        let source = QuestionnaireList::new(
            school_id,
            w.backend.clone(),
            w.cache.clone(),
            w.master.clone(),
            QueueAccess {
                queue: w.queue.clone(),
                tokens: Arc::new(Signed),
                connectivity: w.connectivity.clone(),
                notices: w.notices.clone(),
            },
        );
        ScreenController::new(source, Arc::new(Signed), w.connectivity.clone(), w.notices.clone())
    }

    #[tokio::test]
    async fn test_list_fetch_is_cached_for_offline_use() {
        let w = world(Reachability::Online);
        let screen = list_screen(&w, 1);
        screen.mount().await;
        screen.unmount();
        assert!(w.cache.load_school_questionnaires(1).is_some());

        w.connectivity.set(Reachability::Offline);
        let state = screen.mount().await;
        assert!(state.is_offline());
        assert_eq!(state.data().unwrap().total_overall, 4);
    }

    #[tokio::test]
    async fn test_list_drains_queue_on_focus() {
        let w = world(Reachability::Online);
        let mut rx = w.notices.subscribe();
        let item = w.queue.new_submission(fixtures::payload(1), Some("tok".to_string()));
        w.queue.enqueue(item).await.unwrap();

        list_screen(&w, 1).mount().await;

        assert!(w.queue.is_empty().await.unwrap());
        assert_eq!(
            rx.recv().await.unwrap(),
            Notice::QueueDrained {
                delivered: 1,
                remaining: 0
            }
        );
        assert_eq!(w.backend.calls_to("submit"), 1);
    }

    #[tokio::test]
    async fn test_list_falls_back_to_master_snapshot() {
        let w = world(Reachability::Online);
        w.master.sync(Some("tok")).await.unwrap();
        w.connectivity.set(Reachability::Offline);

        let state = list_screen(&w, 2).mount().await;
        let listing = state.data().unwrap();
        assert_eq!(listing.school.name, "Escola Estadual Rio Claro");
        assert_eq!(listing.questionnaires[0].id, 10);
    }

    #[tokio::test]
    async fn test_list_from_master_only_shows_assigned_questionnaires() {
        let w = world(Reachability::Online);
        let mut snapshot = fixtures::snapshot();
        let mut other = snapshot.questionnaires[0].clone();
        other.id = 11;
        other.title = "Transporte escolar".to_string();
        other.target_schools = vec![1];
        snapshot.questionnaires.push(other);
        w.backend.set_master(Reply::Ok(snapshot));
        w.master.sync(Some("tok")).await.unwrap();
        w.connectivity.set(Reachability::Offline);

        let ids = |state: &crate::screens::ScreenState<SchoolQuestionnaires>| -> Vec<i64> {
            state.data().unwrap().questionnaires.iter().map(|q| q.id).collect()
        };
        assert_eq!(ids(&list_screen(&w, 1).mount().await), vec![10, 11]);
        assert_eq!(ids(&list_screen(&w, 2).mount().await), vec![10]);
    }

    #[tokio::test]
    async fn test_form_offline_from_master_snapshot() {
        let w = world(Reachability::Online);
        w.master.sync(Some("tok")).await.unwrap();
        w.connectivity.set(Reachability::Offline);

        let source =
            QuestionnaireFormSource::new(1, 10, w.backend.clone(), w.cache.clone(), w.master.clone());
        let screen =
            ScreenController::new(source, Arc::new(Signed), w.connectivity.clone(), w.notices.clone());
        let state = screen.mount().await;

        let form = state.data().unwrap();
        let ids: Vec<i64> = form.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![101, 102, 103]);
        assert_eq!(w.backend.calls_to("form"), 0);
    }

    #[tokio::test]
    async fn test_form_unknown_offline_is_unreachable() {
        let w = world(Reachability::Offline);
        let source =
            QuestionnaireFormSource::new(1, 99, w.backend.clone(), w.cache.clone(), w.master.clone());
        let screen =
            ScreenController::new(source, Arc::new(Signed), w.connectivity.clone(), w.notices.clone());
        assert_eq!(
            screen.mount().await.error(),
            Some(&AppError::NetworkUnreachable)
        );
    }
}
