//! Scriptable in-memory [`Backend`] for service tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ApiError, ApiResult, Backend};
use crate::models::{
    MasterDataSnapshot, QuestionnaireForm, School, SchoolDashboard, SchoolQuestionnaires,
    SubmissionPayload, SubmitAck,
};

/// Scripted outcome of one endpoint
pub(crate) enum Reply<T> {
    Ok(T),
    Fail(fn() -> ApiError),
}

impl<T: Clone> Reply<T> {
    fn get(&self) -> ApiResult<T> {
        match self {
            Reply::Ok(v) => Ok(v.clone()),
            Reply::Fail(f) => Err(f()),
        }
    }
}

type SubmitRule = Box<dyn Fn(&str, &SubmissionPayload) -> ApiResult<SubmitAck> + Send>;

pub(crate) struct FakeBackend {
    master: Mutex<Reply<MasterDataSnapshot>>,
    master_delay: Mutex<Duration>,
    schools: Mutex<Reply<Vec<School>>>,
    listing: Mutex<Reply<SchoolQuestionnaires>>,
    form: Mutex<Reply<QuestionnaireForm>>,
    dashboard: Mutex<Reply<SchoolDashboard>>,
    submit: Mutex<SubmitRule>,
    submit_delay: Mutex<Duration>,
    calls: Mutex<Vec<&'static str>>,
    submitted: Mutex<Vec<(String, SubmissionPayload)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            master: Mutex::new(Reply::Ok(fixtures::snapshot())),
            master_delay: Mutex::new(Duration::ZERO),
            schools: Mutex::new(Reply::Ok(fixtures::snapshot().schools)),
            listing: Mutex::new(Reply::Ok(fixtures::listing())),
            form: Mutex::new(Reply::Ok(fixtures::form())),
            dashboard: Mutex::new(Reply::Ok(fixtures::dashboard())),
            submit: Mutex::new(Box::new(|_, _| Ok(fixtures::ack()))),
            submit_delay: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn set_master(&self, reply: Reply<MasterDataSnapshot>) {
        *self.master.lock().unwrap() = reply;
    }

    pub fn set_master_delay(&self, delay: Duration) {
        *self.master_delay.lock().unwrap() = delay;
    }

    pub fn set_schools(&self, reply: Reply<Vec<School>>) {
        *self.schools.lock().unwrap() = reply;
    }

    pub fn set_listing(&self, reply: Reply<SchoolQuestionnaires>) {
        *self.listing.lock().unwrap() = reply;
    }

    pub fn set_form(&self, reply: Reply<QuestionnaireForm>) {
        *self.form.lock().unwrap() = reply;
    }

    pub fn set_submit(
        &self,
        rule: impl Fn(&str, &SubmissionPayload) -> ApiResult<SubmitAck> + Send + 'static,
    ) {
        *self.submit.lock().unwrap() = Box::new(rule);
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = delay;
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == endpoint)
            .count()
    }

    /// Submissions the server accepted or rejected, with the token used
    pub fn submitted(&self) -> Vec<(String, SubmissionPayload)> {
        self.submitted.lock().unwrap().clone()
    }

    fn record(&self, endpoint: &'static str) {
        self.calls.lock().unwrap().push(endpoint);
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_master_data(&self, _token: &str) -> ApiResult<MasterDataSnapshot> {
        self.record("master");
        let delay = *self.master_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.master.lock().unwrap().get()
    }

    async fn search_schools(&self, _token: &str, query: &str) -> ApiResult<Vec<School>> {
        self.record("schools");
        let schools = self.schools.lock().unwrap().get()?;
        Ok(schools.into_iter().filter(|s| s.matches(query)).collect())
    }

    async fn fetch_school_questionnaires(
        &self,
        _token: &str,
        _school_id: i64,
    ) -> ApiResult<SchoolQuestionnaires> {
        self.record("listing");
        self.listing.lock().unwrap().get()
    }

    async fn fetch_questionnaire_form(
        &self,
        _token: &str,
        _school_id: i64,
        _questionnaire_id: i64,
    ) -> ApiResult<QuestionnaireForm> {
        self.record("form");
        self.form.lock().unwrap().get()
    }

    async fn fetch_school_dashboard(
        &self,
        _token: &str,
        _school_id: i64,
    ) -> ApiResult<SchoolDashboard> {
        self.record("dashboard");
        self.dashboard.lock().unwrap().get()
    }

    async fn submit_answers(
        &self,
        token: &str,
        payload: &SubmissionPayload,
    ) -> ApiResult<SubmitAck> {
        self.record("submit");
        let delay = *self.submit_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.submitted
            .lock()
            .unwrap()
            .push((token.to_string(), payload.clone()));
        (self.submit.lock().unwrap())(token, payload)
    }
}

pub(crate) mod fixtures {
    use super::*;
    use crate::models::{Answer, AnswerValue, YesNo};

    pub fn snapshot() -> MasterDataSnapshot {
        serde_json::from_value(serde_json::json!({
            "escolas": [
                {"id": 1, "nome": "Escola Municipal Flores", "inep": "11111111", "nome_gestor": "Ana Lima"},
                {"id": 2, "nome": "Escola Estadual Rio Claro", "inep": "22222222", "nome_gestor": "Carlos Dias"}
            ],
            "questionarios": [{"id": 10, "titulo": "Merenda escolar", "setor": 5, "escolas_destino": [1, 2]}],
            "perguntas": [
                {"id": 102, "questionario": 10, "texto": "Quantos alunos comeram?", "ordem": 2, "tipo_resposta": "NU"},
                {"id": 101, "questionario": 10, "texto": "A merenda foi servida?", "ordem": 1, "tipo_resposta": "SN"},
                {"id": 103, "questionario": 10, "texto": "Observações", "ordem": 3, "tipo_resposta": "TX"}
            ],
            "setores": [{"id": 5, "nome": "Nutrição"}]
        }))
        .unwrap()
    }

    pub fn form() -> QuestionnaireForm {
        let snapshot = snapshot();
        QuestionnaireForm {
            school: crate::models::SchoolSummary {
                id: 1,
                name: "Escola Municipal Flores".to_string(),
                inep: Some("11111111".to_string()),
            },
            questionnaire: snapshot.questionnaires[0].clone(),
            questions: snapshot.questions.clone(),
            today: None,
        }
    }

    pub fn listing() -> SchoolQuestionnaires {
        serde_json::from_value(serde_json::json!({
            "escola": {"id": 1, "nome": "Escola Municipal Flores"},
            "questionarios": [{"id": 10, "titulo": "Merenda escolar", "respostas_hoje": 1, "total_respostas": 4}],
            "total_hoje": 1,
            "total_geral": 4,
            "user_is_monitor": true
        }))
        .unwrap()
    }

    pub fn dashboard() -> SchoolDashboard {
        serde_json::from_value(serde_json::json!({
            "escola": {"id": 1, "nome": "Escola Municipal Flores"},
            "lacunas_stats": {"abertas": 2},
            "problemas_stats": {"abertos": 0},
            "avisos": []
        }))
        .unwrap()
    }

    pub fn ack() -> SubmitAck {
        SubmitAck {
            status: "success".to_string(),
            message: None,
        }
    }

    pub fn payload(school_id: i64) -> SubmissionPayload {
        SubmissionPayload {
            school_id,
            questionnaire_id: 10,
            answers: vec![Answer {
                question_id: 101,
                value: AnswerValue::YesNo(YesNo::Yes),
            }],
        }
    }
}
