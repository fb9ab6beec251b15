//! Per-screen payloads returned by the school and questionnaire endpoints.
//!
//! These are cached as-is under a key derived from the entity id.

use serde::{Deserialize, Serialize};

use super::{Question, Questionnaire};

/// Minimal school block embedded in screen payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchoolSummary {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(default)]
    pub inep: Option<String>,
}

/// Data needed to render and answer one questionnaire for one school.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireForm {
    #[serde(rename = "escola", default)]
    pub school: SchoolSummary,
    #[serde(rename = "questionario")]
    pub questionnaire: Questionnaire,
    #[serde(rename = "perguntas", default)]
    pub questions: Vec<Question>,
    /// Server date at fetch time (ISO 8601)
    #[serde(rename = "hoje", default)]
    pub today: Option<String>,
}

impl QuestionnaireForm {
    /// Questions in display order
    pub fn ordered_questions(&self) -> Vec<&Question> {
        let mut questions: Vec<&Question> = self.questions.iter().collect();
        questions.sort_by_key(|q| q.order);
        questions
    }
}

/// A questionnaire as listed on a school's questionnaire screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireListing {
    pub id: i64,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "respostas_hoje", default)]
    pub answers_today: u32,
    #[serde(rename = "total_respostas", default)]
    pub answers_total: u32,
}

impl QuestionnaireListing {
    /// Share of today's answers in the total, as a percentage
    pub fn today_percentage(&self) -> f64 {
        if self.answers_total == 0 {
            0.0
        } else {
            f64::from(self.answers_today) / f64::from(self.answers_total) * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolQuestionnaires {
    #[serde(rename = "escola", default)]
    pub school: SchoolSummary,
    #[serde(rename = "questionarios", default)]
    pub questionnaires: Vec<QuestionnaireListing>,
    #[serde(rename = "meus_monitoramentos_hoje", default)]
    pub my_monitorings_today: u32,
    #[serde(rename = "meus_monitoramentos_total", default)]
    pub my_monitorings_total: u32,
    #[serde(rename = "total_hoje", default)]
    pub total_today: u32,
    #[serde(rename = "total_geral", default)]
    pub total_overall: u32,
    #[serde(rename = "ultima_resposta_geral", default)]
    pub last_answer_at: Option<String>,
    #[serde(rename = "user_is_monitor", default)]
    pub user_is_monitor: bool,
}

/// School dashboard. Statistics blocks vary by server version and are
/// kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolDashboard {
    #[serde(rename = "escola", default)]
    pub school: SchoolSummary,
    #[serde(rename = "lacunas_stats", default)]
    pub gap_stats: serde_json::Value,
    #[serde(rename = "problemas_stats", default)]
    pub problem_stats: serde_json::Value,
    #[serde(rename = "avisos", default)]
    pub notices: Vec<serde_json::Value>,
}

/// Server acknowledgement of a questionnaire response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAck {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl SubmitAck {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}
