use serde::{Deserialize, Serialize};

use super::{Question, Questionnaire, School, Sector};

/// The complete reference dataset, replaced wholesale on every successful sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MasterDataSnapshot {
    #[serde(rename = "escolas", default)]
    pub schools: Vec<School>,
    #[serde(rename = "questionarios", default)]
    pub questionnaires: Vec<Questionnaire>,
    #[serde(rename = "perguntas", default)]
    pub questions: Vec<Question>,
    #[serde(rename = "setores", default)]
    pub sectors: Vec<Sector>,
}

impl MasterDataSnapshot {
    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
            && self.questionnaires.is_empty()
            && self.questions.is_empty()
            && self.sectors.is_empty()
    }

    /// Schools matching a search query, in snapshot order
    pub fn search_schools(&self, query: &str) -> Vec<School> {
        self.schools
            .iter()
            .filter(|s| s.matches(query))
            .cloned()
            .collect()
    }

    pub fn school(&self, id: i64) -> Option<&School> {
        self.schools.iter().find(|s| s.id == id)
    }

    pub fn questionnaire(&self, id: i64) -> Option<&Questionnaire> {
        self.questionnaires.iter().find(|q| q.id == id)
    }

    /// Questions of a questionnaire, sorted by their display order
    pub fn questions_for(&self, questionnaire_id: i64) -> Vec<Question> {
        let mut questions: Vec<Question> = self
            .questions
            .iter()
            .filter(|q| q.questionnaire_id == Some(questionnaire_id))
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.order);
        questions
    }

    pub fn sector(&self, id: i64) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER_JSON: &str = r#"{
        "escolas": [{"id": 1, "nome": "Escola A", "inep": "111", "nome_gestor": "Ana"},
                    {"id": 2, "nome": "Escola B", "inep": "222", "nome_gestor": "Bruno"}],
        "questionarios": [{"id": 10, "titulo": "Merenda", "descricao": "", "setor": 3}],
        "perguntas": [{"id": 101, "questionario": 10, "texto": "Segunda", "ordem": 2, "tipo_resposta": "NU"},
                      {"id": 100, "questionario": 10, "texto": "Primeira", "ordem": 1, "tipo_resposta": "SN"},
                      {"id": 200, "questionario": 11, "texto": "Outra", "ordem": 1, "tipo_resposta": "TX"}],
        "setores": [{"id": 3, "nome": "Alimentação", "parent": null}]
    }"#;

    #[test]
    fn test_parse_master_data() {
        let snapshot: MasterDataSnapshot =
            serde_json::from_str(MASTER_JSON).expect("Failed to parse master data test JSON");
        assert_eq!(snapshot.schools.len(), 2);
        assert_eq!(snapshot.questionnaire(10).map(|q| q.title.as_str()), Some("Merenda"));
        assert_eq!(snapshot.sector(3).map(|s| s.name.as_str()), Some("Alimentação"));
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_questions_for_sorted_by_order() {
        let snapshot: MasterDataSnapshot = serde_json::from_str(MASTER_JSON).unwrap();
        let ids: Vec<i64> = snapshot.questions_for(10).iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![100, 101]);
    }

    #[test]
    fn test_search_schools() {
        let snapshot: MasterDataSnapshot = serde_json::from_str(MASTER_JSON).unwrap();
        let found = snapshot.search_schools("bruno");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 2);
        assert_eq!(snapshot.search_schools("").len(), 2);
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let snapshot: MasterDataSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.is_empty());
    }
}
