//! Questionnaires, questions and typed answers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A monitoring questionnaire assigned to one or more schools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Questionnaire {
    pub id: i64,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "setor", default)]
    pub sector_id: Option<i64>,
    /// Ids of the schools the questionnaire is assigned to
    #[serde(rename = "escolas_destino", default)]
    pub target_schools: Vec<i64>,
}

impl Questionnaire {
    pub fn is_assigned_to(&self, school_id: i64) -> bool {
        self.target_schools.contains(&school_id)
    }
}

/// The kind of answer a question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum AnswerKind {
    #[serde(rename = "SN")]
    YesNo,
    #[serde(rename = "NU")]
    Numeric,
    #[serde(rename = "TX")]
    Text,
}

impl AnswerKind {
    pub fn label(&self) -> &'static str {
        match self {
            AnswerKind::YesNo => "Sim/Não",
            AnswerKind::Numeric => "Numérico",
            AnswerKind::Text => "Texto",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Question {
    pub id: i64,
    /// Owning questionnaire. Absent in per-questionnaire form payloads.
    #[serde(rename = "questionario", default)]
    pub questionnaire_id: Option<i64>,
    #[serde(rename = "texto")]
    pub text: String,
    #[serde(rename = "ordem", default)]
    pub order: i32,
    #[serde(rename = "tipo_resposta")]
    pub kind: AnswerKind,
    #[serde(rename = "tipo_resposta_display", default)]
    pub kind_display: Option<String>,
}

impl Question {
    pub fn kind_label(&self) -> &str {
        self.kind_display.as_deref().unwrap_or_else(|| self.kind.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YesNo {
    #[serde(rename = "S")]
    Yes,
    #[serde(rename = "N")]
    No,
}

impl YesNo {
    /// Parse user input. Accepts the wire codes and the common spellings.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "s" | "sim" | "y" | "yes" => Some(YesNo::Yes),
            "n" | "nao" | "não" | "no" => Some(YesNo::No),
            _ => None,
        }
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YesNo::Yes => write!(f, "Sim"),
            YesNo::No => write!(f, "Não"),
        }
    }
}

/// A typed answer. Exactly one variant, matching the question's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    YesNo(YesNo),
    Numeric(f64),
    Text(String),
}

impl AnswerValue {
    /// Parse raw user input for a question of the given kind.
    ///
    /// Returns the reason when the input does not fit the kind: blank
    /// text (after trimming), an unparseable or non-finite number, or a
    /// yes/no answer that is neither.
    pub fn parse(kind: AnswerKind, raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        match kind {
            AnswerKind::YesNo => YesNo::parse(trimmed)
                .map(AnswerValue::YesNo)
                .ok_or_else(|| "answer must be yes or no".to_string()),
            AnswerKind::Numeric => {
                if trimmed.is_empty() {
                    return Err("a number is required".to_string());
                }
                // Accept the decimal comma used on pt-BR keyboards
                let normalized = trimmed.replace(',', ".");
                match normalized.parse::<f64>() {
                    Ok(n) if n.is_finite() => Ok(AnswerValue::Numeric(n)),
                    _ => Err(format!("'{}' is not a number", trimmed)),
                }
            }
            AnswerKind::Text => {
                if trimmed.is_empty() {
                    Err("an answer is required".to_string())
                } else {
                    Ok(AnswerValue::Text(raw.to_string()))
                }
            }
        }
    }

    pub fn kind(&self) -> AnswerKind {
        match self {
            AnswerValue::YesNo(_) => AnswerKind::YesNo,
            AnswerValue::Numeric(_) => AnswerKind::Numeric,
            AnswerValue::Text(_) => AnswerKind::Text,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::YesNo(v) => write!(f, "{}", v),
            AnswerValue::Numeric(n) => write!(f, "{}", n),
            AnswerValue::Text(t) => write!(f, "{}", t),
        }
    }
}

/// One answered question, as posted to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AnswerWire", into = "AnswerWire")]
pub struct Answer {
    pub question_id: i64,
    pub value: AnswerValue,
}

/// Wire shape of an answer: one of the three value fields is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnswerWire {
    pergunta_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resposta_sn: Option<YesNo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resposta_num: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resposta_texto: Option<String>,
}

impl TryFrom<AnswerWire> for Answer {
    type Error = String;

    fn try_from(wire: AnswerWire) -> Result<Self, Self::Error> {
        let value = match (wire.resposta_sn, wire.resposta_num, wire.resposta_texto) {
            (Some(v), None, None) => AnswerValue::YesNo(v),
            (None, Some(n), None) => AnswerValue::Numeric(n),
            (None, None, Some(t)) => AnswerValue::Text(t),
            _ => {
                return Err(format!(
                    "answer to question {} must carry exactly one value",
                    wire.pergunta_id
                ))
            }
        };
        Ok(Answer {
            question_id: wire.pergunta_id,
            value,
        })
    }
}

impl From<Answer> for AnswerWire {
    fn from(answer: Answer) -> Self {
        let mut wire = AnswerWire {
            pergunta_id: answer.question_id,
            resposta_sn: None,
            resposta_num: None,
            resposta_texto: None,
        };
        match answer.value {
            AnswerValue::YesNo(v) => wire.resposta_sn = Some(v),
            AnswerValue::Numeric(n) => wire.resposta_num = Some(n),
            AnswerValue::Text(t) => wire.resposta_texto = Some(t),
        }
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_parse_accepts_number_and_rejects_text() {
        assert_eq!(
            AnswerValue::parse(AnswerKind::Numeric, "12"),
            Ok(AnswerValue::Numeric(12.0))
        );
        assert!(AnswerValue::parse(AnswerKind::Numeric, "abc").is_err());
        assert!(AnswerValue::parse(AnswerKind::Numeric, "   ").is_err());
        assert!(AnswerValue::parse(AnswerKind::Numeric, "NaN").is_err());
        assert!(AnswerValue::parse(AnswerKind::Numeric, "inf").is_err());
    }

    #[test]
    fn test_numeric_parse_accepts_decimal_comma() {
        assert_eq!(
            AnswerValue::parse(AnswerKind::Numeric, " 3,5 "),
            Ok(AnswerValue::Numeric(3.5))
        );
    }

    #[test]
    fn test_text_parse_is_strict() {
        assert!(AnswerValue::parse(AnswerKind::Text, "  \n ").is_err());
        assert_eq!(
            AnswerValue::parse(AnswerKind::Text, "ok"),
            Ok(AnswerValue::Text("ok".to_string()))
        );
    }

    #[test]
    fn test_yes_no_parse() {
        assert_eq!(YesNo::parse("S"), Some(YesNo::Yes));
        assert_eq!(YesNo::parse("não"), Some(YesNo::No));
        assert_eq!(YesNo::parse("talvez"), None);
    }

    #[test]
    fn test_answer_wire_shape() {
        let answer = Answer {
            question_id: 4,
            value: AnswerValue::YesNo(YesNo::No),
        };
        let json = serde_json::to_value(&answer).expect("serialize answer");
        assert_eq!(json, serde_json::json!({"pergunta_id": 4, "resposta_sn": "N"}));

        let numeric: Answer =
            serde_json::from_str(r#"{"pergunta_id": 5, "resposta_num": 2.5}"#).expect("parse");
        assert_eq!(numeric.value, AnswerValue::Numeric(2.5));
    }

    #[test]
    fn test_answer_with_two_values_is_rejected() {
        let result = serde_json::from_str::<Answer>(
            r#"{"pergunta_id": 5, "resposta_num": 2.5, "resposta_texto": "x"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_question_from_api() {
        let json = r#"{"id": 9, "questionario": 2, "texto": "Há merenda?", "ordem": 1, "tipo_resposta": "SN"}"#;
        let q: Question = serde_json::from_str(json).expect("Failed to parse question test JSON");
        assert_eq!(q.kind, AnswerKind::YesNo);
        assert_eq!(q.kind_label(), "Sim/Não");
        assert_eq!(q.questionnaire_id, Some(2));
    }
}
