use serde::{Deserialize, Serialize};

/// A school under monitoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct School {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(default)]
    pub inep: String,
    #[serde(rename = "endereco", default)]
    pub address: Option<String>,
    #[serde(rename = "foto_fachada_url", default)]
    pub facade_photo_url: Option<String>,
    #[serde(rename = "nome_gestor", default)]
    pub principal_name: String,
    #[serde(rename = "email_gestor", default)]
    pub principal_email: Option<String>,
    #[serde(rename = "telefone", default)]
    pub phone: Option<String>,
}

impl School {
    /// Case-insensitive match on name, INEP code or principal name.
    /// An empty query matches every school.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&query)
            || self.inep.to_lowercase().contains(&query)
            || self.principal_name.to_lowercase().contains(&query)
    }
}

/// An administrative sector. Sectors form a tree through `parent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Sector {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(rename = "hierarquia_completa", default)]
    pub full_hierarchy: Option<String>,
}

impl Sector {
    pub fn display_name(&self) -> &str {
        self.full_hierarchy.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school() -> School {
        School {
            id: 1,
            name: "Escola Estadual Santos Dumont".to_string(),
            inep: "26123456".to_string(),
            address: None,
            facade_photo_url: None,
            principal_name: "Maria Silva".to_string(),
            principal_email: None,
            phone: None,
        }
    }

    #[test]
    fn test_matches_name_inep_and_principal() {
        let s = school();
        assert!(s.matches("santos"));
        assert!(s.matches("2612"));
        assert!(s.matches("MARIA"));
        assert!(s.matches(""));
        assert!(!s.matches("recife"));
    }

    #[test]
    fn test_parse_school_from_api() {
        let json = r#"{"id": 3, "nome": "EREM Recife", "inep": "26000001", "endereco": "Rua A", "foto_fachada_url": null, "nome_gestor": "Joao", "email_gestor": "j@x.br", "telefone": "8199999"}"#;
        let s: School = serde_json::from_str(json).expect("Failed to parse school test JSON");
        assert_eq!(s.name, "EREM Recife");
        assert_eq!(s.principal_name, "Joao");
        assert!(s.facade_photo_url.is_none());
    }

    #[test]
    fn test_sector_display_name_prefers_hierarchy() {
        let sector = Sector {
            id: 2,
            name: "Infraestrutura".to_string(),
            parent: Some("GRE".to_string()),
            full_hierarchy: Some("GRE > Infraestrutura".to_string()),
        };
        assert_eq!(sector.display_name(), "GRE > Infraestrutura");
    }
}
