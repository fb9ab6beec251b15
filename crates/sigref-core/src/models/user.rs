use serde::{Deserialize, Serialize};

/// The logged-in user as returned by the login endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserProfile {
    pub token: String,
    #[serde(rename = "full_name", default)]
    pub full_name: String,
    #[serde(rename = "user_type", default)]
    pub user_type: Option<String>,
    #[serde(rename = "user_type_display", default)]
    pub user_type_display: Option<String>,
    #[serde(rename = "access_level", default)]
    pub access_level: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(rename = "celular", default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    /// Ids of the schools the user is associated with
    #[serde(rename = "escolas", default)]
    pub schools: Vec<i64>,
    #[serde(rename = "setor", default)]
    pub sector: Option<i64>,
}

impl UserProfile {
    pub fn display_role(&self) -> &str {
        self.user_type_display
            .as_deref()
            .or(self.user_type.as_deref())
            .unwrap_or("")
    }
}
