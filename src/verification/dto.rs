use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub phone: Option<String>,
    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSent {
    pub phone: String,
    pub expires_in: u64,
}
