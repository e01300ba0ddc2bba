//! User management request payloads

use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct RegisterPayload {
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct UpdateUserPayload {
    pub name: String,
    pub email: String,
}
