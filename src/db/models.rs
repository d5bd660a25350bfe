use serde::Serialize;
use sqlx::FromRow;

/// The single settings row holding the displayed user name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Setting {
    pub id: i32,
    pub name: String,
}
