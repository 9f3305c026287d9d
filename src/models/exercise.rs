//! Shared exercise catalog (`ejercicios`) and the per-user favorite join
//! table (`ejercicios_favoritos`).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Entity;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExerciseType {
    #[serde(rename = "fuerza")]
    Strength,
    #[serde(rename = "cardio")]
    Cardio,
    #[serde(rename = "movilidad")]
    Mobility,
    #[serde(rename = "estiramiento")]
    Stretching,
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 4] = [
        ExerciseType::Strength,
        ExerciseType::Cardio,
        ExerciseType::Mobility,
        ExerciseType::Stretching,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Strength => "fuerza",
            ExerciseType::Cardio => "cardio",
            ExerciseType::Mobility => "movilidad",
            ExerciseType::Stretching => "estiramiento",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "tipo")]
    pub kind: ExerciseType,
}

impl Entity for Exercise {
    const TABLE: &'static str = "ejercicios";
}

/// Existence of a row means "favorited". At most one row per pair, enforced
/// by the backend's unique constraint through an upsert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoriteMark {
    pub user_id: Uuid,
    #[serde(rename = "ejercicio_id")]
    pub exercise_id: Uuid,
}

impl FavoriteMark {
    pub const CONFLICT_COLUMNS: [&'static str; 2] = ["user_id", "ejercicio_id"];
}

impl Entity for FavoriteMark {
    const TABLE: &'static str = "ejercicios_favoritos";
}
