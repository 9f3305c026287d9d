//! Quick-workout catalog (`entrenamientos_rapidos`) and the timed session
//! records (`sesiones_entrenamiento_rapido`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuickWorkoutType {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    pub slug: String,
    #[serde(rename = "icono")]
    pub icon: String,
    pub color: String,
    #[serde(rename = "orden")]
    pub sort_order: i32,
    #[serde(rename = "categoria")]
    pub category: String,
}

impl Entity for QuickWorkoutType {
    const TABLE: &'static str = "entrenamientos_rapidos";
}

/// Created on start (server assigns `id` and `started_at`), updated exactly
/// once on finish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuickWorkoutSession {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "entrenamiento_id")]
    pub type_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(rename = "duracion_segundos", default)]
    pub duration_seconds: i64,
    #[serde(rename = "calorias", default)]
    pub calories: Option<i32>,
    #[serde(rename = "distancia_metros", default)]
    pub distance_meters: Option<f64>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
}

impl Entity for QuickWorkoutSession {
    const TABLE: &'static str = "sesiones_entrenamiento_rapido";
}

impl QuickWorkoutSession {
    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewQuickWorkoutSession {
    pub user_id: Uuid,
    #[serde(rename = "entrenamiento_id")]
    pub type_id: Uuid,
}

/// Partial update applied when a session finishes. Absent metrics are left
/// out of the payload so they never overwrite stored values.
#[derive(Debug, Clone, Serialize)]
pub struct FinishQuickWorkout {
    pub ended_at: DateTime<Utc>,
    #[serde(rename = "duracion_segundos")]
    pub duration_seconds: i64,
    #[serde(rename = "calorias", skip_serializing_if = "Option::is_none")]
    pub calories: Option<i32>,
    #[serde(rename = "distancia_metros", skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}
