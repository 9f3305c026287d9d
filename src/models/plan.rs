//! Planned training sessions (`plan_sesiones`) and their ordered exercise
//! entries (`plan_sesion_ejercicios`).

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Entity;

/// Placeholder time for untimed sessions; sorts after any real `HH:MM:SS`.
pub const UNTIMED_SORT_SENTINEL: &str = "99:99:99";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedSession {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "hora", default)]
    pub time: Option<NaiveTime>,
    #[serde(rename = "titulo", default)]
    pub title: Option<String>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
}

impl Entity for PlannedSession {
    const TABLE: &'static str = "plan_sesiones";
}

impl PlannedSession {
    pub fn sort_key(&self) -> String {
        sort_key(self.date, self.time)
    }
}

/// `YYYY-MM-DD HH:MM:SS`, with the sentinel standing in for a missing time so
/// that untimed sessions land last within their day.
pub fn sort_key(date: NaiveDate, time: Option<NaiveTime>) -> String {
    let time = match time {
        Some(time) => time.format("%H:%M:%S").to_string(),
        None => UNTIMED_SORT_SENTINEL.to_string(),
    };
    format!(
        "{:04}-{:02}-{:02} {}",
        date.year(),
        date.month(),
        date.day(),
        time
    )
}

pub fn sort_sessions(sessions: &mut [PlannedSession]) {
    sessions.sort_by_cached_key(PlannedSession::sort_key);
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPlannedSession {
    pub user_id: Uuid,
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "hora", skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(rename = "titulo", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "notas", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedSessionExercise {
    pub id: Uuid,
    #[serde(rename = "sesion_id")]
    pub session_id: Uuid,
    #[serde(rename = "ejercicio_id")]
    pub exercise_id: Uuid,
    #[serde(rename = "orden")]
    pub position: i32,
    #[serde(rename = "series", default)]
    pub sets: Option<i32>,
    #[serde(rename = "repeticiones", default)]
    pub reps: Option<i32>,
    #[serde(rename = "descanso_segundos", default)]
    pub rest_seconds: Option<i32>,
}

impl Entity for PlannedSessionExercise {
    const TABLE: &'static str = "plan_sesion_ejercicios";
}
