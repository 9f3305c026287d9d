mod common;

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use fitsocial::models::{ExerciseType, NewPlannedSession, PlannedSessionExercise};
use fitsocial::{AppState, AuthError, AuthState, RemoteCollection, RemoteErrorKind, TableBackend};
use serde_json::json;
use uuid::Uuid;

use common::{id, local_app, signed_in_app, Flaky, BENCH_PRESS, ROWING, SQUAT};

#[tokio::test]
async fn sign_up_stores_lowercased_username_under_the_session_user() {
    let (app, user_id) = signed_in_app().await;

    assert_eq!(app.session.state(), AuthState::Authenticated { user_id });
    assert_eq!(app.identity.current_user(), Some(user_id));

    let profile = app.profiles.load_own().await.unwrap().unwrap();
    assert_eq!(profile.id, user_id);
    assert_eq!(profile.username, "runnerana");
    assert!(profile.links.is_empty());
}

#[tokio::test]
async fn failed_sign_in_leaves_the_user_signed_out() {
    let (app, _) = local_app();
    app.session
        .sign_up("ana@example.com", "secret-pw", "ana")
        .await
        .unwrap();
    app.session.sign_out().await;

    let err = app
        .session
        .sign_in("ana@example.com", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials);
    assert_eq!(app.session.state(), AuthState::Unauthenticated);
    assert_eq!(app.identity.current_user(), None);

    let user_id = app
        .session
        .sign_in("ANA@example.com ", "secret-pw")
        .await
        .unwrap();
    assert_eq!(app.identity.current_user(), Some(user_id));
}

#[tokio::test]
async fn failed_account_switch_keeps_the_previous_user() {
    let (app, user_id) = signed_in_app().await;

    let err = app
        .session
        .sign_in("bo@example.com", "secret-pw")
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials);
    assert_eq!(app.session.state(), AuthState::Authenticated { user_id });
    assert_eq!(app.identity.current_user(), Some(user_id));
}

#[tokio::test]
async fn blank_username_is_rejected_before_any_account_exists() {
    let (app, _) = local_app();
    let err = app
        .session
        .sign_up("ana@example.com", "secret-pw", "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidInput(_)));

    // The email is still free.
    app.session
        .sign_up("ana@example.com", "secret-pw", "ana")
        .await
        .unwrap();
}

#[tokio::test]
async fn restore_picks_up_the_backend_session() {
    let (first, backend) = local_app();
    let outcome = first
        .session
        .sign_up("ana@example.com", "secret-pw", "ana")
        .await
        .unwrap();

    let second = AppState::with_backend(backend);
    assert_eq!(second.identity.current_user(), None);
    assert_eq!(second.restore().await, Some(outcome.user_id));
    assert_eq!(
        second.session.state(),
        AuthState::Authenticated {
            user_id: outcome.user_id
        }
    );
}

#[tokio::test]
async fn sign_out_clears_identity_even_when_the_remote_call_fails() {
    let app = AppState::with_backend(Arc::new(Flaky::new()));
    app.session
        .sign_up("ana@example.com", "secret-pw", "ana")
        .await
        .unwrap();
    let mut updates = app.identity.subscribe();

    app.session.sign_out().await;

    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().user_id, None);
    assert_eq!(app.session.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn favorites_track_the_server_set() {
    let (app, _) = signed_in_app().await;
    app.exercises.load(ExerciseType::Strength).await.unwrap();

    let names: Vec<String> = app
        .exercises
        .exercises_of(ExerciseType::Strength)
        .into_iter()
        .map(|exercise| exercise.name)
        .collect();
    assert_eq!(
        names,
        ["Dominadas", "Peso muerto", "Press de banca", "Sentadilla"]
    );

    assert!(app.exercises.toggle_favorite(id(SQUAT)).await.unwrap());
    assert!(app.exercises.toggle_favorite(id(BENCH_PRESS)).await.unwrap());
    assert!(app.exercises.is_favorite(id(SQUAT)));

    let local = app.exercises.snapshot().favorite_ids;
    app.exercises.refresh_favorites().await.unwrap();
    assert_eq!(app.exercises.snapshot().favorite_ids, local);

    let favorites: Vec<String> = app
        .exercises
        .favorites()
        .into_iter()
        .map(|exercise| exercise.name)
        .collect();
    assert_eq!(favorites, ["Press de banca", "Sentadilla"]);
}

#[tokio::test]
async fn toggling_twice_restores_the_original_membership() {
    let (app, _) = signed_in_app().await;
    let squat = id(SQUAT);

    assert!(app.exercises.toggle_favorite(squat).await.unwrap());
    assert!(!app.exercises.toggle_favorite(squat).await.unwrap());
    assert!(!app.exercises.is_favorite(squat));

    app.exercises.refresh_favorites().await.unwrap();
    assert!(app.exercises.snapshot().favorite_ids.is_empty());
}

#[tokio::test]
async fn failed_toggle_keeps_the_local_set() {
    let backend = Arc::new(Flaky::new());
    let app = AppState::with_backend(backend.clone());
    app.session
        .sign_up("ana@example.com", "secret-pw", "ana")
        .await
        .unwrap();

    backend.fail(true);
    let err = app.exercises.toggle_favorite(id(ROWING)).await.unwrap_err();
    assert_eq!(err.kind, RemoteErrorKind::Network);
    assert!(!app.exercises.is_favorite(id(ROWING)));
    assert!(app.exercises.snapshot().error_message.is_some());
}

#[tokio::test]
async fn failed_load_keeps_previous_lists() {
    let backend = Arc::new(Flaky::new());
    let app = AppState::with_backend(backend.clone());
    app.session
        .sign_up("ana@example.com", "secret-pw", "ana")
        .await
        .unwrap();
    app.exercises.load(ExerciseType::Cardio).await.unwrap();
    app.quick_workouts.load_types().await.unwrap();
    let before = app.exercises.exercises_of(ExerciseType::Cardio);
    assert_eq!(before.len(), 2);

    backend.fail(true);
    assert!(app.exercises.load(ExerciseType::Cardio).await.is_err());
    assert!(app.quick_workouts.load_types().await.is_err());

    assert_eq!(app.exercises.exercises_of(ExerciseType::Cardio), before);
    assert!(app.exercises.snapshot().error_message.is_some());
    let workouts = app.quick_workouts.snapshot();
    assert_eq!(workouts.types.len(), 6);
    assert!(workouts.error_message.is_some());

    backend.fail(false);
    app.quick_workouts.load_types().await.unwrap();
    assert_eq!(app.quick_workouts.snapshot().error_message, None);
}

#[tokio::test]
async fn favorites_need_a_signed_in_user() {
    let (app, _) = local_app();
    let err = app.exercises.toggle_favorite(id(SQUAT)).await.unwrap_err();
    assert_eq!(err.kind, RemoteErrorKind::Unauthorized);
}

#[tokio::test]
async fn quick_workout_types_follow_sort_order() {
    let (app, _) = local_app();
    app.quick_workouts.load_types().await.unwrap();
    let slugs: Vec<String> = app
        .quick_workouts
        .snapshot()
        .types
        .into_iter()
        .map(|workout| workout.slug)
        .collect();
    assert_eq!(
        slugs,
        ["correr", "caminar", "bicicleta", "natacion", "hiit", "yoga"]
    );
}

#[tokio::test]
async fn zero_length_session_ends_when_it_started() {
    let (app, user_id) = signed_in_app().await;
    app.quick_workouts.load_types().await.unwrap();
    let run = app.quick_workouts.snapshot().types[0].clone();

    let session = app
        .quick_workouts
        .start_session(&run, user_id)
        .await
        .unwrap();
    assert_eq!(session.user_id, user_id);
    assert_eq!(session.type_id, run.id);
    assert!(!session.is_finished());
    assert_eq!(
        app.quick_workouts.active().map(|active| active.session.id),
        Some(session.id)
    );

    app.quick_workouts
        .finish_session(session.id, 0, None, None)
        .await
        .unwrap();
    assert_eq!(app.quick_workouts.active(), None);

    let history = app.quick_workouts.history(user_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].ended_at, Some(session.started_at));
    assert_eq!(history[0].duration_seconds, 0);
}

#[tokio::test]
async fn second_finish_overwrites_duration_but_keeps_unsent_metrics() {
    let (app, user_id) = signed_in_app().await;
    app.quick_workouts.load_types().await.unwrap();
    let ride = app.quick_workouts.snapshot().types[2].clone();
    let session = app
        .quick_workouts
        .start_session(&ride, user_id)
        .await
        .unwrap();

    app.quick_workouts
        .finish_session(session.id, 600, Some(180), Some(5200.5))
        .await
        .unwrap();
    app.quick_workouts
        .finish_session(session.id, 660, None, None)
        .await
        .unwrap();

    let stored = &app.quick_workouts.history(user_id).await.unwrap()[0];
    assert_eq!(stored.duration_seconds, 660);
    assert_eq!(stored.calories, Some(180));
    assert_eq!(stored.distance_meters, Some(5200.5));
    assert!(stored.ended_at.unwrap() >= stored.started_at);
}

#[tokio::test]
async fn scoped_reads_fail_when_signed_out() {
    let (app, _) = local_app();
    let err = app.plan.load(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind, RemoteErrorKind::Unauthorized);
    assert!(app.plan.snapshot().error_message.is_some());

    let err = app.quick_workouts.history(Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn plan_lists_timed_sessions_before_untimed_ones() {
    let (app, user_id) = signed_in_app().await;
    let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    let next_day = day.succ_opt().unwrap();

    for (date, time, title) in [
        (next_day, None, "Movilidad"),
        (day, None, "Libre"),
        (day, NaiveTime::from_hms_opt(8, 0, 0), "Pierna"),
    ] {
        app.plan
            .schedule(&NewPlannedSession {
                user_id,
                date,
                time,
                title: Some(title.to_string()),
                notes: None,
            })
            .await
            .unwrap();
    }

    let titles = |sessions: Vec<fitsocial::models::PlannedSession>| -> Vec<String> {
        sessions
            .into_iter()
            .filter_map(|session| session.title)
            .collect()
    };
    assert_eq!(
        titles(app.plan.snapshot().sessions),
        ["Pierna", "Libre", "Movilidad"]
    );

    app.plan.load(user_id).await.unwrap();
    assert_eq!(
        titles(app.plan.snapshot().sessions),
        ["Pierna", "Libre", "Movilidad"]
    );
}

#[tokio::test]
async fn plan_entries_come_back_in_position_order_and_go_with_their_session() {
    let (app, backend) = local_app();
    let outcome = app
        .session
        .sign_up("ana@example.com", "secret-pw", "ana")
        .await
        .unwrap();

    let session = app
        .plan
        .schedule(&NewPlannedSession {
            user_id: outcome.user_id,
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            time: None,
            title: None,
            notes: None,
        })
        .await
        .unwrap();

    let tables: Arc<dyn TableBackend> = backend;
    let entries = RemoteCollection::<PlannedSessionExercise>::new(tables);
    for (position, exercise) in [(2, BENCH_PRESS), (1, SQUAT)] {
        entries
            .insert_silent(&json!({
                "sesion_id": session.id,
                "ejercicio_id": exercise,
                "orden": position,
                "series": 4,
                "repeticiones": 8,
            }))
            .await
            .unwrap();
    }

    let listed = app.plan.exercises_for(session.id).await.unwrap();
    let order: Vec<Uuid> = listed.iter().map(|entry| entry.exercise_id).collect();
    assert_eq!(order, [id(SQUAT), id(BENCH_PRESS)]);
    assert_eq!(listed[0].sets, Some(4));

    app.plan.remove(session.id).await.unwrap();
    assert!(app.plan.snapshot().sessions.is_empty());
    assert!(app.plan.exercises_for(session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn profile_search_matches_substrings_case_insensitively() {
    let (app, _) = local_app();
    app.session
        .sign_up("ana@example.com", "secret-pw", "RunnerAna")
        .await
        .unwrap();
    app.session.sign_out().await;
    app.session
        .sign_up("bo@example.com", "secret-pw", "CyclistBo")
        .await
        .unwrap();

    let found = app.profiles.search("  RUNNER ").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].username, "runnerana");

    assert_eq!(app.profiles.search("").await.unwrap(), Vec::new());
    assert_eq!(app.profiles.search("o").await.unwrap().len(), 1);

    let own = app.profiles.load_own().await.unwrap().unwrap();
    assert_eq!(own.username, "cyclistbo");
}

#[tokio::test]
async fn next_user_starts_from_their_own_favorites_plan_and_timer() {
    let (app, _) = local_app();
    let ana = app
        .session
        .sign_up("ana@example.com", "secret-pw", "ana")
        .await
        .unwrap()
        .user_id;
    assert!(app.exercises.toggle_favorite(id(SQUAT)).await.unwrap());
    app.plan
        .schedule(&NewPlannedSession {
            user_id: ana,
            date: NaiveDate::from_ymd_opt(2026, 10, 22).unwrap(),
            time: None,
            title: Some("Pierna".into()),
            notes: None,
        })
        .await
        .unwrap();
    app.quick_workouts.load_types().await.unwrap();
    let run = app.quick_workouts.snapshot().types[0].clone();
    app.quick_workouts.start_session(&run, ana).await.unwrap();
    app.session.sign_out().await;

    let bo = app
        .session
        .sign_up("bo@example.com", "secret-pw", "bo")
        .await
        .unwrap()
        .user_id;

    assert!(!app.exercises.is_favorite(id(SQUAT)));
    assert_eq!(app.exercises.snapshot().owner, Some(bo));
    assert!(app.plan.snapshot().sessions.is_empty());
    assert_eq!(app.quick_workouts.active(), None);

    assert!(app.exercises.toggle_favorite(id(SQUAT)).await.unwrap());
    app.exercises.refresh_favorites().await.unwrap();
    assert!(app.exercises.is_favorite(id(SQUAT)));
}

#[tokio::test]
async fn profile_failure_after_sign_up_keeps_the_session() {
    let (app, _) = local_app();
    app.session
        .sign_up("ana@example.com", "secret-pw", "Ana")
        .await
        .unwrap();
    app.session.sign_out().await;

    let outcome = app
        .session
        .sign_up("other@example.com", "secret-pw", "ana")
        .await
        .unwrap();

    assert!(outcome.profile_error.is_some());
    assert_eq!(
        app.session.state(),
        AuthState::Authenticated {
            user_id: outcome.user_id
        }
    );
    assert_eq!(app.profiles.load_own().await.unwrap(), None);
}
