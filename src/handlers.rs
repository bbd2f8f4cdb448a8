use crate::auth::{self, clear_session_cookie, session_cookie, today_for, CurrentUser, LoginPolicy};
use crate::counter::{apply_delta, progress};
use crate::errors::{AppError, AuthError, FieldErrors};
use crate::history::{build_series, date_key, parse_date, record_list};
use crate::models::{
    AccountResponse, AccountUpdate, CountChangeRequest, CountResetRequest, CountResponse, DateQuery,
    DeleteAccountRequest, ForgotPasswordRequest, HistoryList, HistoryQuery, HistorySeries, LoginRequest,
    LoginResponse, MessageResponse, Preferences, PreferencesUpdate, RegisterRequest, RegisterResponse,
    ResetPasswordRequest, SessionResponse, Store, TokenRequest,
};
use crate::state::AppState;
use crate::storage::commit;
use crate::ui::{render_app, render_login, AppPage};
use crate::validation::{check_goal, check_password, validate_account_update, validate_registration};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect},
    Json,
};
use chrono::Utc;
use tracing::info;

pub async fn index(State(state): State<AppState>, user: Option<CurrentUser>) -> Html<String> {
    let Some(user) = user else {
        return Html(render_login());
    };

    let store = state.store.lock().await;
    let Some(profile) = store.profile(&user.id) else {
        return Html(render_login());
    };
    let date = date_key(today_for(&store, &user.id));
    let count = store.count_for(&user.id, &date);
    let goal = profile.preferences.goal;

    Html(render_app(&AppPage {
        name: &profile.name,
        date: &date,
        count,
        goal,
        progress: progress(count, goal),
        theme: profile.preferences.theme,
    }))
}

pub async fn session_info(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<SessionResponse>, AppError> {
    let store = state.store.lock().await;
    let profile = store
        .profile(&user.id)
        .ok_or(AuthError::NotAuthenticated)?;

    Ok(Json(SessionResponse {
        user_id: user.id.clone(),
        name: profile.name.clone(),
        email: profile.email.clone(),
        today: date_key(today_for(&store, &user.id)),
        goal: profile.preferences.goal,
        theme: profile.preferences.theme,
    }))
}

// ---- registration & login ----

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let form = validate_registration(&payload, state.config.default_goal)
        .map_err(AppError::invalid_fields)?;
    let email = form.email.clone();
    let digest = auth::digest_off_thread(payload.password).await?;

    let registered = {
        let mut store = state.store.lock().await;
        let mut next = store.clone();
        let registered = auth::register(&mut next, form, digest, Utc::now())?;
        commit(&state.config.data_path, &mut store, next).await?;
        registered
    };

    info!(to = %email, token = %registered.verification_token, "sending verification email");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: registered.user_id,
            message: "Signed up! Verify your email before signing in.".into(),
            verification_token: state
                .config
                .expose_tokens
                .then_some(registered.verification_token),
        }),
    ))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let mut store = state.store.lock().await;
    let mut next = store.clone();
    auth::verify_email(&mut next, &payload.token)?;
    commit(&state.config.data_path, &mut store, next).await?;
    Ok(Json(MessageResponse::new("Email verified, you can sign in now")))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("Fill in all fields"));
    }

    let salt = {
        let store = state.store.lock().await;
        auth::salt_for_email(&store, &payload.email).ok_or(AuthError::WrongCredentials)?
    };
    let candidate = auth::candidate_off_thread(salt, payload.password).await?;

    let user_id = {
        let mut store = state.store.lock().await;
        let mut next = store.clone();
        let outcome = auth::login(&mut next, &login_policy(&state), &payload.email, &candidate, Utc::now());
        commit(&state.config.data_path, &mut store, next).await?;
        outcome?
    };

    let token = state.sessions.lock().await.issue(&user_id, Utc::now());
    info!(user_id = %user_id, "signed in");

    Ok((
        [(header::SET_COOKIE, session_cookie(&token, state.config.session_ttl))],
        Json(LoginResponse { token, user_id }),
    ))
}

fn login_policy(state: &AppState) -> LoginPolicy {
    LoginPolicy {
        max_failed_logins: state.config.max_failed_logins,
        lockout: state.config.lockout,
    }
}

pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> impl IntoResponse {
    state.sessions.lock().await.revoke(&user.token);
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse::new("Signed out")),
    )
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = payload.email.trim();
    if email.is_empty() {
        return Err(AppError::bad_request("Enter your email first"));
    }

    let mut store = state.store.lock().await;
    let mut next = store.clone();
    let token = auth::request_password_reset(&mut next, email);
    if let Some(token) = &token {
        commit(&state.config.data_path, &mut store, next).await?;
        info!(to = %email, token = %token, "sending password reset email");
    }

    let mut response = MessageResponse::new("If that email has an account, we sent you a link to reset the password");
    if state.config.expose_tokens {
        response.token = token;
    }
    Ok(Json(response))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if let Err(message) = check_password(&payload.password, &[]) {
        return Err(AppError::invalid_fields(FieldErrors::from([("password", message)])));
    }

    let digest = auth::digest_off_thread(payload.password).await?;

    let user_id = {
        let mut store = state.store.lock().await;
        let mut next = store.clone();
        let user_id = auth::reset_password(&mut next, &payload.token, digest)?;
        commit(&state.config.data_path, &mut store, next).await?;
        user_id
    };
    state.sessions.lock().await.revoke_user(&user_id);

    Ok(Json(MessageResponse::new("Password updated, sign in again")))
}

// ---- daily counter ----

fn resolve_date(store: &Store, user_id: &str, raw: Option<&str>) -> Result<String, AppError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => parse_date(raw)
            .map(date_key)
            .ok_or_else(|| AppError::bad_request("date must be YYYY-MM-DD")),
        None => Ok(date_key(today_for(store, user_id))),
    }
}

fn goal_for(state: &AppState, store: &Store, user_id: &str) -> u32 {
    store
        .profile(user_id)
        .map(|profile| profile.preferences.goal)
        .unwrap_or(state.config.default_goal)
}

fn count_response(state: &AppState, store: &Store, user_id: &str, date: String) -> CountResponse {
    let count = store.count_for(user_id, &date);
    let goal = goal_for(state, store, user_id);
    CountResponse {
        date,
        count,
        goal,
        progress: progress(count, goal),
    }
}

pub async fn get_count(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<CountResponse>, AppError> {
    let store = state.store.lock().await;
    let date = resolve_date(&store, &user.id, query.date.as_deref())?;
    Ok(Json(count_response(&state, &store, &user.id, date)))
}

pub async fn change_count(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CountChangeRequest>,
) -> Result<Json<CountResponse>, AppError> {
    let response = apply_change(&state, &user, payload.date.as_deref(), payload.delta).await?;
    Ok(Json(response))
}

pub async fn reset_count(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CountResetRequest>,
) -> Result<Json<CountResponse>, AppError> {
    if !payload.confirm {
        return Err(AppError::bad_request("Resetting the day must be confirmed"));
    }

    let mut store = state.store.lock().await;
    let date = resolve_date(&store, &user.id, payload.date.as_deref())?;
    let mut next = store.clone();
    next.merge_count(&user.id, &date, 0);
    commit(&state.config.data_path, &mut store, next).await?;
    info!(user_id = %user.id, date = %date, "count reset");

    Ok(Json(count_response(&state, &store, &user.id, date)))
}

pub async fn increment_form(State(state): State<AppState>, user: CurrentUser) -> Result<Redirect, AppError> {
    apply_change(&state, &user, None, 1).await?;
    Ok(Redirect::to("/"))
}

pub async fn decrement_form(State(state): State<AppState>, user: CurrentUser) -> Result<Redirect, AppError> {
    apply_change(&state, &user, None, -1).await?;
    Ok(Redirect::to("/"))
}

async fn apply_change(
    state: &AppState,
    user: &CurrentUser,
    date: Option<&str>,
    delta: i64,
) -> Result<CountResponse, AppError> {
    let mut store = state.store.lock().await;
    let date = resolve_date(&store, &user.id, date)?;
    let updated = apply_delta(store.count_for(&user.id, &date), delta);
    let mut next = store.clone();
    next.merge_count(&user.id, &date, updated);
    commit(&state.config.data_path, &mut store, next).await?;

    Ok(count_response(state, &store, &user.id, date))
}

// ---- history ----

pub async fn get_history(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistorySeries>, AppError> {
    let store = state.store.lock().await;
    let anchor = match query.date.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => parse_date(raw).ok_or_else(|| AppError::bad_request("date must be YYYY-MM-DD"))?,
        None => today_for(&store, &user.id),
    };
    let goal = goal_for(&state, &store, &user.id);

    Ok(Json(build_series(query.view, anchor, store.records.get(&user.id), goal)))
}

pub async fn get_history_records(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<HistoryList>, AppError> {
    let store = state.store.lock().await;
    let goal = goal_for(&state, &store, &user.id);
    let today = today_for(&store, &user.id);
    Ok(Json(record_list(today, store.records.get(&user.id), goal)))
}

// ---- preferences ----

pub async fn get_preferences(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Preferences>, AppError> {
    let store = state.store.lock().await;
    let profile = store
        .profile(&user.id)
        .ok_or_else(|| AppError::not_found("profile not found"))?;
    Ok(Json(profile.preferences.clone()))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<PreferencesUpdate>,
) -> Result<Json<Preferences>, AppError> {
    if let Some(goal) = payload.goal {
        check_goal(goal).map_err(|message| AppError::invalid_fields(FieldErrors::from([("goal", message)])))?;
    }

    let mut store = state.store.lock().await;
    let mut next = store.clone();
    let profile = next
        .profiles
        .get_mut(&user.id)
        .ok_or_else(|| AppError::not_found("profile not found"))?;
    if let Some(goal) = payload.goal {
        profile.preferences.goal = goal;
    }
    if let Some(theme) = payload.theme {
        profile.preferences.theme = theme;
    }
    let preferences = profile.preferences.clone();

    commit(&state.config.data_path, &mut store, next).await?;
    Ok(Json(preferences))
}

// ---- account ----

pub async fn get_account(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<AccountResponse>, AppError> {
    let store = state.store.lock().await;
    let profile = store
        .profile(&user.id)
        .ok_or_else(|| AppError::not_found("profile not found"))?;
    Ok(Json(AccountResponse::from(profile)))
}

pub async fn update_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<AccountUpdate>,
) -> Result<Json<AccountResponse>, AppError> {
    validate_account_update(&payload).map_err(AppError::invalid_fields)?;
    let email = payload.email.trim().to_string();

    let mut store = state.store.lock().await;
    if store.email_taken(&email, Some(&user.id)) {
        return Err(AuthError::EmailInUse.into());
    }
    let mut next = store.clone();
    if let Some(account) = next.accounts.get_mut(&user.id) {
        account.email = email.clone();
    }
    let profile = next
        .profiles
        .get_mut(&user.id)
        .ok_or_else(|| AppError::not_found("profile not found"))?;
    profile.name = payload.name.trim().to_string();
    profile.surname = payload.surname.trim().to_string();
    profile.email = email;
    let response = AccountResponse::from(&*profile);

    commit(&state.config.data_path, &mut store, next).await?;
    Ok(Json(response))
}

pub async fn delete_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<DeleteAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !payload.confirm {
        return Err(AppError::bad_request("Account deletion must be confirmed"));
    }
    if payload.password.is_empty() {
        return Err(AppError::bad_request("Your password is required to delete the account."));
    }

    let salt = {
        let store = state.store.lock().await;
        auth::salt_for_user(&store, &user.id).ok_or(AuthError::NotAuthenticated)?
    };
    let candidate = auth::candidate_off_thread(salt, payload.password).await?;

    {
        let mut store = state.store.lock().await;
        let mut next = store.clone();
        let outcome = auth::reauthenticate(&mut next, &login_policy(&state), &user.id, &candidate, Utc::now());
        if outcome.is_ok() {
            next.delete_user(&user.id);
        }
        commit(&state.config.data_path, &mut store, next).await?;
        outcome?;
    }
    state.sessions.lock().await.revoke_user(&user.id);

    Ok((
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse::new("Account deleted")),
    ))
}
