//! End-to-end scenarios for the signup + TOTP setup flow.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use konfirmi::setup::EmptyDirectory;
use konfirmi::totp::{SESSION_KEY_SECRET, SESSION_KEY_URI};
use konfirmi::{
    FixedClock, Secret, SessionStore, SessionValue, SetupConfig, SetupFlow, SignupForm,
    SignupOutcome, TotpConfig, TotpEngine,
};

const NOW_MILLIS: u64 = 1_700_000_000_000;

fn fixture() -> (SetupFlow, Arc<SessionStore>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(NOW_MILLIS));
    let sessions = Arc::new(SessionStore::with_clock(clock.clone()));
    let flow = SetupFlow::new(
        TotpEngine::new(TotpConfig::default()),
        Arc::clone(&sessions),
        Arc::new(EmptyDirectory),
        SetupConfig::new("TOTP demo app"),
    );
    (flow, sessions, clock)
}

fn enrolled_page(flow: &SetupFlow, form: &SignupForm) -> Result<konfirmi::SetupPage> {
    match flow.submit(form)? {
        SignupOutcome::Enrolled(page) => Ok(page),
        SignupOutcome::Invalid { reason, .. } => anyhow::bail!("signup rejected: {reason}"),
    }
}

#[test]
fn signup_then_verify_a_code_from_the_displayed_secret() -> Result<()> {
    let (flow, _sessions, _clock) = fixture();
    let engine = TotpEngine::new(TotpConfig::default());

    let form = SignupForm::new("alice", "correct horse battery", "correct horse battery");
    let page = enrolled_page(&flow, &form)?;

    // The page carries everything an authenticator app needs.
    let displayed = page.secret.expect("displayed secret");
    let uri = page.enrollment_uri.expect("enrollment URI");
    assert!(uri.contains(&displayed));

    // A code computed from the displayed secret verifies, exactly as a
    // phone app would produce it.
    let secret = engine.decode_secret(&displayed)?;
    let code = engine.compute_code(&secret, engine.time_step(NOW_MILLIS));
    assert!(engine.verify_code(&secret, &code, NOW_MILLIS, 1)?);
    Ok(())
}

#[test]
fn verify_is_self_consistent_for_any_window() -> Result<()> {
    let engine = TotpEngine::new(TotpConfig::default());
    let secret = engine.decode_secret("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ")?;

    for window in 0..=3 {
        let code = engine.compute_code(&secret, engine.time_step(NOW_MILLIS));
        assert!(engine.verify_code(&secret, &code, NOW_MILLIS, window)?);
    }
    Ok(())
}

#[test]
fn verify_rejects_codes_beyond_the_window() -> Result<()> {
    let engine = TotpEngine::new(TotpConfig::default());
    let secret = engine.decode_secret("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ")?;
    let step = engine.time_step(NOW_MILLIS);

    for window in 0..=2u64 {
        let beyond = engine.compute_code(&secret, step + window + 1);
        assert!(!engine.verify_code(&secret, &beyond, NOW_MILLIS, window)?);
        let behind = engine.compute_code(&secret, step - window - 1);
        assert!(!engine.verify_code(&secret, &behind, NOW_MILLIS, window)?);
    }
    Ok(())
}

#[test]
fn demo_offsets_yield_distinct_codes_for_the_reference_secret() -> Result<()> {
    // Offsets 0, +6 (three minutes), +120 (one hour) for a fixed secret and
    // fixed time must not collide.
    let engine = TotpEngine::new(TotpConfig::default());
    let secret = Secret::from_bytes(b"12345678901234567890".to_vec())?;
    let step = engine.time_step(NOW_MILLIS);

    let current = engine.compute_code(&secret, step);
    let three_minutes = engine.compute_code(&secret, step + 6);
    let hour = engine.compute_code(&secret, step + 120);
    assert_ne!(current, three_minutes);
    assert_ne!(current, hour);
    assert_ne!(three_minutes, hour);
    Ok(())
}

#[test]
fn pending_setup_expires_with_its_session() -> Result<()> {
    let (flow, sessions, clock) = fixture();

    let form = SignupForm::new("bob", "a fine password", "a fine password");
    let page = enrolled_page(&flow, &form)?;
    let key = page.session_key.expect("session key");
    assert!(sessions.get(Some(&key)).is_some());

    // Default TTL is 30 minutes; at the expiry instant the setup is gone
    // and the visitor starts over with a blank form.
    clock.advance(30 * 60 * 1_000);
    assert!(sessions.get(Some(&key)).is_none());
    assert_eq!(flow.begin(Some(&key)), flow.begin(None));
    Ok(())
}

#[test]
fn session_scenario_put_then_get_by_key() -> Result<()> {
    let clock = Arc::new(FixedClock::new(NOW_MILLIS));
    let sessions = SessionStore::with_clock(clock.clone());

    let session = sessions.create(Duration::from_secs(30 * 60))?;
    session.put("secret", SessionValue::Bytes(vec![0xAB; 20]));

    let fetched = sessions
        .get(Some(session.session_key()))
        .expect("session is live");
    assert_eq!(fetched.bytes("secret"), Some(vec![0xAB; 20]));
    Ok(())
}

#[test]
fn rejected_signup_round_trips_through_the_err_redirect() -> Result<()> {
    let (flow, sessions, _clock) = fixture();

    let outcome = flow.submit(&SignupForm::new("carol", "short", "short"))?;
    let (reason, key) = match outcome {
        SignupOutcome::Invalid {
            reason,
            redirect_key,
        } => (reason, redirect_key),
        SignupOutcome::Enrolled(_) => anyhow::bail!("short password accepted"),
    };
    assert_eq!(
        reason.to_string(),
        "Passwords need to be at least 8 characters long."
    );

    // No secret was generated for the rejected attempt.
    let parked = sessions.get(Some(&key)).expect("error session is live");
    assert!(parked.bytes(SESSION_KEY_SECRET).is_none());
    assert!(parked.text(SESSION_KEY_URI).is_none());

    // Following the redirect re-renders the form with the message.
    let page = flow.begin(Some(&key));
    assert_eq!(page.error.as_deref(), Some(reason.to_string().as_str()));
    assert_eq!(page.secret, None);
    Ok(())
}

#[test]
fn setup_page_serializes_for_the_template_layer() -> Result<()> {
    let (flow, _sessions, _clock) = fixture();
    let page = enrolled_page(
        &flow,
        &SignupForm::new("dave", "a fine password", "a fine password"),
    )?;

    let json = serde_json::to_value(&page)?;
    assert!(json["enrollment_uri"]
        .as_str()
        .is_some_and(|uri| uri.starts_with("otpauth://totp/")));
    assert!(json["session_key"].as_str().is_some());
    assert!(json["secret"].as_str().is_some());
    assert!(json["error"].is_null());
    Ok(())
}
