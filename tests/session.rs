use std::fs;

use assert_matches::assert_matches;

use neid_archive::error::NeidError;
use neid_archive::session::{LoginClient, LoginOutcome, Session, login};

/// Stands in for the login endpoint; hands out a fresh cookie per call.
#[derive(Default)]
struct CountingLogin {
    calls: std::sync::Mutex<usize>,
}

impl LoginClient for CountingLogin {
    fn login(&self, userid: &str, password: &str) -> Result<LoginOutcome, NeidError> {
        if password != "pielemonquietyellow" {
            return Ok(LoginOutcome {
                status: "error".to_string(),
                msg: format!("invalid password for {userid}"),
                cookies: Vec::new(),
                raw_body: "{\"status\": \"error\"}".to_string(),
            });
        }
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        Ok(LoginOutcome {
            status: "ok".to_string(),
            msg: format!("Successfully login as {userid}"),
            cookies: vec![format!("neidsession=token-{calls}")],
            raw_body: "{\"status\": \"ok\", \"msg\": \"Successfully login\"}".to_string(),
        })
    }
}

#[test]
fn repeated_logins_yield_independent_cookie_files() {
    let temp = tempfile::tempdir().unwrap();
    let client = CountingLogin::default();
    let first_path = temp.path().join("first.cookie");
    let second_path = temp.path().join("second.cookie");

    let first = login(&client, "obs", "pielemonquietyellow", &first_path, None).unwrap();
    let second = login(&client, "obs", "pielemonquietyellow", &second_path, None).unwrap();

    let loaded_first = Session::load(&first_path).unwrap();
    let loaded_second = Session::load(&second_path).unwrap();
    assert_eq!(loaded_first, first);
    assert_eq!(loaded_second, second);
    assert_ne!(loaded_first.cookie_header(), loaded_second.cookie_header());
}

#[test]
fn relogin_overwrites_the_cookie_file() {
    let temp = tempfile::tempdir().unwrap();
    let client = CountingLogin::default();
    let cookiepath = temp.path().join("neid.cookie");

    login(&client, "obs", "pielemonquietyellow", &cookiepath, None).unwrap();
    let first_content = fs::read_to_string(&cookiepath).unwrap();
    login(&client, "obs", "pielemonquietyellow", &cookiepath, None).unwrap();
    let second_content = fs::read_to_string(&cookiepath).unwrap();

    assert_ne!(first_content, second_content);
    assert_eq!(
        Session::load(&cookiepath).unwrap().cookie_header(),
        "neidsession=token-2"
    );
}

#[test]
fn bad_password_leaves_no_cookie_file() {
    let temp = tempfile::tempdir().unwrap();
    let client = CountingLogin::default();
    let cookiepath = temp.path().join("neid.cookie");

    let err = login(&client, "obs", "wrong", &cookiepath, None).unwrap_err();
    assert_matches!(err, NeidError::Authentication(msg) if msg.contains("invalid password"));
    assert!(!cookiepath.exists());
}

#[test]
fn debugfile_captures_raw_login_response() {
    let temp = tempfile::tempdir().unwrap();
    let client = CountingLogin::default();
    let cookiepath = temp.path().join("neid.cookie");
    let debugfile = temp.path().join("login.debug");

    login(
        &client,
        "obs",
        "pielemonquietyellow",
        &cookiepath,
        Some(&debugfile),
    )
    .unwrap();

    let raw = fs::read_to_string(&debugfile).unwrap();
    assert!(raw.contains("\"status\": \"ok\""));
}
