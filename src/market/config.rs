#![allow(dead_code)]

use once_cell::sync::Lazy;
use std::env;

pub static MERCURY_ENV: Lazy<String> =
    Lazy::new(|| env::var("MERCURY_ENV").unwrap_or_else(|_| "SANDBOX".to_string()));

pub static APP_ID: Lazy<String> = Lazy::new(|| env::var("MERCURY_APP_ID").unwrap_or_default());

pub static APP_SECRET: Lazy<String> =
    Lazy::new(|| env::var("MERCURY_APP_SECRET").unwrap_or_default());

pub static MERCURY_REFRESH_TOKEN: Lazy<String> =
    Lazy::new(|| env::var("MERCURY_REFRESH_TOKEN").unwrap_or_default());

pub static ROOT: Lazy<String> = Lazy::new(|| {
    if MERCURY_ENV.as_str().eq_ignore_ascii_case("PROD") {
        "https://api.mercury.market".to_string()
    } else {
        "https://api.sandbox.mercury.market".to_string()
    }
});

pub static OAUTH_TOKEN_URL: Lazy<String> =
    Lazy::new(|| format!("{}/identity/v1/oauth2/token", *ROOT));
