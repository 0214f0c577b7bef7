// SPDX-License-Identifier: Apache-2.0

//! Kerberos login guard
//!
//! Keytab logins reconfigure process-global security state and are not safe to
//! run concurrently. Every login goes through `serialized_login`, which holds
//! a single process-wide lock for the duration of the call. Other credential
//! flows never take this lock.

use parking_lot::Mutex;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument};

use crate::engine::auth::credential::KerberosPrincipalContext;
use crate::engine::error::{EngineError, EngineResult};

/// Login primitive backed by a keytab file
pub trait KerberosLogin: Send + Sync {
    fn login_with_keytab(
        &self,
        principal: &str,
        keytab_path: &Path,
    ) -> EngineResult<KerberosPrincipalContext>;
}

fn login_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn principal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s/@]+(/[^\s/@]+)?(@[^\s/@]+)?$").expect("static principal pattern")
    })
}

pub fn validate_principal(principal: &str) -> EngineResult<()> {
    if principal_pattern().is_match(principal) {
        Ok(())
    } else {
        Err(EngineError::configuration(format!(
            "'{}' is not a valid Kerberos principal",
            principal
        )))
    }
}

/// Runs `login` while holding the process-wide Kerberos lock.
///
/// Blocking; async callers should run it on a blocking thread.
#[instrument(skip(login, keytab_path), fields(principal = %principal))]
pub fn serialized_login(
    login: &dyn KerberosLogin,
    principal: &str,
    keytab_path: &Path,
) -> EngineResult<KerberosPrincipalContext> {
    validate_principal(principal)?;
    let _guard = login_lock().lock();
    debug!("Acquired Kerberos login lock");
    login.login_with_keytab(principal, keytab_path)
}

/// Default login: checks the keytab is a readable, non-empty file and
/// records the principal as authenticated.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeytabFileLogin;

impl KerberosLogin for KeytabFileLogin {
    fn login_with_keytab(
        &self,
        principal: &str,
        keytab_path: &Path,
    ) -> EngineResult<KerberosPrincipalContext> {
        let metadata = fs::metadata(keytab_path).map_err(|e| {
            EngineError::credential_acquisition(format!(
                "Unable to open keytab for principal '{}': {}",
                principal, e
            ))
        })?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(EngineError::credential_acquisition(format!(
                "Keytab for principal '{}' is empty or not a file",
                principal
            )));
        }
        Ok(KerberosPrincipalContext::new(principal))
    }
}

/// Test double that records logins and detects overlapping calls.
#[derive(Clone, Default)]
pub struct RecordingKerberosLogin {
    in_flight: Arc<AtomicUsize>,
    overlaps: Arc<AtomicUsize>,
    logins: Arc<Mutex<Vec<String>>>,
    hold: Option<std::time::Duration>,
}

impl RecordingKerberosLogin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep inside each login so that unserialized callers would overlap.
    pub fn holding_for(mut self, hold: std::time::Duration) -> Self {
        self.hold = Some(hold);
        self
    }

    /// Principals logged in so far, in order
    pub fn logins(&self) -> Vec<String> {
        self.logins.lock().clone()
    }

    /// Number of logins that started while another was still running
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

impl KerberosLogin for RecordingKerberosLogin {
    fn login_with_keytab(
        &self,
        principal: &str,
        _keytab_path: &Path,
    ) -> EngineResult<KerberosPrincipalContext> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(hold) = self.hold {
            std::thread::sleep(hold);
        }
        self.logins.lock().push(principal.to_string());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(KerberosPrincipalContext::new(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn principal_validation() {
        assert!(validate_principal("fred@EXAMPLE.COM").is_ok());
        assert!(validate_principal("svc/host.example.com@EXAMPLE.COM").is_ok());
        assert!(validate_principal("fred").is_ok());
        assert!(validate_principal("fred smith@EXAMPLE.COM").is_err());
        assert!(validate_principal("").is_err());
    }

    #[test]
    fn keytab_file_login_requires_non_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.kt");
        fs::File::create(&empty).unwrap();
        let err = KeytabFileLogin
            .login_with_keytab("fred@EXAMPLE.COM", &empty)
            .unwrap_err();
        assert!(matches!(err, EngineError::CredentialAcquisition { .. }));

        let good = dir.path().join("fred.kt");
        fs::File::create(&good).unwrap().write_all(b"\x05\x02keytab").unwrap();
        let ctx = serialized_login(&KeytabFileLogin, "fred@EXAMPLE.COM", &good).unwrap();
        assert_eq!(ctx.principal, "fred@EXAMPLE.COM");
        assert_eq!(ctx.short_name, "fred");

        let missing = KeytabFileLogin.login_with_keytab("fred", &dir.path().join("nope.kt"));
        assert!(missing.is_err());
    }

    #[test]
    fn concurrent_logins_take_turns() {
        let login = RecordingKerberosLogin::new().holding_for(Duration::from_millis(20));
        let threads: Vec<_> = (0..4)
            .map(|i| {
                let login = login.clone();
                std::thread::spawn(move || {
                    serialized_login(&login, &format!("user{}@EXAMPLE.COM", i), Path::new("unused"))
                        .unwrap();
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(login.logins().len(), 4);
        assert_eq!(login.overlaps(), 0);
    }
}
