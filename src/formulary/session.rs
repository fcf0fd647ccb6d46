//! # Session Context
//!
//! Tracks who is signed in and whether they hold the admin role.
//!
//! [`SessionContext`] is an owned value: the application creates one around an
//! [`AuthGateway`], calls [`SessionContext::initialize`] once, feeds it
//! [`SessionEvent`]s as the backend reports them, and calls
//! [`SessionContext::teardown`] when done. Consumers borrow it; there is no
//! process-wide auth state.
//!
//! Failure policy:
//! - sign-in errors propagate to the caller for display;
//! - sign-out errors are logged and the local state is cleared regardless;
//! - role lookup errors are logged and the user is treated as non-admin.

use crate::error::{FormularyError, Result};
use crate::gateway::AuthGateway;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

pub const ADMIN_ROLE: &str = "admin";

const SESSION_FILENAME: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: Identity,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Session transitions reported by the identity service.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

pub struct SessionContext<A: AuthGateway> {
    auth: A,
    session: Option<Session>,
    is_admin: bool,
    loading: bool,
}

impl<A: AuthGateway> SessionContext<A> {
    pub fn new(auth: A) -> Self {
        Self {
            auth,
            session: None,
            is_admin: false,
            loading: true,
        }
    }

    /// Pick up whatever session the backend already holds.
    pub fn initialize(&mut self) -> Result<()> {
        self.loading = true;
        let current = self.auth.current_session();
        self.loading = false;
        if let Some(session) = current? {
            self.apply(session);
        }
        Ok(())
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::SignedIn(session) | SessionEvent::TokenRefreshed(session) => {
                self.apply(session)
            }
            SessionEvent::SignedOut => self.clear(),
        }
        self.loading = false;
    }

    pub fn sign_in(&mut self, email: &str, password: &str) -> Result<&Identity> {
        let session = self.auth.sign_in(email, password)?;
        tracing::info!(user = %session.user.email, "signed in");
        self.handle_event(SessionEvent::SignedIn(session));
        self.user()
            .ok_or_else(|| FormularyError::Auth("Session was not retained".to_string()))
    }

    /// Signs out remotely, then clears local state even if the remote call failed.
    pub fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = self.auth.sign_out(&session) {
                tracing::warn!(error = %e, "remote sign-out failed; clearing local session anyway");
            }
        }
        self.clear();
    }

    /// Drop local state without contacting the backend.
    pub fn teardown(&mut self) {
        self.clear();
        self.loading = true;
    }

    pub fn user(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn auth(&self) -> &A {
        &self.auth
    }

    fn apply(&mut self, session: Session) {
        let same_user = self
            .session
            .as_ref()
            .is_some_and(|current| current.user.id == session.user.id);
        let user_id = session.user.id;
        self.session = Some(session);
        if !same_user || !self.is_admin {
            self.is_admin = self.check_admin_role(user_id);
        }
    }

    fn check_admin_role(&self, user_id: Uuid) -> bool {
        match self.auth.fetch_role(user_id) {
            Ok(role) => role.as_deref() == Some(ADMIN_ROLE),
            Err(e) => {
                tracing::error!(error = %e, %user_id, "failed to fetch admin role");
                false
            }
        }
    }

    fn clear(&mut self) {
        self.session = None;
        self.is_admin = false;
    }
}

/// Read the session stored in `<dir>/session.json`, if any.
pub fn load_session<P: AsRef<Path>>(dir: P) -> Result<Option<Session>> {
    let path = dir.as_ref().join(SESSION_FILENAME);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(FormularyError::Io)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Store the session in `<dir>/session.json`, readable by the owner only on unix.
pub fn save_session<P: AsRef<Path>>(dir: P, session: &Session) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(FormularyError::Io)?;
    let content = serde_json::to_string_pretty(session)?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(dir.join(SESSION_FILENAME))?;
    // `mode` only applies on creation; tighten a file left by an older version.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub fn clear_session<P: AsRef<Path>>(dir: P) -> Result<()> {
    let path = dir.as_ref().join(SESSION_FILENAME);
    if path.exists() {
        fs::remove_file(path).map_err(FormularyError::Io)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::InMemoryAuth;

    fn auth_with_users() -> (InMemoryAuth, Identity, Identity) {
        let mut auth = InMemoryAuth::new();
        let admin = auth.add_user("admin@example.org", "pw", Some("admin"));
        let staff = auth.add_user("staff@example.org", "pw", Some("pharmacist"));
        (auth, admin, staff)
    }

    #[test]
    fn initialize_without_session_is_signed_out() {
        let (auth, _, _) = auth_with_users();
        let mut ctx = SessionContext::new(auth);
        assert!(ctx.is_loading());
        ctx.initialize().unwrap();
        assert!(!ctx.is_loading());
        assert!(ctx.user().is_none());
        assert!(!ctx.is_admin());
    }

    #[test]
    fn initialize_picks_up_existing_session() {
        let (mut auth, admin, _) = auth_with_users();
        auth.sign_in("admin@example.org", "pw").unwrap();
        let mut ctx = SessionContext::new(auth);
        ctx.initialize().unwrap();
        assert_eq!(ctx.user(), Some(&admin));
        assert!(ctx.is_admin());
    }

    #[test]
    fn sign_in_sets_admin_flag_from_role() {
        let (auth, _, staff) = auth_with_users();
        let mut ctx = SessionContext::new(auth);
        let user = ctx.sign_in("staff@example.org", "pw").unwrap().clone();
        assert_eq!(user, staff);
        assert!(!ctx.is_admin());
    }

    #[test]
    fn sign_in_failure_propagates_and_keeps_state() {
        let (auth, _, _) = auth_with_users();
        let mut ctx = SessionContext::new(auth);
        assert!(ctx.sign_in("admin@example.org", "nope").is_err());
        assert!(ctx.user().is_none());
    }

    #[test]
    fn switching_user_rechecks_role() {
        let (mut auth, _, _) = auth_with_users();
        let admin_session = auth.sign_in("admin@example.org", "pw").unwrap();
        let staff_session = auth.sign_in("staff@example.org", "pw").unwrap();
        let mut ctx = SessionContext::new(auth);

        ctx.handle_event(SessionEvent::SignedIn(admin_session));
        assert!(ctx.is_admin());
        ctx.handle_event(SessionEvent::SignedIn(staff_session));
        assert!(!ctx.is_admin());
    }

    #[test]
    fn sign_out_is_fail_open() {
        let (mut auth, _, _) = auth_with_users();
        auth.fail_sign_out = true;
        let mut ctx = SessionContext::new(auth);
        ctx.sign_in("admin@example.org", "pw").unwrap();
        assert!(ctx.is_admin());

        ctx.sign_out();
        assert!(ctx.user().is_none());
        assert!(!ctx.is_admin());
    }

    #[test]
    fn role_lookup_failure_means_not_admin() {
        let (mut auth, _, _) = auth_with_users();
        auth.fail_role_lookup = true;
        let mut ctx = SessionContext::new(auth);
        ctx.sign_in("admin@example.org", "pw").unwrap();
        assert!(ctx.user().is_some());
        assert!(!ctx.is_admin());
    }

    #[test]
    fn signed_out_event_clears_state() {
        let (auth, _, _) = auth_with_users();
        let mut ctx = SessionContext::new(auth);
        ctx.sign_in("admin@example.org", "pw").unwrap();
        ctx.handle_event(SessionEvent::SignedOut);
        assert!(ctx.session().is_none());
        assert!(!ctx.is_admin());
    }

    #[test]
    fn teardown_resets_to_loading() {
        let (auth, _, _) = auth_with_users();
        let mut ctx = SessionContext::new(auth);
        ctx.sign_in("admin@example.org", "pw").unwrap();
        ctx.teardown();
        assert!(ctx.user().is_none());
        assert!(ctx.is_loading());
    }

    fn stored_session() -> Session {
        Session {
            access_token: "secret-token".into(),
            refresh_token: Some("refresh".into()),
            expires_at: Some(Utc::now()),
            user: Identity {
                id: Uuid::new_v4(),
                email: "nurse@example.org".into(),
            },
        }
    }

    #[test]
    fn session_file_round_trip_and_clear() {
        let temp_dir = tempfile::tempdir().unwrap();
        let home = temp_dir.path().join("home");
        assert!(load_session(&home).unwrap().is_none());

        let session = stored_session();
        save_session(&home, &session).unwrap();
        assert_eq!(load_session(&home).unwrap(), Some(session));

        clear_session(&home).unwrap();
        assert!(load_session(&home).unwrap().is_none());
        clear_session(&home).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(SESSION_FILENAME);
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        save_session(temp_dir.path(), &stored_session()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(fs::read_to_string(&path).unwrap().contains("secret-token"));
    }
}
