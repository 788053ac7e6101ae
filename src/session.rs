//! The logged-in identity, kept between CLI invocations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ApiError, Result};
use crate::models::{Author, LoginResponse, Role, Ucid, UserProfile};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Identity {
    Student { ucid: Ucid },
    Employer { employer_id: i64 },
    Moderator { moderator_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
    pub display_name: String,
    pub email: String,
}

impl Session {
    pub fn from_login(login: &LoginResponse) -> Self {
        let (identity, email) = match &login.user {
            UserProfile::Student(s) => (Identity::Student { ucid: s.ucid.clone() }, s.email.clone()),
            UserProfile::Employer(e) => (
                Identity::Employer {
                    employer_id: e.employer_id,
                },
                e.email.clone(),
            ),
            UserProfile::Moderator(m) => (
                Identity::Moderator {
                    moderator_id: m.moderator_id,
                },
                m.email.clone(),
            ),
        };
        Self {
            token: login.token.clone(),
            identity,
            display_name: login.user.display_name(),
            email,
        }
    }

    pub fn role(&self) -> Role {
        match self.identity {
            Identity::Student { .. } => Role::Student,
            Identity::Employer { .. } => Role::Employer,
            Identity::Moderator { .. } => Role::Moderator,
        }
    }

    /// The identity forum posts, comments and votes are recorded under.
    pub fn author(&self) -> Author {
        match &self.identity {
            Identity::Student { ucid } => Author::Student(ucid.clone()),
            Identity::Employer { employer_id } => Author::Employer(*employer_id),
            Identity::Moderator { moderator_id } => Author::Moderator(*moderator_id),
        }
    }

    pub fn require(&self, role: Role) -> Result<()> {
        if self.role() == role {
            Ok(())
        } else {
            Err(ApiError::unauthorized(format!(
                "This action requires a {} account; logged in as {}",
                role,
                self.role()
            )))
        }
    }

    pub fn ucid(&self) -> Result<&str> {
        match &self.identity {
            Identity::Student { ucid } => Ok(ucid),
            _ => Err(self.wrong_role(Role::Student)),
        }
    }

    pub fn employer_id(&self) -> Result<i64> {
        match self.identity {
            Identity::Employer { employer_id } => Ok(employer_id),
            _ => Err(self.wrong_role(Role::Employer)),
        }
    }

    pub fn moderator_id(&self) -> Result<i64> {
        match self.identity {
            Identity::Moderator { moderator_id } => Ok(moderator_id),
            _ => Err(self.wrong_role(Role::Moderator)),
        }
    }

    fn wrong_role(&self, wanted: Role) -> ApiError {
        match self.require(wanted) {
            Err(e) => e,
            Ok(()) => ApiError::unauthorized(format!("Not a {} session", wanted)),
        }
    }

    /// `Ok(None)` when nobody is logged in.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Returns whether a session file was removed.
    pub fn clear(path: &Path) -> Result<bool> {
        if path.exists() {
            std::fs::remove_file(path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Moderator;

    fn moderator_login() -> LoginResponse {
        LoginResponse {
            token: "tok123".into(),
            user: UserProfile::Moderator(Moderator {
                moderator_id: 2,
                name: "Omar Haddad".into(),
                email: "oh5@njit.edu".into(),
            }),
            role: Role::Moderator,
        }
    }

    #[test]
    fn test_from_login() {
        let session = Session::from_login(&moderator_login());
        assert_eq!(session.role(), Role::Moderator);
        assert_eq!(session.author(), Author::Moderator(2));
        assert_eq!(session.moderator_id().unwrap(), 2);
        assert_eq!(session.display_name, "Omar Haddad");
    }

    #[test]
    fn test_role_gating() {
        let session = Session::from_login(&moderator_login());
        assert!(session.require(Role::Moderator).is_ok());
        let err = session.require(Role::Student).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert!(matches!(session.ucid().unwrap_err(), ApiError::Unauthorized(_)));
        assert!(session.employer_id().is_err());
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        assert_eq!(Session::load(&path).unwrap(), None);

        let session = Session::from_login(&moderator_login());
        session.save(&path).unwrap();
        assert_eq!(Session::load(&path).unwrap(), Some(session));

        assert!(Session::clear(&path).unwrap());
        assert!(!Session::clear(&path).unwrap());
        assert_eq!(Session::load(&path).unwrap(), None);
    }
}
