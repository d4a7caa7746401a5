use serde::Serialize;
use tracing::{debug, info};

use crate::core::errors::{SocialError, SocialResult};
use crate::models::models::UserId;
use crate::network::Network;

/// The acting user for a call, passed explicitly instead of read from
/// shared state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    user_id: Option<UserId>,
}

impl Session {
    pub fn anonymous() -> Self {
        Session { user_id: None }
    }

    pub fn user(user_id: UserId) -> Self {
        Session {
            user_id: Some(user_id),
        }
    }

    pub fn acting_user(&self) -> SocialResult<UserId> {
        self.user_id.ok_or(SocialError::NotAuthenticated)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

impl Network {
    pub fn login(&self, username: &str, password: &str) -> SocialResult<Session> {
        match self.users.authenticate(username, password) {
            Some(user) => {
                info!(user_id = user.id, "login");
                Ok(Session::user(user.id))
            }
            None => {
                debug!(username, "login rejected");
                Err(SocialError::InvalidCredentials)
            }
        }
    }

    pub fn logout(&self, session: &mut Session) {
        if let Some(id) = session.user_id.take() {
            info!(user_id = id, "logout");
        }
    }

    /// Resolves the session to a user that still exists.
    pub(crate) fn acting_user(&self, session: &Session) -> SocialResult<UserId> {
        let id = session.acting_user()?;
        if !self.users.exists(id) {
            return Err(SocialError::NotAuthenticated);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_session_is_not_authenticated() {
        assert!(matches!(
            Session::anonymous().acting_user(),
            Err(SocialError::NotAuthenticated)
        ));
        assert_eq!(Session::user(4).acting_user().unwrap(), 4);
    }

    #[test]
    fn login_and_logout() {
        let mut network = Network::new("media".into());
        let user = network.register("alice", "secret").unwrap();

        assert!(matches!(
            network.login("alice", "wrong"),
            Err(SocialError::InvalidCredentials)
        ));

        let mut session = network.login("alice", "secret").unwrap();
        assert_eq!(session.acting_user().unwrap(), user.id);

        network.logout(&mut session);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn session_for_unknown_user_is_rejected() {
        let network = Network::new("media".into());
        assert!(matches!(
            network.acting_user(&Session::user(42)),
            Err(SocialError::NotAuthenticated)
        ));
    }
}
