//! Role & identity guard plus the access-control check built on it.
//!
//! The whole role state sits behind one lock so that "master" and "slave"
//! can never be observed together, and so that the token exists exactly
//! while the role is master.

use super::types::{MasterLink, Role, Token};

use tokio::sync::RwLock;

#[derive(Debug)]
enum RoleState {
    Solo,
    Master { token: Token },
    Slave { master: MasterLink },
}

/// Outcome of a promotion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// First promotion: a fresh token was minted.
    Promoted(Token),
    /// Already master; the existing token stays valid.
    AlreadyMaster,
    /// Enslaved to another master.
    Refused { master: String },
}

impl Promotion {
    #[cfg(test)]
    pub fn succeeded(&self) -> bool {
        !matches!(self, Promotion::Refused { .. })
    }
}

pub struct RoleGuard {
    state: RwLock<RoleState>,
}

impl RoleGuard {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RoleState::Solo),
        }
    }

    /// One-way, idempotent promotion to master.
    pub async fn promote(&self) -> Promotion {
        let mut state = self.state.write().await;

        match &*state {
            RoleState::Master { .. } => Promotion::AlreadyMaster,
            RoleState::Slave { master } => Promotion::Refused {
                master: master.url.clone(),
            },
            RoleState::Solo => {
                let token = Token::generate();
                *state = RoleState::Master {
                    token: token.clone(),
                };
                Promotion::Promoted(token)
            }
        }
    }

    /// Accepts `master` as authoritative for this process.
    ///
    /// Refused when this process is itself a master, or when it already
    /// reports to a different master. Re-sending the same link is accepted.
    pub async fn set_master(&self, master: MasterLink) -> bool {
        let mut state = self.state.write().await;

        match &*state {
            RoleState::Master { .. } => false,
            RoleState::Slave { master: current } => *current == master,
            RoleState::Solo => {
                *state = RoleState::Slave { master };
                true
            }
        }
    }

    pub async fn role(&self) -> Role {
        match &*self.state.read().await {
            RoleState::Solo => Role::Solo,
            RoleState::Master { .. } => Role::Master,
            RoleState::Slave { .. } => Role::Slave,
        }
    }

    pub async fn is_master(&self) -> bool {
        self.token().await.is_some()
    }

    pub async fn is_slave(&self) -> bool {
        self.master().await.is_some()
    }

    pub async fn token(&self) -> Option<Token> {
        match &*self.state.read().await {
            RoleState::Master { token } => Some(token.clone()),
            _ => None,
        }
    }

    pub async fn master(&self) -> Option<MasterLink> {
        match &*self.state.read().await {
            RoleState::Slave { master } => Some(master.clone()),
            _ => None,
        }
    }

    /// Gate for privileged entry points.
    ///
    /// A master demands its own token. Solo and slave processes only
    /// serve local callers on these paths, so they let everything through.
    pub async fn check_privileged(&self, presented: &str) -> bool {
        match &*self.state.read().await {
            RoleState::Master { token } => token.matches(presented),
            _ => true,
        }
    }
}

impl Default for RoleGuard {
    fn default() -> Self {
        Self::new()
    }
}
