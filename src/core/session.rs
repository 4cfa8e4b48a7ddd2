use crate::domain::model::{AuthUser, Role};
use crate::utils::error::{GradError, Result};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: AuthUser,
}

/// 目前登入者的共享狀態，HTTP 後端從這裡取得 bearer token
///
/// 只存在於記憶體中，程式結束即失效。
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, session: Session) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(session);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = None;
        }
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|s| s.token.clone()))
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.inner
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|s| s.user.clone()))
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// 取得登入者並確認角色；admin 一律放行
    pub fn require_role(&self, allowed: &[Role], action: &str) -> Result<AuthUser> {
        let user = self.user().ok_or_else(|| GradError::Unauthorized {
            message: format!("login required to {}", action),
        })?;

        if user.role == Role::Admin || allowed.contains(&user.role) {
            Ok(user)
        } else {
            Err(GradError::Forbidden {
                role: user.role.to_string(),
                action: action.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            id: 1,
            email: "someone@uni.edu".to_string(),
            full_name: "Some One".to_string(),
            role,
            student_id: None,
            advisor_id: None,
            department: None,
        }
    }

    #[test]
    fn test_require_role() {
        let store = SessionStore::new();
        assert!(matches!(
            store.require_role(&[Role::Advisor], "approve"),
            Err(GradError::Unauthorized { .. })
        ));

        store.set(Session {
            token: "t".to_string(),
            user: user(Role::Student),
        });
        assert!(matches!(
            store.require_role(&[Role::Advisor], "approve"),
            Err(GradError::Forbidden { .. })
        ));
        assert!(store.require_role(&[Role::Student], "view progress").is_ok());

        store.set(Session {
            token: "t".to_string(),
            user: user(Role::Admin),
        });
        assert!(store.require_role(&[Role::Advisor], "approve").is_ok());

        store.clear();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_clones_share_state() {
        let store = SessionStore::new();
        let shared = store.clone();
        store.set(Session {
            token: "abc".to_string(),
            user: user(Role::Secretary),
        });
        assert_eq!(shared.token().as_deref(), Some("abc"));
    }
}
