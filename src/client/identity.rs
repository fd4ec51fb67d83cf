use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

/// External auth collaborator. Session issuance and validation happen
/// elsewhere; the client only asks who is signed in and which bearer token
/// to attach.
pub trait SessionProvider: Send + Sync {
  fn user_id(&self) -> Option<String>;
  fn bearer_token(&self) -> Option<String>;
}

/// Persistence for the locally generated guest id, created once and reused
/// across runs.
pub trait GuestIdStore: Send + Sync {
  fn load(&self) -> Option<String>;
  fn save(&self, guest_id: &str);
}

/// Guest id persisted in a plain file.
pub struct FileGuestIdStore {
  path: PathBuf,
}

impl FileGuestIdStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    FileGuestIdStore { path: path.into() }
  }
}

impl GuestIdStore for FileGuestIdStore {
  fn load(&self) -> Option<String> {
    let contents = fs::read_to_string(&self.path).ok()?;
    let guest_id = contents.trim();
    if guest_id.is_empty() {
      return None;
    }
    Some(guest_id.to_string())
  }

  fn save(&self, guest_id: &str) {
    if let Err(e) = fs::write(&self.path, guest_id) {
      warn!(error = %e, path = %self.path.display(), "Failed to persist guest id.");
    }
  }
}

/// In-memory store, used by tests.
#[derive(Default)]
pub struct MemoryGuestIdStore {
  guest_id: Mutex<Option<String>>,
}

impl GuestIdStore for MemoryGuestIdStore {
  fn load(&self) -> Option<String> {
    self.guest_id.lock().unwrap().clone()
  }

  fn save(&self, guest_id: &str) {
    *self.guest_id.lock().unwrap() = Some(guest_id.to_string());
  }
}

/// Active storefront identity: the authenticated user when a session
/// exists, otherwise the persisted guest id.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
  User(String),
  Guest(String),
}

impl Identity {
  pub fn id(&self) -> &str {
    match self {
      Identity::User(id) | Identity::Guest(id) => id,
    }
  }

  pub fn is_authenticated(&self) -> bool {
    matches!(self, Identity::User(_))
  }
}

pub fn resolve_identity(session: &dyn SessionProvider, guest_ids: &dyn GuestIdStore) -> Identity {
  match session.user_id() {
    Some(user_id) => Identity::User(user_id),
    None => Identity::Guest(ensure_guest_id(guest_ids)),
  }
}

/// Loads the persisted guest id, generating and storing one on first use.
pub fn ensure_guest_id(store: &dyn GuestIdStore) -> String {
  if let Some(guest_id) = store.load() {
    return guest_id;
  }
  let guest_id = generate_guest_id();
  store.save(&guest_id);
  guest_id
}

fn generate_guest_id() -> String {
  let suffix = Uuid::new_v4().simple().to_string();
  format!("guest-{}-{}", Utc::now().timestamp_millis(), &suffix[..9])
}

#[cfg(test)]
mod tests {
  use super::*;

  struct NoSession;

  impl SessionProvider for NoSession {
    fn user_id(&self) -> Option<String> {
      None
    }
    fn bearer_token(&self) -> Option<String> {
      None
    }
  }

  struct SignedIn;

  impl SessionProvider for SignedIn {
    fn user_id(&self) -> Option<String> {
      Some("u1".to_string())
    }
    fn bearer_token(&self) -> Option<String> {
      Some("token".to_string())
    }
  }

  #[test]
  fn guest_id_has_expected_shape() {
    let guest_id = generate_guest_id();
    assert!(guest_id.starts_with("guest-"));
    let parts: Vec<&str> = guest_id.splitn(3, '-').collect();
    assert_eq!(parts.len(), 3);
    assert!(parts[1].parse::<i64>().is_ok());
    assert_eq!(parts[2].len(), 9);
  }

  #[test]
  fn guest_id_is_generated_once_and_reused() {
    let store = MemoryGuestIdStore::default();
    let first = ensure_guest_id(&store);
    let second = ensure_guest_id(&store);
    assert_eq!(first, second);
  }

  #[test]
  fn session_user_takes_precedence_over_guest() {
    let store = MemoryGuestIdStore::default();
    let identity = resolve_identity(&SignedIn, &store);
    assert_eq!(identity, Identity::User("u1".to_string()));
    assert!(identity.is_authenticated());

    let identity = resolve_identity(&NoSession, &store);
    assert!(!identity.is_authenticated());
    assert!(identity.id().starts_with("guest-"));
  }
}
