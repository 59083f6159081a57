//! User storage
//!
//! `UserStore` is the seam between the HTTP layer and persistence. The
//! in-memory implementation keeps users and follow edges behind a single
//! `RwLock`, which is enough for tests and single-instance deployments.

use crate::{DevbookError, NewUser, Result, User, UserChanges, UserId};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

/// Storage operations on users and the follower graph
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user and return it with its assigned id
    async fn create(&self, user: NewUser) -> Result<User>;

    /// Users whose name or nick contains `name_or_nick` (case-insensitive)
    async fn search(&self, name_or_nick: &str) -> Result<Vec<User>>;

    async fn find_by_id(&self, id: UserId) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<User>;

    /// Replace the editable profile fields
    async fn update(&self, id: UserId, changes: UserChanges) -> Result<()>;

    /// Remove a user together with every follow edge touching it
    async fn delete(&self, id: UserId) -> Result<()>;

    /// Record that `follower_id` follows `user_id`; repeating is a no-op
    async fn follow(&self, user_id: UserId, follower_id: UserId) -> Result<()>;

    async fn unfollow(&self, user_id: UserId, follower_id: UserId) -> Result<()>;

    /// Users following `user_id`
    async fn followers(&self, user_id: UserId) -> Result<Vec<User>>;

    /// Users that `user_id` follows
    async fn following(&self, user_id: UserId) -> Result<Vec<User>>;

    async fn password_hash(&self, id: UserId) -> Result<String>;

    async fn update_password(&self, id: UserId, password_hash: String) -> Result<()>;
}

#[derive(Default)]
struct Inner {
    next_id: UserId,
    users: BTreeMap<UserId, User>,
    /// (followed, follower)
    follows: BTreeSet<(UserId, UserId)>,
}

impl Inner {
    fn get(&self, id: UserId) -> Result<&User> {
        self.users
            .get(&id)
            .ok_or_else(|| DevbookError::NotFound(format!("user {id}")))
    }

    fn get_mut(&mut self, id: UserId) -> Result<&mut User> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| DevbookError::NotFound(format!("user {id}")))
    }

    fn ensure_unique(&self, skip: Option<UserId>, nick: &str, email: &str) -> Result<()> {
        for user in self.users.values().filter(|u| Some(u.id) != skip) {
            if user.email.eq_ignore_ascii_case(email) {
                return Err(DevbookError::AlreadyExists(format!("email {email}")));
            }
            if user.nick.eq_ignore_ascii_case(nick) {
                return Err(DevbookError::AlreadyExists(format!("nick {nick}")));
            }
        }
        Ok(())
    }

    fn collect(&self, ids: impl Iterator<Item = UserId>) -> Vec<User> {
        ids.filter_map(|id| self.users.get(&id).cloned()).collect()
    }
}

/// In-memory `UserStore`
#[derive(Default)]
pub struct InMemoryUserStore {
    inner: RwLock<Inner>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let mut inner = self.inner.write().await;
        inner.ensure_unique(None, &user.nick, &user.email)?;

        inner.next_id += 1;
        let record = User {
            id: inner.next_id,
            name: user.name,
            nick: user.nick,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        inner.users.insert(record.id, record.clone());

        tracing::debug!(user_id = record.id, "user created");
        Ok(record)
    }

    async fn search(&self, name_or_nick: &str) -> Result<Vec<User>> {
        let needle = name_or_nick.to_lowercase();
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .filter(|u| {
                u.name.to_lowercase().contains(&needle) || u.nick.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: UserId) -> Result<User> {
        self.inner.read().await.get(id).cloned()
    }

    async fn find_by_email(&self, email: &str) -> Result<User> {
        self.inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| DevbookError::NotFound(format!("email {email}")))
    }

    async fn update(&self, id: UserId, changes: UserChanges) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.get(id)?;
        inner.ensure_unique(Some(id), &changes.nick, &changes.email)?;

        let user = inner.get_mut(id)?;
        user.name = changes.name;
        user.nick = changes.nick;
        user.email = changes.email;
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .users
            .remove(&id)
            .ok_or_else(|| DevbookError::NotFound(format!("user {id}")))?;
        inner
            .follows
            .retain(|&(followed, follower)| followed != id && follower != id);

        tracing::debug!(user_id = id, "user deleted");
        Ok(())
    }

    async fn follow(&self, user_id: UserId, follower_id: UserId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.get(user_id)?;
        inner.get(follower_id)?;
        inner.follows.insert((user_id, follower_id));
        Ok(())
    }

    async fn unfollow(&self, user_id: UserId, follower_id: UserId) -> Result<()> {
        self.inner
            .write()
            .await
            .follows
            .remove(&(user_id, follower_id));
        Ok(())
    }

    async fn followers(&self, user_id: UserId) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        inner.get(user_id)?;
        let ids = inner
            .follows
            .iter()
            .filter(|(followed, _)| *followed == user_id)
            .map(|&(_, follower)| follower);
        Ok(inner.collect(ids))
    }

    async fn following(&self, user_id: UserId) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        inner.get(user_id)?;
        let ids = inner
            .follows
            .iter()
            .filter(|(_, follower)| *follower == user_id)
            .map(|&(followed, _)| followed);
        Ok(inner.collect(ids))
    }

    async fn password_hash(&self, id: UserId) -> Result<String> {
        Ok(self.inner.read().await.get(id)?.password_hash.clone())
    }

    async fn update_password(&self, id: UserId, password_hash: String) -> Result<()> {
        self.inner.write().await.get_mut(id)?.password_hash = password_hash;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, nick: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            nick: nick.to_string(),
            email: format!("{nick}@example.com"),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = InMemoryUserStore::new();
        let a = store.create(new_user("Alice", "alice")).await.unwrap();
        let b = store.create(new_user("Bob", "bob")).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.find_by_id(2).await.unwrap().nick, "bob");
    }

    #[tokio::test]
    async fn test_duplicate_email_or_nick_rejected() {
        let store = InMemoryUserStore::new();
        store.create(new_user("Alice", "alice")).await.unwrap();

        let same_nick = store.create(new_user("Other", "ALICE")).await;
        assert!(matches!(same_nick, Err(DevbookError::AlreadyExists(_))));

        let mut same_email = new_user("Other", "other");
        same_email.email = "alice@example.com".to_string();
        assert!(matches!(
            store.create(same_email).await,
            Err(DevbookError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_search_matches_name_or_nick() {
        let store = InMemoryUserStore::new();
        store.create(new_user("Alice Liddell", "wonder")).await.unwrap();
        store.create(new_user("Bob", "bobby")).await.unwrap();

        let by_name = store.search("lidd").await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].nick, "wonder");

        let by_nick = store.search("BOB").await.unwrap();
        assert_eq!(by_nick.len(), 1);

        assert_eq!(store.search("").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_own_nick() {
        let store = InMemoryUserStore::new();
        let alice = store.create(new_user("Alice", "alice")).await.unwrap();
        store.create(new_user("Bob", "bob")).await.unwrap();

        let changes = UserChanges {
            name: "Alice L.".to_string(),
            nick: "alice".to_string(),
            email: "alice@example.com".to_string(),
        };
        store.update(alice.id, changes).await.unwrap();
        assert_eq!(store.find_by_id(alice.id).await.unwrap().name, "Alice L.");

        let steal = UserChanges {
            name: "Alice".to_string(),
            nick: "bob".to_string(),
            email: "alice@example.com".to_string(),
        };
        assert!(matches!(
            store.update(alice.id, steal).await,
            Err(DevbookError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_follow_graph() {
        let store = InMemoryUserStore::new();
        let a = store.create(new_user("A", "a")).await.unwrap();
        let b = store.create(new_user("B", "b")).await.unwrap();
        let c = store.create(new_user("C", "c")).await.unwrap();

        // b and c follow a; following twice is a no-op
        store.follow(a.id, b.id).await.unwrap();
        store.follow(a.id, b.id).await.unwrap();
        store.follow(a.id, c.id).await.unwrap();

        assert_eq!(store.followers(a.id).await.unwrap().len(), 2);
        let following = store.following(b.id).await.unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].id, a.id);

        store.unfollow(a.id, b.id).await.unwrap();
        assert_eq!(store.followers(a.id).await.unwrap().len(), 1);

        store.delete(c.id).await.unwrap();
        assert!(store.followers(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_follow_unknown_user() {
        let store = InMemoryUserStore::new();
        let a = store.create(new_user("A", "a")).await.unwrap();

        assert!(matches!(
            store.follow(99, a.id).await,
            Err(DevbookError::NotFound(_))
        ));
    }

    #[test]
    fn test_password_roundtrip() {
        tokio_test::block_on(async {
            let store = InMemoryUserStore::new();
            let a = store.create(new_user("A", "a")).await.unwrap();

            assert_eq!(store.password_hash(a.id).await.unwrap(), "hash");
            store
                .update_password(a.id, "new-hash".to_string())
                .await
                .unwrap();
            assert_eq!(store.password_hash(a.id).await.unwrap(), "new-hash");
            assert!(store.password_hash(42).await.is_err());
        });
    }
}
