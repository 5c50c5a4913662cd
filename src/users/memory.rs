use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    repo::UserRepo,
    repo_types::{NewUser, RepoError, UpdatedUser, UserPatch, UserRecord},
};

/// Process-local store for development and tests. Kept in insertion order.
#[derive(Default)]
pub struct MemoryUserRepo {
    users: RwLock<Vec<UserRecord>>,
}

fn parse_id(id: &str) -> Result<String, RepoError> {
    Uuid::parse_str(id)
        .map(|u| u.to_string())
        .map_err(|_| RepoError::InvalidId(id.to_string()))
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn list(&self) -> Result<Vec<UserRecord>, RepoError> {
        Ok(self.users.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<UserRecord>, RepoError> {
        let id = parse_id(id)?;
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, RepoError> {
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            name: user.name,
            secret_hash: user.secret_hash,
            image: user.image,
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.write().await.push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: &str,
        patch: UserPatch,
    ) -> Result<Option<UpdatedUser>, RepoError> {
        let id = parse_id(id)?;
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        let previous_image = patch.apply(user);
        Ok(Some(UpdatedUser {
            user: user.clone(),
            previous_image,
        }))
    }

    async fn delete(&self, id: &str) -> Result<Option<UserRecord>, RepoError> {
        let id = parse_id(id)?;
        let mut users = self.users.write().await;
        let idx = users.iter().position(|u| u.id == id);
        Ok(idx.map(|idx| users.remove(idx)))
    }

    async fn close(&self) {}

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, image: Option<&str>) -> NewUser {
        NewUser {
            name: name.into(),
            secret_hash: "hash".into(),
            image: image.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn crud_cycle() {
        let repo = MemoryUserRepo::default();
        let a = repo.insert(new_user("ana", Some("/uploads/1-a.jpg"))).await.unwrap();
        let b = repo.insert(new_user("bob", None)).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.iter().map(|u| u.name.as_str()).collect::<Vec<_>>(), ["ana", "bob"]);

        let patched = repo
            .update(
                &a.id,
                UserPatch {
                    image: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(patched.user.name, "ana");
        assert_eq!(patched.user.image, None);
        assert_eq!(patched.previous_image.as_deref(), Some("/uploads/1-a.jpg"));

        let removed = repo.delete(&b.id).await.unwrap().unwrap();
        assert_eq!(removed.name, "bob");
        assert!(repo.get(&b.id).await.unwrap().is_none());
        assert!(repo.delete(&b.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ids_are_validated() {
        let repo = MemoryUserRepo::default();
        assert!(matches!(
            repo.get("not-a-uuid").await,
            Err(RepoError::InvalidId(_))
        ));
        let missing = Uuid::new_v4().to_string();
        assert!(repo
            .update(&missing, UserPatch::default())
            .await
            .unwrap()
            .is_none());
    }
}
