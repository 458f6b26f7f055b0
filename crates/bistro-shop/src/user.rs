use std::sync::Arc;

use bistro_common::Lookup;
use bistro_db::collections::USERS;
use bistro_db::{Collection, Filter, RecordStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::model::{User, UserType, now};
use crate::outcome::{check_id, settle, settle_option};

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Login {
    pub user: User,
    /// The user did not exist before this login.
    pub created: bool,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn RecordStore>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Touch {
    #[serde(with = "bistro_common::timestamp")]
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Promote {
    #[serde(rename = "type")]
    kind: UserType,
    #[serde(with = "bistro_common::timestamp")]
    updated_at: DateTime<Utc>,
}

impl UserService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    fn users(&self) -> Collection<'_> {
        Collection::new(self.store.as_ref(), USERS)
    }

    /// Find the user by normalized name and cellphone, creating a `default`
    /// user on first login.
    pub async fn login(&self, name: &str, cellphone: &str) -> Lookup<Login> {
        let Some((name, cellphone)) = normalize(name, cellphone) else {
            return Lookup::invalid("Name and cellphone are required");
        };

        let existing = match self.find_by_credentials(&name, &cellphone).await {
            Ok(found) => found,
            Err(failed) => return failed,
        };

        match existing {
            Some(mut user) => {
                let touch = Touch { updated_at: now() };
                if let Err(failed) = settle(
                    "login",
                    self.users().update_one(&Filter::id(&user.id), &touch).await,
                )
                .cast::<Login>()
                {
                    return failed;
                }
                user.updated_at = touch.updated_at;
                Lookup::Found(Login {
                    user,
                    created: false,
                })
            }
            None => self
                .insert(name, cellphone, UserType::Default)
                .await
                .map(|user| Login {
                    user,
                    created: true,
                }),
        }
    }

    pub async fn get(&self, user_id: &str) -> Lookup<User> {
        if let Err(invalid) = check_id(user_id) {
            return invalid;
        }
        settle_option("get user", self.users().find_one(&Filter::id(user_id)).await)
    }

    /// Promote an existing user to admin, or insert a new admin.
    pub async fn create_admin(&self, name: &str, cellphone: &str) -> Lookup<User> {
        let Some((name, cellphone)) = normalize(name, cellphone) else {
            return Lookup::invalid("Name and cellphone are required");
        };

        let existing = match self.find_by_credentials(&name, &cellphone).await {
            Ok(found) => found,
            Err(failed) => return failed,
        };

        let Some(mut user) = existing else {
            let created = self.insert(name, cellphone, UserType::Admin).await;
            if let Lookup::Found(user) = &created {
                info!("created admin user {}", user.id);
            }
            return created;
        };

        let promote = Promote {
            kind: UserType::Admin,
            updated_at: now(),
        };
        if let Err(failed) = settle(
            "create admin",
            self.users().update_one(&Filter::id(&user.id), &promote).await,
        )
        .cast::<User>()
        {
            return failed;
        }
        info!("promoted user {} to admin", user.id);
        user.kind = UserType::Admin;
        user.updated_at = promote.updated_at;
        Lookup::Found(user)
    }

    /// `Found(true)` only for an existing admin user.
    pub async fn is_admin(&self, user_id: &str) -> Lookup<bool> {
        match self.get(user_id).await {
            Lookup::Found(user) => Lookup::Found(user.is_admin()),
            Lookup::NotFound => Lookup::Found(false),
            other => other.map(|_| false),
        }
    }

    async fn find_by_credentials<T>(
        &self,
        name: &str,
        cellphone: &str,
    ) -> Result<Option<User>, Lookup<T>> {
        let filter = Filter::eq("name", name).and(Filter::eq("cellphone", cellphone));
        settle("find user", self.users().find_one(&filter).await).cast()
    }

    async fn insert(&self, name: String, cellphone: String, kind: UserType) -> Lookup<User> {
        let stamp = now();
        let mut user = User {
            id: String::new(),
            name,
            cellphone,
            kind,
            created_at: stamp,
            updated_at: stamp,
        };
        settle("create user", self.users().insert_one(&user).await).map(|id| {
            user.id = id;
            user
        })
    }
}

fn normalize(name: &str, cellphone: &str) -> Option<(String, String)> {
    let name = name.trim().to_lowercase();
    let cellphone = cellphone.trim().to_string();
    if name.is_empty() || cellphone.is_empty() {
        return None;
    }
    Some((name, cellphone))
}
