use super::db_data::user::{self, ActiveModel, Column, Entity, Model};
use async_trait::async_trait;
use domain::user::{Role, User, UserError};
use domain::value::UserId;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;

#[derive(Clone)]
pub struct UserRepositoryImpl {
    db: DatabaseConnection,
}

impl UserRepositoryImpl {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl TryFrom<Model> for User {
    type Error = UserError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::from(model.id),
            username: model.username,
            email: model.email,
            password: model.password,
            role: model.role.parse::<Role>()?,
            company_name: model.company_name,
            company_address: model.company_address,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<&User> for ActiveModel {
    fn from(user: &User) -> Self {
        ActiveModel {
            id: Set(user.id.as_i64()),
            username: Set(user.username.clone()),
            email: Set(user.email.clone()),
            password: Set(user.password.clone()),
            role: Set(user.role.name().to_string()),
            company_name: Set(user.company_name.clone()),
            company_address: Set(user.company_address.clone()),
            created_at: Set(user.created_at),
            updated_at: Set(user.updated_at),
        }
    }
}

#[async_trait]
impl domain::user::UserRepository for UserRepositoryImpl {
    async fn find_by_username<'a>(&'a self, username: &'a str) -> Result<Option<User>, UserError> {
        let result = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(|e| UserError::DbErr(e.to_string()))?;
        result.map(User::try_from).transpose()
    }

    async fn find_by_email<'a>(&'a self, email: &'a str) -> Result<Option<User>, UserError> {
        let result = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(|e| UserError::DbErr(e.to_string()))?;
        result.map(User::try_from).transpose()
    }

    async fn find_all(&self) -> Result<Vec<User>, UserError> {
        Entity::find()
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| UserError::DbErr(e.to_string()))?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn save<'a>(&'a self, agg: &User) -> Result<(), UserError> {
        let active_model: ActiveModel = agg.into();
        Entity::insert(active_model)
            .on_conflict(
                OnConflict::column(Column::Id)
                    .update_columns([
                        Column::Email,
                        Column::Password,
                        Column::CompanyName,
                        Column::CompanyAddress,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(detail)) => unique_violation(&detail, agg),
                _ => UserError::DbErr(e.to_string()),
            })?;
        Ok(())
    }
}

/// 按约束名区分。PostgreSQL 默认约束名为 `users_username_key` / `users_email_key`。
fn unique_violation(detail: &str, user: &User) -> UserError {
    if detail.contains("email") {
        UserError::EmailTaken(user.email.clone())
    } else {
        UserError::UsernameTaken(user.username.clone())
    }
}
