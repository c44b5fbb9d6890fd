use crate::commands::Commands;
use crate::output::print_json;
use eyre::{eyre, Result};
use serde_json::json;
use storegate_client::Gateway;

impl Commands {
    pub async fn execute(self, gateway: &Gateway) -> Result<()> {
        match self {
            Commands::Categories => print_json(&gateway.categories().await?),
            Commands::Products {
                category,
                subcategory,
                page,
                limit,
            } => print_json(
                &gateway
                    .products(&category, subcategory.as_deref(), page, limit)
                    .await?,
            ),
            Commands::Product { path, slug } => print_json(&gateway.product(&path, &slug).await?),
            Commands::Login { username, password } => {
                let answer = gateway.login(&username, &password).await?;
                print_json(&json!({ "message": answer.message, "authenticated": true }))
            }
            Commands::Register {
                username,
                password,
                email,
            } => {
                let answer = gateway.register(&username, &password, &email).await?;
                print_json(&json!({ "message": answer.message, "authenticated": true }))
            }
            Commands::Logout => {
                gateway.logout().await;
                print_json(&json!({ "authenticated": false }))
            }
            Commands::Profile => print_json(&gateway.profile().await?),
            Commands::ProfileSet { fields } => {
                for (field, value) in fields {
                    // Handles are not awaited: the flush below settles them all
                    let _pending = gateway.update_profile_field(&field, value)?;
                }
                let saved = gateway
                    .save_profile_now()
                    .await?
                    .ok_or_else(|| eyre!("no profile edits to save"))?;
                print_json(&saved)
            }
            Commands::Favorites { page, limit } => {
                print_json(&gateway.favorites(page, limit).await?)
            }
            Commands::FavoriteAdd { product_id } => {
                print_json(&gateway.add_favorite(product_id).await?)
            }
            Commands::FavoriteRemove { product_id } => {
                print_json(&gateway.remove_favorite(product_id).await?)
            }
            Commands::FavoriteStatus { product_ids } => {
                print_json(&gateway.favorite_status(&product_ids).await?)
            }
        }
    }
}
