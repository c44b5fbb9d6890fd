use clap::Subcommand;

pub mod profile;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show the category tree
    Categories,

    /// List products (or subcategories) of a category
    Products {
        /// Category short name
        category: String,

        /// Subcategory short name
        subcategory: Option<String>,

        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: u32,

        /// Items per page
        #[arg(long, default_value = "12")]
        limit: u32,
    },

    /// Show one product
    Product {
        /// Category path, e.g. `cpu` or `storage/ssd`
        path: String,

        /// Product slug
        slug: String,
    },

    /// Sign in and store the session token
    Login {
        username: String,

        #[arg(long, env = "STOREGATE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and sign in
    Register {
        username: String,

        #[arg(long, env = "STOREGATE_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        email: String,
    },

    /// Sign out and forget the stored token
    Logout,

    /// Show the signed-in user's profile
    Profile,

    /// Update profile fields, sent together as one batch
    #[command(name = "profile-set")]
    ProfileSet {
        /// Edits as `field=value`
        #[arg(required = true, value_parser = profile::parse_assignment)]
        fields: Vec<(String, String)>,
    },

    /// List favorite products
    Favorites {
        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "12")]
        limit: u32,
    },

    /// Add a product to the favorites
    #[command(name = "favorite-add")]
    FavoriteAdd { product_id: i64 },

    /// Remove a product from the favorites
    #[command(name = "favorite-remove")]
    FavoriteRemove { product_id: i64 },

    /// Check which products are favorites
    #[command(name = "favorite-status")]
    FavoriteStatus {
        #[arg(required = true)]
        product_ids: Vec<i64>,
    },
}
