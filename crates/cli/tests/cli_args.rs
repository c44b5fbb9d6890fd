use clap::Parser;
use std::path::PathBuf;
use storegate_cli::{Cli, Commands};

#[test]
fn test_products_defaults() {
    let cli = Cli::try_parse_from(["storegate", "products", "storage", "ssd"]).unwrap();
    assert_eq!(
        cli.command,
        Commands::Products {
            category: "storage".to_string(),
            subcategory: Some("ssd".to_string()),
            page: 1,
            limit: 12,
        }
    );
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "storegate",
        "categories",
        "--base-url",
        "http://127.0.0.1:4000/api",
        "--config",
        "/tmp/storegate.json",
    ])
    .unwrap();
    assert_eq!(cli.base_url.as_deref(), Some("http://127.0.0.1:4000/api"));
    assert_eq!(cli.config, Some(PathBuf::from("/tmp/storegate.json")));
}

#[test]
fn test_profile_set_collects_assignments() {
    let cli =
        Cli::try_parse_from(["storegate", "profile-set", "firstName=Alice", "phone=+100"]).unwrap();
    assert_eq!(
        cli.command,
        Commands::ProfileSet {
            fields: vec![
                ("firstName".to_string(), "Alice".to_string()),
                ("phone".to_string(), "+100".to_string()),
            ]
        }
    );

    assert!(Cli::try_parse_from(["storegate", "profile-set"]).is_err());
    assert!(Cli::try_parse_from(["storegate", "profile-set", "firstName"]).is_err());
}

#[test]
fn test_favorite_commands() {
    let cli = Cli::try_parse_from(["storegate", "favorite-status", "1", "2", "3"]).unwrap();
    assert_eq!(
        cli.command,
        Commands::FavoriteStatus {
            product_ids: vec![1, 2, 3]
        }
    );

    let cli = Cli::try_parse_from(["storegate", "favorite-add", "42"]).unwrap();
    assert_eq!(cli.command, Commands::FavoriteAdd { product_id: 42 });
    assert!(Cli::try_parse_from(["storegate", "favorite-add", "abc"]).is_err());
}

#[test]
fn test_register_requires_email() {
    assert!(Cli::try_parse_from(["storegate", "register", "alice", "--password", "pw"]).is_err());
    let cli = Cli::try_parse_from([
        "storegate",
        "register",
        "alice",
        "--password",
        "pw",
        "--email",
        "alice@example.com",
    ])
    .unwrap();
    assert!(matches!(cli.command, Commands::Register { .. }));
}
